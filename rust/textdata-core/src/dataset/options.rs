// rust/textdata-core/src/dataset/options.rs

use std::collections::BTreeMap;

/// Options controlling how a text dataset is read.
#[derive(Debug, Clone, PartialEq)]
pub struct TextReadOptions {
    /// Seed of the example shuffle. The batch shuffle derives its own seed
    /// from it.
    pub seed: u64,
    /// Window of the example shuffle. `0` shuffles the whole stream, `1`
    /// keeps the file order.
    pub example_shuffle_window: usize,
    /// Window of the batch shuffle, with the same conventions.
    pub batch_shuffle_window: usize,
    /// How examples are grouped into batches.
    pub batching: Batching,
    /// Drop the final partial batch (or partial buckets).
    pub drop_remainder: bool,
    /// Stop after this many batches.
    pub max_num_batches: Option<usize>,
    /// Number of batches returned by one `next_batches` call.
    pub num_accumulate: usize,
    /// Number of batches prepared ahead on a background thread. `0` reads
    /// inline.
    pub num_prefetch: usize,
    /// Number of batches collated in parallel.
    pub npc: usize,
    /// Dataset-specific options such as `split_pattern`.
    pub extras: BTreeMap<String, toml::Value>,
}

impl Default for TextReadOptions {
    fn default() -> Self {
        Self {
            seed: 2,
            example_shuffle_window: 1,
            batch_shuffle_window: 1,
            batching: Batching::default(),
            drop_remainder: false,
            max_num_batches: None,
            num_accumulate: 1,
            num_prefetch: 1,
            npc: 1,
            extras: BTreeMap::new(),
        }
    }
}

/// Batching strategy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Batching {
    /// Variable-size batches bounded by a total element count.
    Length(LengthBatching),
    /// Fixed-size batches.
    Static(StaticBatching),
}

impl Default for Batching {
    fn default() -> Self {
        Self::Static(StaticBatching { batch_size: 1 })
    }
}

impl Batching {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Length(_) => "length",
            Self::Static(_) => "static",
        }
    }
}

/// Length-bucketed batching.
///
/// Each batch holds at most `max_num_elements` tokens once padded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LengthBatching {
    pub max_num_elements: usize,
    /// Round bucket batch sizes down to a multiple of this value.
    pub num_seqs_multiple_of: usize,
    pub skip_below_min_examples: bool,
    pub skip_above_max_examples: bool,
}

impl LengthBatching {
    pub fn new(max_num_elements: usize) -> Self {
        Self {
            max_num_elements,
            num_seqs_multiple_of: 1,
            skip_below_min_examples: true,
            skip_above_max_examples: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StaticBatching {
    pub batch_size: usize,
}
