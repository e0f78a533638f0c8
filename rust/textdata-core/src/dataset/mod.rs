// rust/textdata-core/src/dataset/mod.rs

//! Text datasets and the batching pipeline built on top of them.
//!
//! A dataset is a sorted list of `.txt` files with one example per line.
//! Readers turn it into a lazy stream of padded token batches: lines are
//! shuffled, sharded across ranks, encoded, grouped by length (or into
//! fixed-size batches), collated and prefetched on a background thread.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use textdata_core::dataset::{GenericTextDataset, TextDataset, TextReadOptions};
//! use textdata_core::{ByteEncoder, LocalGang};
//!
//! let dataset = GenericTextDataset::from_path("data/corpus", "corpus")?;
//!
//! let reader = dataset.create_reader(
//!     Arc::new(ByteEncoder::default()),
//!     Some(0),
//!     &LocalGang::new(rank, world_size)?,
//!     1,
//!     512,
//!     Some(TextReadOptions::default()),
//!     Some("train"),
//! )?;
//!
//! for batch in reader {
//!     let batch = batch?;
//!     // Feed batch.seqs and batch.seq_lens to the model
//! }
//! ```

mod bucketing;
mod buckets;
mod collate;
mod files;
mod iterator;
mod options;
mod parallel;
mod prefetch;
mod reader;
mod sharding;
mod shuffle;
mod text;
mod traits;

pub use bucketing::{Bucket, BucketByLength, BucketByLengthOptions, BucketStats};
pub use buckets::{create_bucket_sizes, create_bucket_sizes_aligned, BucketSize, BucketSpec};
pub use collate::Collater;
pub use files::{filter_split, list_text_files, SplitPattern, DEFAULT_SPLIT_PATTERNS, TEXT_FILE_EXTENSION};
pub use iterator::TextLines;
pub use options::{Batching, LengthBatching, StaticBatching, TextReadOptions};
pub use parallel::{ParallelMap, ParallelMapConfig};
#[cfg(feature = "async")]
pub use prefetch::AsyncPrefetcher;
pub use prefetch::{BoxedStream, PrefetchConfig, Prefetcher};
pub use reader::{DataReader, TextDataReader};
pub use sharding::Shard;
pub use shuffle::WindowShuffle;
pub use text::{GenericTextDataset, TextDataset, SPLIT_PATTERN_KEY};
pub use traits::{EncodedExample, PaddedSequences, SequenceBatch, SequenceData, TextExample};
