// rust/textdata-core/src/config.rs

//! Configuration management for text dataset readers.
//!
//! This module provides configuration parsing from TOML files, environment
//! variable overrides, validation of configuration values, and conversion
//! into [`TextReadOptions`].

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::dataset::{Batching, LengthBatching, StaticBatching, TextReadOptions};
use crate::encoder::TokenId;
use crate::error::{Result, ReaderError};

// Top-level reader configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaderConfig {
    pub dataset: DatasetConfig,
    pub sequence: SequenceConfig,
    pub read: ReadConfig,
}

/// Where the dataset lives and which split to read.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatasetConfig {
    /// Name used in logs and errors.
    pub name: String,
    // A `.txt` file or a directory searched recursively.
    pub path: PathBuf,
    // Split to read; all files when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub split: Option<String>,
}

/// Sequence length bounds and padding.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SequenceConfig {
    pub min_seq_len: usize,
    pub max_seq_len: usize,
    /// Padding token; `"none"` in TOML disables padding.
    #[serde(with = "pad_idx_serde")]
    pub pad_idx: Option<TokenId>,
}

/// Read options as they appear in the `[read]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReadConfig {
    pub seed: u64,
    pub example_shuffle_window: usize,
    pub batch_shuffle_window: usize,
    pub drop_remainder: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_num_batches: Option<usize>,
    pub num_accumulate: usize,
    pub num_prefetch: usize,
    // Number of parallel collation calls.
    pub npc: usize,
    pub batching: BatchingConfig,
    // Free-form options, e.g. `split_pattern`.
    pub extras: BTreeMap<String, toml::Value>,
}

/// The `[read.batching]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchingConfig {
    /// Batching kind: "static" or "length".
    pub kind: String,
    // Used by "static".
    pub batch_size: usize,
    // Used by "length"; required there.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_num_elements: Option<usize>,
    pub num_seqs_multiple_of: usize,
    pub skip_below_min_examples: bool,
    pub skip_above_max_examples: bool,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            name: "text".to_string(),
            path: PathBuf::from("./data"),
            split: None,
        }
    }
}

impl Default for SequenceConfig {
    fn default() -> Self {
        Self {
            min_seq_len: 1,
            max_seq_len: 512,
            pad_idx: Some(0),
        }
    }
}

impl Default for ReadConfig {
    fn default() -> Self {
        let defaults = TextReadOptions::default();
        Self {
            seed: defaults.seed,
            example_shuffle_window: defaults.example_shuffle_window,
            batch_shuffle_window: defaults.batch_shuffle_window,
            drop_remainder: defaults.drop_remainder,
            max_num_batches: defaults.max_num_batches,
            num_accumulate: defaults.num_accumulate,
            num_prefetch: defaults.num_prefetch,
            npc: defaults.npc,
            batching: BatchingConfig::default(),
            extras: defaults.extras,
        }
    }
}

impl Default for BatchingConfig {
    fn default() -> Self {
        Self {
            kind: "static".to_string(),
            batch_size: 1,
            max_num_elements: None,
            num_seqs_multiple_of: 1,
            skip_below_min_examples: true,
            skip_above_max_examples: true,
        }
    }
}

impl BatchingConfig {
    /// Converts the section into a [`Batching`].
    ///
    /// # Errors
    ///
    /// Returns `ReaderError::NotSupported` for an unknown kind and
    /// `ReaderError::Config` if `length` batching lacks `max_num_elements`.
    pub fn to_batching(&self) -> Result<Batching> {
        match self.kind.to_lowercase().as_str() {
            "static" => Ok(Batching::Static(StaticBatching {
                batch_size: self.batch_size,
            })),
            "length" => {
                let max_num_elements = self.max_num_elements.ok_or_else(|| {
                    ReaderError::config("read.batching.max_num_elements is required for length batching")
                })?;

                Ok(Batching::Length(LengthBatching {
                    max_num_elements,
                    num_seqs_multiple_of: self.num_seqs_multiple_of,
                    skip_below_min_examples: self.skip_below_min_examples,
                    skip_above_max_examples: self.skip_above_max_examples,
                }))
            }
            other => Err(ReaderError::not_supported(format!(
                "`{other}` batching is not supported (expected \"static\" or \"length\")"
            ))),
        }
    }
}

impl ReadConfig {
    /// Builds the read options described by this section.
    ///
    /// # Errors
    ///
    /// See [`BatchingConfig::to_batching`].
    pub fn to_options(&self) -> Result<TextReadOptions> {
        Ok(TextReadOptions {
            seed: self.seed,
            example_shuffle_window: self.example_shuffle_window,
            batch_shuffle_window: self.batch_shuffle_window,
            batching: self.batching.to_batching()?,
            drop_remainder: self.drop_remainder,
            max_num_batches: self.max_num_batches,
            num_accumulate: self.num_accumulate,
            num_prefetch: self.num_prefetch,
            npc: self.npc,
            extras: self.extras.clone(),
        })
    }
}

impl FromStr for ReaderConfig {
    type Err = ReaderError;

    /// Parse configuration from a TOML string.
    fn from_str(s: &str) -> Result<Self> {
        toml::from_str(s)
            .map_err(|e| ReaderError::config_with_source("failed to parse TOML config", e))
    }
}

fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|val| val.parse().ok())
}

impl ReaderConfig {
    // Load configuration from a TOML file.
    //
    // # Errors
    //
    // Returns an error if the file cannot be read, parsed or validated.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            ReaderError::storage_with_source(path, "failed to read config file", e)
        })?;
        let config: Self = content.parse()?;
        config.validate()?;
        Ok(config)
    }

    // Apply environment variable overrides.
    //
    // Environment variables are prefixed with `TXD_` and use underscores
    // to separate nested fields. For example:
    // - `TXD_DATASET_PATH` overrides `dataset.path`
    // - `TXD_SEQUENCE_MAX_SEQ_LEN` overrides `sequence.max_seq_len`
    // - `TXD_READ_SEED` overrides `read.seed`
    // - `TXD_READ_BATCHING_KIND` overrides `read.batching.kind`
    //
    // Values that fail to parse are ignored.
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        // Dataset overrides
        if let Ok(val) = std::env::var("TXD_DATASET_NAME") {
            self.dataset.name = val;
        }
        if let Ok(val) = std::env::var("TXD_DATASET_PATH") {
            self.dataset.path = PathBuf::from(val);
        }
        if let Ok(val) = std::env::var("TXD_DATASET_SPLIT") {
            self.dataset.split = (!val.is_empty()).then_some(val);
        }

        // Sequence overrides
        if let Some(v) = env_parse("TXD_SEQUENCE_MIN_SEQ_LEN") {
            self.sequence.min_seq_len = v;
        }
        if let Some(v) = env_parse("TXD_SEQUENCE_MAX_SEQ_LEN") {
            self.sequence.max_seq_len = v;
        }
        if let Ok(val) = std::env::var("TXD_SEQUENCE_PAD_IDX") {
            if val.eq_ignore_ascii_case("none") {
                self.sequence.pad_idx = None;
            } else if let Ok(v) = val.parse() {
                self.sequence.pad_idx = Some(v);
            }
        }

        // Read overrides
        if let Some(v) = env_parse("TXD_READ_SEED") {
            self.read.seed = v;
        }
        if let Some(v) = env_parse("TXD_READ_EXAMPLE_SHUFFLE_WINDOW") {
            self.read.example_shuffle_window = v;
        }
        if let Some(v) = env_parse("TXD_READ_BATCH_SHUFFLE_WINDOW") {
            self.read.batch_shuffle_window = v;
        }
        if let Some(v) = env_parse("TXD_READ_DROP_REMAINDER") {
            self.read.drop_remainder = v;
        }
        if let Some(v) = env_parse("TXD_READ_MAX_NUM_BATCHES") {
            self.read.max_num_batches = Some(v);
        }
        if let Some(v) = env_parse("TXD_READ_NUM_ACCUMULATE") {
            self.read.num_accumulate = v;
        }
        if let Some(v) = env_parse("TXD_READ_NUM_PREFETCH") {
            self.read.num_prefetch = v;
        }
        if let Some(v) = env_parse("TXD_READ_NPC") {
            self.read.npc = v;
        }

        // Batching overrides
        if let Ok(val) = std::env::var("TXD_READ_BATCHING_KIND") {
            self.read.batching.kind = val.to_lowercase();
        }
        if let Some(v) = env_parse("TXD_READ_BATCHING_BATCH_SIZE") {
            self.read.batching.batch_size = v;
        }
        if let Some(v) = env_parse("TXD_READ_BATCHING_MAX_NUM_ELEMENTS") {
            self.read.batching.max_num_elements = Some(v);
        }

        self
    }

    // Validate all configuration values.
    //
    // # Errors
    //
    // Returns `ReaderError::NotSupported` for an unknown batching kind and
    // `ReaderError::Config` for any other invalid value.
    pub fn validate(&self) -> Result<()> {
        // Dataset validation
        if self.dataset.name.is_empty() {
            return Err(ReaderError::config("dataset.name must not be empty"));
        }

        // Sequence validation
        if self.sequence.min_seq_len == 0 {
            return Err(ReaderError::config(
                "sequence.min_seq_len must be greater than 0",
            ));
        }
        if self.sequence.min_seq_len > self.sequence.max_seq_len {
            return Err(ReaderError::config(
                "sequence.min_seq_len must be less than or equal to sequence.max_seq_len",
            ));
        }

        // Read validation
        if self.read.num_accumulate == 0 {
            return Err(ReaderError::config(
                "read.num_accumulate must be greater than 0",
            ));
        }

        match self.read.batching.to_batching()? {
            Batching::Static(batching) => {
                if batching.batch_size == 0 {
                    return Err(ReaderError::config(
                        "read.batching.batch_size must be greater than 0",
                    ));
                }
            }
            Batching::Length(batching) => {
                if batching.max_num_elements < self.sequence.max_seq_len {
                    return Err(ReaderError::config(
                        "read.batching.max_num_elements must be at least sequence.max_seq_len",
                    ));
                }
                if batching.num_seqs_multiple_of == 0 {
                    return Err(ReaderError::config(
                        "read.batching.num_seqs_multiple_of must be greater than 0",
                    ));
                }
            }
        }

        Ok(())
    }
}

// `pad_idx` is either a token id or the string "none".
mod pad_idx_serde {
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    use crate::encoder::TokenId;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Id(TokenId),
        Name(String),
    }

    pub fn serialize<S: Serializer>(value: &Option<TokenId>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(idx) => serializer.serialize_u32(*idx),
            None => serializer.serialize_str("none"),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<TokenId>, D::Error> {
        match Raw::deserialize(deserializer)? {
            Raw::Id(idx) => Ok(Some(idx)),
            Raw::Name(name) if name.eq_ignore_ascii_case("none") => Ok(None),
            Raw::Name(name) => Err(D::Error::custom(format!(
                "invalid pad_idx '{name}': expected a token id or \"none\""
            ))),
        }
    }
}
