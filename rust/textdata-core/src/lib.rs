// rust/textdata-core/src/lib.rs

//! Text Dataset Reader - Core Library
//!
//! This crate turns directories of line-oriented text files into
//! deterministic, sharded streams of padded token batches for training and
//! evaluation loops. It provides error handling, reader configuration, the
//! encoder and gang seams, and the batching pipeline itself.

pub mod config;
pub mod encoder;
pub mod error;
pub mod gang;

// Re-export commonly used types for convenience
pub use config::ReaderConfig;
pub use encoder::{ByteEncoder, TextEncoder, TokenId};
pub use error::{ReaderError, Result};
pub use gang::{Gang, LocalGang};

pub mod dataset;
pub use dataset::{
    create_bucket_sizes, Batching, DataReader, GenericTextDataset, LengthBatching, SequenceBatch,
    StaticBatching, TextDataReader, TextDataset, TextReadOptions,
};
