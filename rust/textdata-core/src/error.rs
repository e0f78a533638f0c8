// rust/textdata-core/src/error.rs

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReaderError {

    #[error("Storage error at '{path}': {message}")]
    Storage {
        path: PathBuf,
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },

    #[error("Dataset '{name}' cannot be loaded: {message}")]
    DatasetLoad {
        name: String,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Dataset '{name}' error: {message}")]
    Dataset {
        name: String,
        message: String,
    },

    #[error("Configuration error: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Not supported: {message}")]
    NotSupported {
        message: String,
    },

    #[error("Rank {rank} out of range (world size: {world_size})")]
    InvalidShard {
        rank: u32,
        world_size: u32,
    },

    #[error("Encoding error: {message}")]
    Encoding {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Collation error: {message}")]
    Collation {
        message: String,
    },

    #[error("Pipeline error: {message}")]
    Pipeline {
        message: String,
    },
}

pub type Result<T> = std::result::Result<T, ReaderError>;

// Convenience constructors
impl ReaderError {

    pub fn storage(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Storage {
            path: path.into(),
            message: message.into(),
            source: None,
        }
    }

    pub fn storage_with_source(
        path: impl Into<PathBuf>,
        message: impl Into<String>,
        source: std::io::Error,
    ) -> Self {
        Self::Storage {
            path: path.into(),
            message: message.into(),
            source: Some(source),
        }
    }

    pub fn dataset_load_with_source(
        name: impl Into<String>,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::DatasetLoad {
            name: name.into(),
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn dataset(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Dataset {
            name: name.into(),
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            source: None,
        }
    }

    pub fn config_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Config {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn not_supported(message: impl Into<String>) -> Self {
        Self::NotSupported {
            message: message.into(),
        }
    }

    pub fn invalid_shard(rank: u32, world_size: u32) -> Self {
        Self::InvalidShard { rank, world_size }
    }

    pub fn encoding(message: impl Into<String>) -> Self {
        Self::Encoding {
            message: message.into(),
            source: None,
        }
    }

    pub fn encoding_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Encoding {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn collation(message: impl Into<String>) -> Self {
        Self::Collation {
            message: message.into(),
        }
    }

    pub fn pipeline(message: impl Into<String>) -> Self {
        Self::Pipeline {
            message: message.into(),
        }
    }
}
