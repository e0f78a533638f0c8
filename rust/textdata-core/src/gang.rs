// rust/textdata-core/src/gang.rs

//! Sharding coordinates of the worker processes reading a dataset.
//!
//! The reader never talks to other ranks. It only needs to know which rank
//! it is and how many ranks there are, so that every process can compute
//! its own disjoint slice of the example stream.

use crate::error::{Result, ReaderError};

/// A set of cooperating worker processes sharing a rank space.
pub trait Gang: Send + Sync {
    /// Index of this process within the gang.
    fn rank(&self) -> u32;

    /// Total number of processes in the gang.
    fn size(&self) -> u32;
}

/// A gang described by fixed coordinates, e.g. taken from `RANK` and
/// `WORLD_SIZE` of the launcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalGang {
    rank: u32,
    size: u32,
}

impl LocalGang {
    /// Creates a gang handle for `rank` out of `size` processes.
    ///
    /// # Errors
    ///
    /// Returns `ReaderError::InvalidShard` if `size` is zero or `rank` is
    /// not below `size`.
    pub fn new(rank: u32, size: u32) -> Result<Self> {
        validate_coordinates(rank, size)?;
        Ok(Self { rank, size })
    }

    /// A single-process gang.
    pub fn single() -> Self {
        Self { rank: 0, size: 1 }
    }
}

impl Default for LocalGang {
    fn default() -> Self {
        Self::single()
    }
}

impl Gang for LocalGang {
    fn rank(&self) -> u32 {
        self.rank
    }

    fn size(&self) -> u32 {
        self.size
    }
}

pub(crate) fn validate_coordinates(rank: u32, size: u32) -> Result<()> {
    if size == 0 || rank >= size {
        return Err(ReaderError::invalid_shard(rank, size));
    }
    Ok(())
}
