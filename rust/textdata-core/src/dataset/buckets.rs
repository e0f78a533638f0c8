// rust/textdata-core/src/dataset/buckets.rs

//! Length buckets for area-bounded batching.
//!
//! Each bucket admits sequences up to its `seq_len` and holds at most
//! `batch_size` of them, with `batch_size * seq_len` never exceeding the
//! element budget of a batch. Short sequences therefore travel in large
//! batches and long ones in small batches, while padding stays bounded by
//! the gap between neighbouring bucket lengths.

use crate::error::{Result, ReaderError};

/// A single bucket: at most `batch_size` sequences of length up to `seq_len`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BucketSize {
    pub batch_size: usize,
    pub seq_len: usize,
}

/// Ordered buckets with strictly increasing `seq_len`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketSpec {
    buckets: Vec<BucketSize>,
    min_seq_len: usize,
}

impl BucketSpec {
    pub fn buckets(&self) -> &[BucketSize] {
        &self.buckets
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Shortest sequence length the buckets were planned for.
    pub fn min_seq_len(&self) -> usize {
        self.min_seq_len
    }

    /// Longest sequence length any bucket admits.
    pub fn max_seq_len(&self) -> usize {
        self.buckets.last().map(|b| b.seq_len).unwrap_or(0)
    }

    /// Index of the bucket admitting sequences of length `seq_len`: the
    /// first one whose `seq_len` is not smaller.
    ///
    /// Returns `None` if the sequence is longer than the last bucket.
    pub fn bucket_for(&self, seq_len: usize) -> Option<usize> {
        let idx = self.buckets.partition_point(|b| b.seq_len < seq_len);
        (idx < self.buckets.len()).then_some(idx)
    }
}

/// Plans buckets covering `[min_seq_len, max_seq_len]` so that no batch
/// holds more than `max_num_elements` elements.
///
/// # Errors
///
/// Returns `ReaderError::Config` if the bounds are inconsistent; see
/// [`create_bucket_sizes_aligned`].
pub fn create_bucket_sizes(
    max_seq_len: usize,
    min_seq_len: usize,
    max_num_elements: usize,
) -> Result<BucketSpec> {
    create_bucket_sizes_aligned(max_seq_len, min_seq_len, max_num_elements, 1)
}

/// Like [`create_bucket_sizes`], additionally rounding every batch size
/// larger than `num_seqs_multiple_of` down to a multiple of it.
///
/// # Errors
///
/// Returns `ReaderError::Config` if `min_seq_len` is zero or larger than
/// `max_seq_len`, if `max_seq_len` exceeds `max_num_elements`, or if
/// `num_seqs_multiple_of` is zero.
pub fn create_bucket_sizes_aligned(
    max_seq_len: usize,
    min_seq_len: usize,
    max_num_elements: usize,
    num_seqs_multiple_of: usize,
) -> Result<BucketSpec> {
    if min_seq_len == 0 {
        return Err(ReaderError::config("min_seq_len must be greater than 0"));
    }
    if min_seq_len > max_seq_len {
        return Err(ReaderError::config(format!(
            "min_seq_len ({min_seq_len}) must be less than or equal to max_seq_len ({max_seq_len})"
        )));
    }
    if max_seq_len > max_num_elements {
        return Err(ReaderError::config(format!(
            "max_seq_len ({max_seq_len}) must be less than or equal to max_num_elements ({max_num_elements})"
        )));
    }
    if num_seqs_multiple_of == 0 {
        return Err(ReaderError::config(
            "num_seqs_multiple_of must be greater than 0",
        ));
    }

    let mut buckets = Vec::new();

    let mut seq_len = 1;
    let mut batch_size = max_num_elements;

    while seq_len < max_seq_len {
        if seq_len >= min_seq_len {
            buckets.push(BucketSize { batch_size, seq_len });
        }

        // `seq_len + 1 <= max_seq_len <= max_num_elements`, so never zero.
        batch_size = max_num_elements / (seq_len + 1);

        // Longest length the new batch size still affords.
        seq_len = max_num_elements / batch_size;
    }

    buckets.push(BucketSize {
        batch_size,
        seq_len: max_seq_len,
    });

    if num_seqs_multiple_of > 1 {
        for bucket in &mut buckets {
            if bucket.batch_size > num_seqs_multiple_of {
                bucket.batch_size -= bucket.batch_size % num_seqs_multiple_of;
            }
        }
    }

    Ok(BucketSpec {
        buckets,
        min_seq_len,
    })
}
