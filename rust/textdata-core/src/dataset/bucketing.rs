// rust/textdata-core/src/dataset/bucketing.rs

//! Grouping of examples into (not yet collated) batches.

use std::mem;

use super::buckets::BucketSpec;
use crate::error::{Result, ReaderError};

/// Options of [`BucketByLength`].
#[derive(Debug, Clone)]
pub struct BucketByLengthOptions {
    /// Examples shorter than this never enter a bucket.
    pub min_data_len: usize,
    /// Skip examples shorter than `min_data_len` instead of failing.
    pub skip_below_min_examples: bool,
    /// Skip examples longer than the last bucket instead of failing.
    pub skip_above_max_examples: bool,
    /// Drop partially filled buckets at the end of the stream.
    pub drop_remainder: bool,
}

/// Counters of examples that did not make it into a batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BucketStats {
    pub skipped_below_min: u64,
    pub skipped_above_max: u64,
    pub dropped_in_remainder: u64,
}

/// Groups examples by length.
///
/// Every example is routed to the first bucket of `spec` whose `seq_len`
/// admits it. A bucket is emitted as soon as it holds `batch_size`
/// examples. Once upstream is exhausted the partially filled buckets are
/// emitted shortest first, unless `drop_remainder` is set.
pub struct BucketByLength<I, T, F> {
    inner: I,
    spec: BucketSpec,
    selector: F,
    options: BucketByLengthOptions,
    buffers: Vec<Vec<T>>,
    flush_index: usize,
    upstream_done: bool,
    stats: BucketStats,
    dataset_name: String,
}

impl<I, T, F> BucketByLength<I, T, F>
where
    I: Iterator<Item = Result<T>>,
    F: Fn(&T) -> usize,
{
    /// `selector` returns the length used to pick a bucket.
    pub fn new(
        inner: I,
        spec: BucketSpec,
        selector: F,
        options: BucketByLengthOptions,
        dataset_name: impl Into<String>,
    ) -> Self {
        let buffers = spec
            .buckets()
            .iter()
            .map(|b| Vec::with_capacity(b.batch_size))
            .collect();

        Self {
            inner,
            spec,
            selector,
            options,
            buffers,
            flush_index: 0,
            upstream_done: false,
            stats: BucketStats::default(),
            dataset_name: dataset_name.into(),
        }
    }

    pub fn stats(&self) -> BucketStats {
        self.stats
    }

    fn route(&mut self, item: T) -> Result<Option<Vec<T>>> {
        let seq_len = (self.selector)(&item);

        if seq_len < self.options.min_data_len {
            if self.options.skip_below_min_examples {
                self.stats.skipped_below_min += 1;
                return Ok(None);
            }
            return Err(ReaderError::dataset(
                &self.dataset_name,
                format!(
                    "example of length {seq_len} is shorter than the minimum length {}",
                    self.options.min_data_len
                ),
            ));
        }

        let Some(idx) = self.spec.bucket_for(seq_len) else {
            if self.options.skip_above_max_examples {
                self.stats.skipped_above_max += 1;
                return Ok(None);
            }
            return Err(ReaderError::dataset(
                &self.dataset_name,
                format!(
                    "example of length {seq_len} is longer than the maximum length {}",
                    self.spec.max_seq_len()
                ),
            ));
        };

        let batch_size = self.spec.buckets()[idx].batch_size;
        let buffer = &mut self.buffers[idx];

        buffer.push(item);

        if buffer.len() >= batch_size {
            let full = mem::replace(buffer, Vec::with_capacity(batch_size));
            return Ok(Some(full));
        }

        Ok(None)
    }

    fn finish(&mut self) {
        self.upstream_done = true;

        if self.options.drop_remainder {
            self.stats.dropped_in_remainder =
                self.buffers.iter().map(|b| b.len() as u64).sum();
            self.buffers.iter_mut().for_each(Vec::clear);
        }

        tracing::debug!(
            "Length bucketing of '{}' done: {} below min, {} above max, {} dropped in remainder",
            self.dataset_name,
            self.stats.skipped_below_min,
            self.stats.skipped_above_max,
            self.stats.dropped_in_remainder
        );
    }
}

impl<I, T, F> Iterator for BucketByLength<I, T, F>
where
    I: Iterator<Item = Result<T>>,
    F: Fn(&T) -> usize,
{
    type Item = Result<Vec<T>>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.upstream_done {
            match self.inner.next() {
                Some(Ok(item)) => match self.route(item) {
                    Ok(Some(batch)) => return Some(Ok(batch)),
                    Ok(None) => {}
                    Err(e) => return Some(Err(e)),
                },
                Some(Err(e)) => return Some(Err(e)),
                None => self.finish(),
            }
        }

        while self.flush_index < self.buffers.len() {
            let batch = mem::take(&mut self.buffers[self.flush_index]);
            self.flush_index += 1;

            if !batch.is_empty() {
                return Some(Ok(batch));
            }
        }

        None
    }
}

/// Groups consecutive items into batches of `batch_size`.
///
/// The final batch may be smaller unless `drop_remainder` is set, in which
/// case it is dropped.
pub struct Bucket<I, T> {
    inner: I,
    batch_size: usize,
    drop_remainder: bool,
    done: bool,
    _marker: std::marker::PhantomData<fn() -> T>,
}

impl<I, T> Bucket<I, T>
where
    I: Iterator<Item = Result<T>>,
{
    /// # Errors
    ///
    /// Returns `ReaderError::Config` if `batch_size` is zero.
    pub fn new(inner: I, batch_size: usize, drop_remainder: bool) -> Result<Self> {
        if batch_size == 0 {
            return Err(ReaderError::config("batch_size must be greater than 0"));
        }

        Ok(Self {
            inner,
            batch_size,
            drop_remainder,
            done: false,
            _marker: std::marker::PhantomData,
        })
    }
}

impl<I, T> Iterator for Bucket<I, T>
where
    I: Iterator<Item = Result<T>>,
{
    type Item = Result<Vec<T>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let mut batch = Vec::with_capacity(self.batch_size);

        while batch.len() < self.batch_size {
            match self.inner.next() {
                Some(Ok(item)) => batch.push(item),
                Some(Err(e)) => return Some(Err(e)),
                None => {
                    self.done = true;
                    break;
                }
            }
        }

        if batch.is_empty() || (batch.len() < self.batch_size && self.drop_remainder) {
            return None;
        }

        Some(Ok(batch))
    }
}
