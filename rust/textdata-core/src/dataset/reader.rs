// rust/textdata-core/src/dataset/reader.rs

use std::sync::Arc;

use super::prefetch::Prefetcher;
use super::text::{Collated, ReadPlan};
use super::traits::SequenceBatch;
use crate::error::Result;

#[cfg(feature = "async")]
use super::prefetch::AsyncPrefetcher;

/// A source of batches for a training or evaluation loop.
pub trait DataReader {
    type Batch;

    /// Reads the next group of batches for gradient accumulation.
    ///
    /// Returns up to `num_accumulate` batches; fewer only at the end of the
    /// data, and `None` once nothing is left.
    fn next_batches(&mut self) -> Result<Option<Vec<Self::Batch>>>;

    /// Restarts reading from the beginning. With unchanged options the
    /// reader yields the same batches again.
    fn reset(&mut self) -> Result<()>;

    fn dataset_name(&self) -> &str;

    fn split(&self) -> Option<&str>;
}

/// Reader over a text dataset.
///
/// Created by [`TextDataset::create_reader`](super::TextDataset::create_reader).
/// Iterating yields one [`SequenceBatch`] at a time. After the first error
/// the reader is exhausted until [`reset`](DataReader::reset) is called.
pub struct TextDataReader {
    plan: Arc<ReadPlan>,
    prefetcher: Prefetcher<Collated>,
    num_batches_read: u64,
    exhausted: bool,
}

impl TextDataReader {
    pub(crate) fn new(plan: Arc<ReadPlan>) -> Result<Self> {
        let prefetcher = plan.start()?;

        Ok(Self {
            plan,
            prefetcher,
            num_batches_read: 0,
            exhausted: false,
        })
    }

    /// Reads the next batch.
    ///
    /// # Errors
    ///
    /// Returns the first storage, encoding, collation or length error hit
    /// by the pipeline.
    pub fn next_batch(&mut self) -> Result<Option<SequenceBatch>> {
        if self.exhausted {
            return Ok(None);
        }

        match self.prefetcher.next_batch() {
            Ok(Some((data, examples))) => {
                self.num_batches_read += 1;
                Ok(Some(SequenceBatch::new(data, examples)))
            }
            Ok(None) => {
                self.exhausted = true;
                tracing::debug!(
                    "Reader for '{}' exhausted after {} batches",
                    self.plan.dataset_name,
                    self.num_batches_read
                );
                Ok(None)
            }
            Err(e) => {
                self.exhausted = true;
                Err(e)
            }
        }
    }

    /// Number of batches returned since creation or the last reset.
    pub fn num_batches_read(&self) -> u64 {
        self.num_batches_read
    }

    /// Returns true if items are prepared on a background thread.
    pub fn is_prefetching(&self) -> bool {
        self.prefetcher.is_prefetching_enabled()
    }

    /// Hands the rest of the stream over to a tokio blocking task.
    ///
    /// Reading continues where this reader stopped. Must be called from
    /// within a tokio runtime.
    #[cfg(feature = "async")]
    pub fn into_async(self) -> AsyncPrefetcher<SequenceBatch> {
        let buffer_size = self.plan.options.num_prefetch;
        AsyncPrefetcher::new(Box::new(self), buffer_size)
    }
}

impl DataReader for TextDataReader {
    type Batch = SequenceBatch;

    fn next_batches(&mut self) -> Result<Option<Vec<SequenceBatch>>> {
        let num_accumulate = self.plan.options.num_accumulate;

        let mut batches = Vec::with_capacity(num_accumulate);
        while batches.len() < num_accumulate {
            match self.next_batch()? {
                Some(batch) => batches.push(batch),
                None => break,
            }
        }

        Ok((!batches.is_empty()).then_some(batches))
    }

    fn reset(&mut self) -> Result<()> {
        // Stop the old producer before starting a new one.
        self.prefetcher.stop();
        self.prefetcher = self.plan.start()?;
        self.num_batches_read = 0;
        self.exhausted = false;
        Ok(())
    }

    fn dataset_name(&self) -> &str {
        &self.plan.dataset_name
    }

    fn split(&self) -> Option<&str> {
        self.plan.split.as_deref()
    }
}

impl Iterator for TextDataReader {
    type Item = Result<SequenceBatch>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_batch().transpose()
    }
}
