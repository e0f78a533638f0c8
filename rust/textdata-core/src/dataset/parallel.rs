// rust/textdata-core/src/dataset/parallel.rs

//! Bounded parallel mapping over a stream.
//!
//! Used to run collation on several batches at once. The stream is pulled
//! in chunks of `num_parallel_calls` items; each chunk is mapped on a
//! dedicated rayon pool and its results are emitted in input order before
//! the next chunk is pulled. With `max_items` set, chunks shrink so that
//! no item past the limit is ever pulled.

use std::collections::VecDeque;

use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::error::{Result, ReaderError};

/// Configuration for parallel mapping.
#[derive(Debug, Clone)]
pub struct ParallelMapConfig {
    /// Maximum number of concurrent calls. `0` and `1` map inline.
    pub num_parallel_calls: usize,
    /// Name prefix of the worker threads.
    pub thread_name: String,
    /// Upper bound on the number of items pulled from upstream.
    pub max_items: Option<usize>,
}

impl Default for ParallelMapConfig {
    fn default() -> Self {
        Self {
            num_parallel_calls: 1,
            thread_name: "textdata-map".to_string(),
            max_items: None,
        }
    }
}

/// Maps `f` over a fallible stream with up to `num_parallel_calls`
/// concurrent calls.
pub struct ParallelMap<I, T, U, F> {
    inner: I,
    f: F,
    pool: Option<ThreadPool>,
    chunk_size: usize,
    remaining: Option<usize>,
    ready: VecDeque<Result<U>>,
    pending_error: Option<ReaderError>,
    upstream_done: bool,
    _marker: std::marker::PhantomData<fn(T)>,
}

impl<I, T, U, F> ParallelMap<I, T, U, F>
where
    I: Iterator<Item = Result<T>>,
    T: Send,
    U: Send,
    F: Fn(T) -> Result<U> + Send + Sync,
{
    /// Creates the stage, spawning the worker pool if more than one
    /// parallel call is requested.
    ///
    /// # Errors
    ///
    /// Returns `ReaderError::Config` if the worker pool cannot be created.
    pub fn new(inner: I, f: F, config: ParallelMapConfig) -> Result<Self> {
        let chunk_size = config.num_parallel_calls.max(1);

        let pool = if chunk_size > 1 {
            let prefix = config.thread_name.clone();
            let pool = ThreadPoolBuilder::new()
                .num_threads(chunk_size)
                .thread_name(move |i| format!("{prefix}-{i}"))
                .build()
                .map_err(|e| ReaderError::config_with_source("failed to create worker pool", e))?;
            Some(pool)
        } else {
            None
        };

        Ok(Self {
            inner,
            f,
            pool,
            chunk_size,
            remaining: config.max_items,
            ready: VecDeque::with_capacity(chunk_size),
            pending_error: None,
            upstream_done: false,
            _marker: std::marker::PhantomData,
        })
    }

    /// Pulls the next chunk from upstream and maps it.
    fn fill(&mut self) {
        let limit = self
            .remaining
            .map_or(self.chunk_size, |remaining| remaining.min(self.chunk_size));
        if limit == 0 {
            self.upstream_done = true;
            return;
        }

        let mut chunk = Vec::with_capacity(limit);

        while chunk.len() < limit {
            match self.inner.next() {
                Some(Ok(item)) => chunk.push(item),
                Some(Err(e)) => {
                    // Emit what was read before the failure, then the failure.
                    self.pending_error = Some(e);
                    self.upstream_done = true;
                    break;
                }
                None => {
                    self.upstream_done = true;
                    break;
                }
            }
        }

        if let Some(remaining) = self.remaining.as_mut() {
            *remaining -= chunk.len();
        }

        let f = &self.f;
        let mapped: Vec<Result<U>> = match &self.pool {
            Some(pool) if chunk.len() > 1 => {
                pool.install(|| chunk.into_par_iter().map(f).collect())
            }
            _ => chunk.into_iter().map(f).collect(),
        };

        self.ready.extend(mapped);
    }
}

impl<I, T, U, F> Iterator for ParallelMap<I, T, U, F>
where
    I: Iterator<Item = Result<T>>,
    T: Send,
    U: Send,
    F: Fn(T) -> Result<U> + Send + Sync,
{
    type Item = Result<U>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.ready.is_empty() && !self.upstream_done {
            self.fill();
        }

        if let Some(item) = self.ready.pop_front() {
            return Some(item);
        }

        self.pending_error.take().map(Err)
    }
}
