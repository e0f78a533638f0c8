// rust/textdata-core/src/dataset/shuffle.rs

//! Seeded windowed shuffling of a fallible stream.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::Result;

/// Shuffles a stream through a buffer of `window` items.
///
/// The buffer is filled from upstream, then every pull emits a uniformly
/// chosen buffered item and refills the freed slot. A window of `0` buffers
/// the whole stream (global shuffle); a window of `1` passes items through
/// in order. The permutation depends only on the seed and the input, so
/// two processes shuffling the same stream with the same seed agree.
///
/// Upstream errors are forwarded as soon as they are seen. A stop flag,
/// when attached, is checked before every upstream pull; once it is set the
/// buffer is discarded and the stream ends.
pub struct WindowShuffle<I, T> {
    inner: I,
    window: usize,
    buffer: Vec<T>,
    rng: StdRng,
    upstream_done: bool,
    stop_flag: Option<Arc<AtomicBool>>,
}

impl<I, T> WindowShuffle<I, T>
where
    I: Iterator<Item = Result<T>>,
{
    pub fn new(inner: I, window: usize, seed: u64) -> Self {
        let window = if window == 0 { usize::MAX } else { window };

        Self {
            inner,
            window,
            buffer: Vec::new(),
            rng: StdRng::seed_from_u64(seed),
            upstream_done: false,
            stop_flag: None,
        }
    }

    /// Ends the stream early once `stop_flag` is set.
    pub fn with_stop_flag(mut self, stop_flag: Arc<AtomicBool>) -> Self {
        self.stop_flag = Some(stop_flag);
        self
    }

    fn is_stopped(&self) -> bool {
        self.stop_flag
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
    }
}

impl<I, T> Iterator for WindowShuffle<I, T>
where
    I: Iterator<Item = Result<T>>,
{
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.upstream_done && self.buffer.len() < self.window {
            if self.is_stopped() {
                self.upstream_done = true;
                self.buffer.clear();
                return None;
            }

            match self.inner.next() {
                Some(Ok(item)) => self.buffer.push(item),
                Some(Err(e)) => return Some(Err(e)),
                None => self.upstream_done = true,
            }
        }

        if self.buffer.is_empty() {
            return None;
        }

        let idx = self.rng.random_range(0..self.buffer.len());

        Some(Ok(self.buffer.swap_remove(idx)))
    }
}
