// rust/textdata-core/src/dataset/prefetch.rs

//! Background prefetching of pipeline output.
//!
//! A [`Prefetcher`] drives an iterator on a dedicated thread and hands its
//! items over through a bounded channel, so the consumer only blocks when
//! the producer has fallen behind. [`AsyncPrefetcher`] does the same for
//! consumers running on a tokio runtime.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam::channel::{self, Receiver};

use crate::error::{Result, ReaderError};

/// Boxed pipeline stream handed to a prefetcher.
pub type BoxedStream<T> = Box<dyn Iterator<Item = Result<T>> + Send>;

/// Configuration for prefetching behavior.
#[derive(Debug, Clone)]
pub struct PrefetchConfig {
    /// Number of items buffered ahead of the consumer. `0` disables the
    /// background thread.
    pub buffer_size: usize,
    /// Name of the producer thread.
    pub thread_name: String,
    /// Flag raised on stop. Share it with stages that buffer many items
    /// so they can bail out early; a fresh one is used when unset.
    pub stop_flag: Option<Arc<AtomicBool>>,
}

impl Default for PrefetchConfig {
    fn default() -> Self {
        Self {
            buffer_size: 1,
            thread_name: "textdata-prefetch".to_string(),
            stop_flag: None,
        }
    }
}

/// An iterator that computes the items of another one on a background
/// thread.
///
/// At most `buffer_size` items are produced ahead of the consumer. Dropping
/// the prefetcher signals the producer to stop and joins it.
pub struct Prefetcher<T> {
    /// Receiving side of the bounded channel. Taken on drop.
    receiver: Option<Receiver<Result<T>>>,
    /// Flag to signal the producer thread to stop.
    stop_flag: Arc<AtomicBool>,
    /// Handle to the producer thread.
    worker: Option<JoinHandle<()>>,
    /// Inline source when prefetching is disabled.
    fallback_iter: Option<BoxedStream<T>>,
    /// Set once the end of the stream or an error has been returned.
    exhausted: bool,
}

impl<T: Send + 'static> Prefetcher<T> {
    /// Starts prefetching from `source`.
    ///
    /// # Arguments
    ///
    /// * `source` - The stream to drive.
    /// * `config` - Prefetching configuration.
    ///
    /// # Errors
    ///
    /// Returns `ReaderError::Pipeline` if the producer thread cannot be
    /// spawned.
    pub fn new(source: BoxedStream<T>, config: PrefetchConfig) -> Result<Self> {
        let stop_flag = config.stop_flag.unwrap_or_default();

        if config.buffer_size == 0 {
            return Ok(Self {
                receiver: None,
                stop_flag,
                worker: None,
                fallback_iter: Some(source),
                exhausted: false,
            });
        }

        let (sender, receiver) = channel::bounded(config.buffer_size);
        let stop_flag_clone = stop_flag.clone();

        let worker = thread::Builder::new()
            .name(config.thread_name)
            .spawn(move || {
                let mut source = source;

                while !stop_flag_clone.load(Ordering::Relaxed) {
                    match source.next() {
                        Some(Ok(item)) => {
                            // Fails once the consumer is gone.
                            if sender.send(Ok(item)).is_err() {
                                break;
                            }
                        }
                        Some(Err(e)) => {
                            let _ = sender.send(Err(e));
                            break;
                        }
                        None => break,
                    }
                }
            })
            .map_err(|e| ReaderError::pipeline(format!("failed to spawn prefetch thread: {e}")))?;

        Ok(Self {
            receiver: Some(receiver),
            stop_flag,
            worker: Some(worker),
            fallback_iter: None,
            exhausted: false,
        })
    }

    /// Gets the next item, blocking until the producer has one.
    ///
    /// # Errors
    ///
    /// Forwards the first error of the source. Returns
    /// `ReaderError::Pipeline` if the producer thread panicked.
    pub fn next_batch(&mut self) -> Result<Option<T>> {
        if self.exhausted {
            return Ok(None);
        }

        if let Some(iter) = self.fallback_iter.as_mut() {
            let result = iter.next().transpose();
            if !matches!(result, Ok(Some(_))) {
                self.exhausted = true;
            }
            return result;
        }

        let received = match self.receiver.as_ref() {
            Some(receiver) => receiver.recv().ok(),
            None => None,
        };

        match received {
            Some(Ok(item)) => Ok(Some(item)),
            Some(Err(e)) => {
                self.exhausted = true;
                Err(e)
            }
            None => {
                // Channel closed: the producer is done, normally or not.
                self.exhausted = true;
                match self.worker.take().map(JoinHandle::join) {
                    Some(Err(_)) => Err(ReaderError::pipeline("prefetch thread panicked")),
                    _ => Ok(None),
                }
            }
        }
    }

    /// Returns true if items are produced on a background thread.
    pub fn is_prefetching_enabled(&self) -> bool {
        self.fallback_iter.is_none()
    }

    /// Returns the number of items waiting in the buffer.
    pub fn queue_len(&self) -> usize {
        self.receiver.as_ref().map_or(0, Receiver::len)
    }
}

impl<T> Prefetcher<T> {
    /// Stops the producer thread and waits for it to finish.
    pub fn stop(&mut self) {
        self.stop_flag.store(true, Ordering::Relaxed);

        // Unblocks a producer waiting on a full channel.
        self.receiver.take();

        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

impl<T: Send + 'static> Iterator for Prefetcher<T> {
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_batch().transpose()
    }
}

impl<T> Drop for Prefetcher<T> {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Async prefetcher using a tokio blocking task.
///
/// This is the counterpart of [`Prefetcher`] for consumers that live on a
/// tokio runtime and must not block it.
#[cfg(feature = "async")]
pub struct AsyncPrefetcher<T> {
    /// Receiver for prefetched items.
    receiver: tokio::sync::mpsc::Receiver<Result<T>>,
    /// Flag to signal the producer to stop.
    stop_flag: Arc<AtomicBool>,
    /// Handle to the producer task.
    task_handle: Option<tokio::task::JoinHandle<()>>,
    /// Whether we've seen the end.
    exhausted: bool,
}

#[cfg(feature = "async")]
impl<T: Send + 'static> AsyncPrefetcher<T> {
    /// Creates a new async prefetcher. A `buffer_size` of `0` is treated as
    /// `1`.
    ///
    /// Note: This must be called from within a tokio runtime.
    pub fn new(source: BoxedStream<T>, buffer_size: usize) -> Self {
        let (sender, receiver) = tokio::sync::mpsc::channel(buffer_size.max(1));
        let stop_flag = Arc::new(AtomicBool::new(false));
        let stop_flag_clone = stop_flag.clone();

        let task_handle = tokio::task::spawn_blocking(move || {
            let mut source = source;

            while !stop_flag_clone.load(Ordering::Relaxed) {
                match source.next() {
                    Some(Ok(item)) => {
                        if sender.blocking_send(Ok(item)).is_err() {
                            break;
                        }
                    }
                    Some(Err(e)) => {
                        let _ = sender.blocking_send(Err(e));
                        break;
                    }
                    None => break,
                }
            }
        });

        Self {
            receiver,
            stop_flag,
            task_handle: Some(task_handle),
            exhausted: false,
        }
    }

    /// Gets the next item asynchronously.
    ///
    /// # Errors
    ///
    /// Forwards the first error of the source. Returns
    /// `ReaderError::Pipeline` if the producer task panicked.
    pub async fn next_batch(&mut self) -> Result<Option<T>> {
        if self.exhausted {
            return Ok(None);
        }

        match self.receiver.recv().await {
            Some(Ok(item)) => Ok(Some(item)),
            Some(Err(e)) => {
                self.exhausted = true;
                Err(e)
            }
            None => {
                self.exhausted = true;
                match self.task_handle.take() {
                    Some(handle) => match handle.await {
                        Err(e) if e.is_panic() => {
                            Err(ReaderError::pipeline("prefetch task panicked"))
                        }
                        _ => Ok(None),
                    },
                    None => Ok(None),
                }
            }
        }
    }
}

#[cfg(feature = "async")]
impl<T> Drop for AsyncPrefetcher<T> {
    fn drop(&mut self) {
        self.stop_flag.store(true, Ordering::Relaxed);
    }
}
