//! Async facade over a shared [`BufferCoordinator`].
//!
//! The coordinator blocks the calling thread while a reader waits for data, which
//! must never happen on a runtime worker. `AsyncBuffer` moves the potentially
//! blocking calls onto tokio's blocking pool with `spawn_blocking`; the
//! non-blocking signals (`finish_write`, `cancel`) and queries run inline.

use std::sync::Arc;

use crate::data::coordinator::{BufferCoordinator, BufferStats, ReadTimeout};
use crate::data::segment::Segment;
use crate::error::BufferResult;

/// Cloneable async handle to a coordinator.
pub struct AsyncBuffer<S: Segment + 'static> {
    inner: Arc<BufferCoordinator<S>>,
}

impl<S: Segment + 'static> Clone for AsyncBuffer<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: Segment + 'static> std::fmt::Debug for AsyncBuffer<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncBuffer")
            .field("inner", &self.inner)
            .finish()
    }
}

impl<S: Segment + 'static> AsyncBuffer<S> {
    /// Wrap a coordinator for async use.
    pub fn new(buffer: BufferCoordinator<S>) -> Self {
        Self {
            inner: Arc::new(buffer),
        }
    }

    /// Wrap an already shared coordinator.
    pub fn from_shared(inner: Arc<BufferCoordinator<S>>) -> Self {
        Self { inner }
    }

    /// The shared coordinator, for use from plain threads.
    pub fn shared(&self) -> Arc<BufferCoordinator<S>> {
        Arc::clone(&self.inner)
    }

    /// Append `data` on the blocking pool.
    ///
    /// # Errors
    /// Same as [`BufferCoordinator::write`], plus
    /// [`BufferError::TaskJoin`](crate::BufferError::TaskJoin) if the task fails.
    pub async fn write(&self, data: Vec<u8>) -> BufferResult<()> {
        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || inner.write(&data)).await?
    }

    /// Read up to `max_bytes`, waiting on the blocking pool for at most `timeout`.
    ///
    /// # Errors
    /// Same as [`BufferCoordinator::read`], plus
    /// [`BufferError::TaskJoin`](crate::BufferError::TaskJoin) if the task fails.
    pub async fn read(&self, max_bytes: usize, timeout: ReadTimeout) -> BufferResult<Vec<u8>> {
        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || inner.read_to_vec(max_bytes, timeout)).await?
    }

    /// See [`BufferCoordinator::finish_write`].
    pub fn finish_write(&self) {
        self.inner.finish_write();
    }

    /// See [`BufferCoordinator::cancel`].
    pub fn cancel(&self) {
        self.inner.cancel();
    }

    /// See [`BufferCoordinator::stats`].
    pub fn stats(&self) -> BufferStats {
        self.inner.stats()
    }
}
