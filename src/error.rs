//! Error types for the spill buffer.
//!
//! `BufferError` is the single error type returned by every fallible operation in
//! the crate. It is built with `thiserror` so that `std::io::Error` converts
//! automatically with the `?` operator.
//!
//! ## Error Taxonomy
//!
//! - **`Overflow`**: both tiers filled up during a write. The bytes placed before
//!   the tiers ran out stay committed, so the caller should treat this as
//!   backpressure and retry the uncommitted remainder later.
//! - **`Finished`**: a write was attempted after the producer declared completion.
//!   This is a programming error on the writer side.
//! - **`Cancelled`**: the buffer was cancelled. Terminal; every later read or write
//!   fails the same way.
//! - **`Io`**: a seek/read/write against the backing segment failed. Fatal and never
//!   retried internally; the caller decides whether to cancel the buffer.
//! - **`InvalidCapacity`** / **`Configuration`**: construction-time validation.
//! - **`TaskJoin`**: a blocking operation spawned by the async facade did not complete.

use thiserror::Error;

/// Convenience alias for results using the buffer error type.
pub type BufferResult<T> = std::result::Result<T, BufferError>;

/// Errors produced by the memory ring, the backing ring and the coordinator.
#[derive(Error, Debug)]
pub enum BufferError {
    /// Both tiers were exhausted before the whole write was placed.
    ///
    /// `committed` bytes of the write are stored and will be read back in order;
    /// the remaining `requested - committed` bytes were not accepted.
    #[error("Buffer overflow: committed {committed} of {requested} bytes")]
    Overflow {
        /// Bytes of the rejected write that were stored anyway.
        committed: usize,
        /// Length of the write that was attempted.
        requested: usize,
    },

    /// Write attempted after `finish_write`.
    #[error("Write attempted after the producer finished")]
    Finished,

    /// The buffer was cancelled.
    #[error("Buffer cancelled")]
    Cancelled,

    /// Backing segment I/O failed.
    #[error("Backing segment I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A tier was requested with an unusable capacity.
    #[error("Invalid capacity: {0}")]
    InvalidCapacity(String),

    /// Configuration values parsed but failed validation.
    #[error("Configuration validation error: {0}")]
    Configuration(String),

    /// A blocking task spawned by the async facade panicked or was aborted.
    #[error("Blocking task failed: {0}")]
    TaskJoin(String),
}

impl BufferError {
    /// Whether the error leaves the buffer permanently unusable for data transfer.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, BufferError::Cancelled)
    }

    /// Whether retrying later can succeed (backpressure rather than failure).
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(self, BufferError::Overflow { .. })
    }
}

impl From<tokio::task::JoinError> for BufferError {
    fn from(value: tokio::task::JoinError) -> Self {
        BufferError::TaskJoin(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overflow_message_reports_committed_bytes() {
        let err = BufferError::Overflow {
            committed: 32,
            requested: 40,
        };
        assert_eq!(err.to_string(), "Buffer overflow: committed 32 of 40 bytes");
        assert!(err.is_recoverable());
        assert!(!err.is_terminal());
    }

    #[test]
    fn cancelled_is_terminal() {
        assert!(BufferError::Cancelled.is_terminal());
        assert!(!BufferError::Cancelled.is_recoverable());
        assert!(!BufferError::Finished.is_terminal());
    }

    #[test]
    fn io_errors_convert_with_question_mark() {
        fn fails() -> BufferResult<()> {
            Err(std::io::Error::new(std::io::ErrorKind::Other, "disk gone"))?;
            Ok(())
        }

        match fails() {
            Err(BufferError::Io(err)) => assert_eq!(err.to_string(), "disk gone"),
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
