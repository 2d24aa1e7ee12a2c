//! Error types shared by every lock in the crate.
//!
//! Errors fall into two groups:
//!
//! - **usage errors** ([`Error::IllegalState`], [`Error::InvalidArgument`]):
//!   the caller broke the locking protocol (released a lock it does not hold,
//!   waited on a condition without its lock, built a lock with a bad permit
//!   count). They are fatal for the operation and are never corrected silently.
//! - **recoverable signals** ([`Error::Interrupted`], [`Error::Unsupported`]):
//!   the operation did not take place and the caller is expected to branch on it.
//!
//! Contention never shows up here, and a timed acquisition that runs out of
//! time reports `Ok(false)` rather than an error.

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors reported by synchronizers, locks and conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Error {
    /// The calling thread does not hold the lock the operation requires.
    #[error("illegal lock state: {0}")]
    IllegalState(&'static str),

    /// A lock was constructed or called with an argument outside its domain.
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    /// The thread was interrupted while blocked; its queue node was cancelled.
    #[error("interrupted while waiting")]
    Interrupted,

    /// The lock does not offer this operation.
    #[error("operation not supported: {0}")]
    Unsupported(&'static str),
}

impl Error {
    /// Returns `true` for programmer errors that must not be retried.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::IllegalState(_) | Self::InvalidArgument(_))
    }
}
