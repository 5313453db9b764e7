//! Error types for the tabula write path
//!
//! This module defines all error types shared by the key codecs and the
//! operation lifecycle. We use `thiserror` for automatic `Display` and `Error`
//! trait implementations.
//!
//! Errors are `Clone` because a single status is fanned out to completion
//! callbacks and synchronizers after it has been logged.

use thiserror::Error;

/// Result type alias for tabula operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the tabula write path
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// An encoded key field could not be decoded
    ///
    /// Raised for a missing terminator, a truncated escape sequence, or an
    /// invalid escape byte. Any partially decoded output must be discarded.
    #[error("Malformed encoding: {0}")]
    MalformedEncoding(String),

    /// On-disk data failed validation
    #[error("Data corruption: {0}")]
    Corruption(String),

    /// Operation attempted in a state that does not allow it
    #[error("Illegal state: {0}")]
    IllegalState(String),

    /// Caller supplied an argument outside the accepted domain
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Operation was aborted before it could be applied
    #[error("Operation aborted: {0}")]
    Aborted(String),

    /// Storage layer error
    #[error("Storage error: {0}")]
    Storage(String),
}

impl Error {
    /// Build a `MalformedEncoding` error
    pub fn malformed(msg: impl Into<String>) -> Self {
        Error::MalformedEncoding(msg.into())
    }

    /// Build a `Corruption` error
    pub fn corruption(msg: impl Into<String>) -> Self {
        Error::Corruption(msg.into())
    }

    /// Build an `IllegalState` error
    pub fn illegal_state(msg: impl Into<String>) -> Self {
        Error::IllegalState(msg.into())
    }

    /// True if this is a decode-time encoding error
    pub fn is_malformed_encoding(&self) -> bool {
        matches!(self, Error::MalformedEncoding(_))
    }

    /// True if this is a corruption error
    pub fn is_corruption(&self) -> bool {
        matches!(self, Error::Corruption(_))
    }

    /// True if this is an illegal-state error
    pub fn is_illegal_state(&self) -> bool {
        matches!(self, Error::IllegalState(_))
    }
}
