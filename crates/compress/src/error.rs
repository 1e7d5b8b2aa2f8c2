//! Compression Session Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction. Delegate failures are raised with
//! the delegate's own error tree intact, never reinterpreted.

use derive_more::{Display, Error};

/// A compression error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for compression operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
/// The two successful outcomes of a call ("more pending" and "stream
/// complete") are not errors; see [`Status`](crate::Status).
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The caller broke the protocol (level out of range, input after the
    /// end-of-stream signal, ...). Session state is left unchanged.
    #[display("invalid argument: {_0}")]
    InvalidArgument(#[error(not(source))] String),
    /// A buffer could not grow. The session can only be destroyed.
    #[display("out of memory")]
    OutOfMemory,
    /// The batch compressor failed or produced no output.
    #[display("batch compressor failed")]
    Backend,
    /// The fast-path delegate reported a failure of its own.
    #[display("fast-path delegate failed")]
    Delegate,
    /// The fast-path delegate never initialized (or has been torn down).
    #[display("fast-path delegate unavailable")]
    DelegateUnavailable,
    /// A bookkeeping invariant did not hold. Indicates a bug, not bad input.
    #[display("internal error: {_0}")]
    Internal(#[error(not(source))] String),
    /// An earlier failure left the session unusable; destroy it.
    #[display("session failed and can only be destroyed")]
    SessionFailed,
    /// Reading host input or writing host output failed.
    #[display("I/O error")]
    Io,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorKind::Io)
    }

    /// Returns `true` if the session that produced this error must not be
    /// used for anything other than destruction.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ErrorKind::InvalidArgument(_) | ErrorKind::Io)
    }
}
