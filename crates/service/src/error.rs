//! Service Error Types
//!
//! Structured errors using `exn` for automatic location tracking and error
//! tree construction. These are the process-wide service failures that sit
//! above the storage adapters: policy refusals, registry limits, and the
//! persisted-profile document.

use derive_more::{Display, Error};
use uuid::Uuid;

/// A service error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for service operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// The caller's role lacks the capability.
    #[display("forbidden")]
    Forbidden,
    /// File exceeds a preview/edit cap.
    #[display("file exceeds the {_0} byte limit")]
    PayloadTooLarge(#[error(not(source))] u64),
    /// Malformed or unacceptable request input.
    #[display("invalid request: {_0}")]
    InvalidRequest(#[error(not(source))] String),
    /// The distinct-configuration connection cap is hit.
    #[display("S3 connection limit reached ({_0} configurations active)")]
    AtLimit(#[error(not(source))] usize),
    /// The session has no live binding for that configuration.
    #[display("not connected to that S3 configuration")]
    NotConnected,
    /// No stored profile with that id.
    #[display("unknown S3 configuration: {_0}")]
    UnknownProfile(#[error(not(source))] Uuid),
    /// The settings document could not be read, parsed, or written.
    #[display("settings store error: {_0}")]
    Store(#[error(not(source))] String),
    /// The audit log could not be appended.
    #[display("audit log error: {_0}")]
    Audit(#[error(not(source))] String),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Store(_) | Self::Audit(_))
    }
}
