//! Storage Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};
use std::io::Error as IoError;

/// A storage error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for storage operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong
/// internally. Virtual paths are carried as strings; the dispatch layer
/// upstream maps each variant onto a status code without inspecting hosts.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// Virtual path has no entry on the backend
    #[display("path not found: {_0}")]
    NotFound(#[error(not(source))] String),
    /// Resolved real path lies outside the caller's scoped root
    #[display("path escapes the scoped root: {_0}")]
    Escape(#[error(not(source))] String),
    /// Normalization failure, reserved path, or bad leaf name
    #[display("invalid path: {_0}")]
    InvalidPath(#[error(not(source))] String),
    /// Destination is already occupied
    #[display("destination already exists: {_0}")]
    Conflict(#[error(not(source))] String),
    /// Moving or copying a directory into itself or a descendant
    #[display("cannot move or copy a directory into itself: {_0}")]
    IntoItself(#[error(not(source))] String),
    /// Restore target's parent directory no longer exists
    #[display("original parent directory is missing: {_0}")]
    ParentMissing(#[error(not(source))] String),
    /// Operation not expressible on this backend
    #[display("unsupported operation: {_0}")]
    Unsupported(#[error(not(source))] String),
    /// Underlying I/O error
    #[display("I/O error: {_0}")]
    Io(IoError),
    /// Network-related error (S3 connections, etc.)
    #[display("network error: {_0}")]
    Network(#[error(not(source))] String),
    /// Backend-specific upstream failure
    #[display("backend error: {_0}")]
    Backend(#[error(not(source))] String),
    /// Trash sidecar could not be read, written, or matched to its item
    #[display("trash metadata error: {_0}")]
    Sidecar(#[error(not(source))] String),
}

impl From<IoError> for ErrorKind {
    fn from(err: IoError) -> Self {
        Self::Io(err)
    }
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Io(_) | Self::Network(_) | Self::Backend(_))
    }
}
