//! Configuration Error Types
//!
//! Structured errors using `exn` for automatic location tracking and error
//! tree construction. Everything here is fatal at startup; nothing is
//! worth retrying without an operator fixing the environment first.

use derive_more::{Display, Error};

/// A configuration error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for configuration loading.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// Environment variables missing or of the wrong shape.
    #[display("invalid environment configuration")]
    Environment,
    /// No user source configured (USERS_JSON, USERS_FILE, or ADMIN_PASSWORD).
    #[display("no users configured")]
    NoUsers,
    /// The users document could not be read or parsed.
    #[display("users registry is unreadable: {_0}")]
    Users(#[error(not(source))] String),
    /// A user's root does not resolve inside FILE_ROOT.
    #[display("root for user {_0} is invalid or outside FILE_ROOT")]
    Root(#[error(not(source))] String),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        false
    }
}
