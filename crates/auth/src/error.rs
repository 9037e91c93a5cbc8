//! Auth Error Types
//!
//! Structured errors using `exn` for automatic location tracking and error
//! tree construction.
//!
//! Deliberately small: every structural anomaly in a presented token is
//! the same [`Unauthorized`](ErrorKind::Unauthorized) to the caller, and
//! the interesting distinctions (unknown user vs. wrong password) travel
//! through [`LoginFailure`](crate::LoginFailure) into the audit log, never
//! onto the wire.

use derive_more::{Display, Error};

/// An auth error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for auth operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// Missing, malformed, expired, or forged session material.
    #[display("unauthorized")]
    Unauthorized,
    /// A stored secret could not be parsed (operator error in the users file).
    #[display("malformed stored secret for user {_0}")]
    BadStoredSecret(#[error(not(source))] String),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        false
    }
}
