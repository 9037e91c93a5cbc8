//! Error-to-status mapping contract.
//!
//! The HTTP dispatch layer above this workspace is a deliberately thin
//! 1:1 mapper: it takes whatever error a core call returned, asks for a
//! status code and a caller-visible message, and renders
//! `{"error": <message>}`. Nothing internal leaks: sandbox escapes render
//! as a generic "Path not found." and every login failure collapses into
//! one message while the audit log keeps the real reason.

pub use crate::error::ErrorKind as ServiceErrorKind;
use stash_auth::error::ErrorKind as AuthErrorKind;
use stash_storage::error::ErrorKind as StorageErrorKind;

/// Message shown whenever a path cannot or must not be disclosed.
pub const PATH_NOT_FOUND: &str = "Path not found.";
/// The single message every login failure collapses into.
pub const INVALID_CREDENTIALS: &str = "Invalid credentials.";

/// Status code plus caller-visible message for an error kind.
pub trait HttpStatus {
    fn status_code(&self) -> u16;
    fn user_message(&self) -> String;
}

impl HttpStatus for StorageErrorKind {
    fn status_code(&self) -> u16 {
        match self {
            Self::NotFound(_) => 404,
            Self::Conflict(_) | Self::ParentMissing(_) => 409,
            // Escapes are 400s but deliberately indistinguishable from a
            // missing path in the message.
            Self::Escape(_) => 400,
            Self::InvalidPath(_) | Self::IntoItself(_) | Self::Unsupported(_) => 400,
            Self::Io(_) | Self::Network(_) | Self::Backend(_) | Self::Sidecar(_) => 500,
        }
    }

    fn user_message(&self) -> String {
        match self {
            Self::NotFound(_) | Self::Escape(_) => PATH_NOT_FOUND.to_string(),
            Self::Conflict(_) => "Destination already exists.".to_string(),
            Self::ParentMissing(_) => "Original location no longer exists.".to_string(),
            Self::InvalidPath(_) => "Invalid path.".to_string(),
            Self::IntoItself(_) => "Cannot move a folder into itself.".to_string(),
            Self::Unsupported(_) => self.to_string(),
            Self::Io(_) | Self::Network(_) | Self::Backend(_) | Self::Sidecar(_) => {
                "Storage operation failed.".to_string()
            }
        }
    }
}

impl HttpStatus for AuthErrorKind {
    fn status_code(&self) -> u16 {
        401
    }

    fn user_message(&self) -> String {
        "Unauthorized.".to_string()
    }
}

impl HttpStatus for ServiceErrorKind {
    fn status_code(&self) -> u16 {
        match self {
            Self::Forbidden => 403,
            Self::PayloadTooLarge(_) => 413,
            Self::InvalidRequest(_) | Self::AtLimit(_) | Self::NotConnected => 400,
            Self::UnknownProfile(_) => 404,
            Self::Store(_) | Self::Audit(_) => 500,
        }
    }

    fn user_message(&self) -> String {
        match self {
            Self::Forbidden => "Forbidden.".to_string(),
            // AtLimit carries its specific message onto the wire.
            Self::PayloadTooLarge(_) | Self::AtLimit(_) | Self::NotConnected => self.to_string(),
            Self::InvalidRequest(message) => message.clone(),
            Self::UnknownProfile(_) => "Unknown S3 configuration.".to_string(),
            Self::Store(_) | Self::Audit(_) => "Internal error.".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_render_exactly_like_missing_paths() {
        let escape = StorageErrorKind::Escape("/jump/x".to_string());
        let missing = StorageErrorKind::NotFound("/nope".to_string());
        assert_eq!(escape.user_message(), missing.user_message());
        assert_eq!(escape.status_code(), 400);
        assert_eq!(missing.status_code(), 404);
    }

    #[test]
    fn the_taxonomy_maps_onto_the_documented_codes() {
        assert_eq!(StorageErrorKind::Conflict("/x".into()).status_code(), 409);
        assert_eq!(StorageErrorKind::InvalidPath("/x".into()).status_code(), 400);
        assert_eq!(
            StorageErrorKind::Backend("boom".into()).status_code(),
            500
        );
        assert_eq!(AuthErrorKind::Unauthorized.status_code(), 401);
        assert_eq!(ServiceErrorKind::Forbidden.status_code(), 403);
        assert_eq!(ServiceErrorKind::PayloadTooLarge(200 * 1024).status_code(), 413);
        assert_eq!(ServiceErrorKind::AtLimit(5).status_code(), 400);
    }

    #[test]
    fn at_limit_keeps_its_specific_message() {
        let message = ServiceErrorKind::AtLimit(5).user_message();
        assert!(message.contains('5'));
        assert!(message.to_lowercase().contains("limit"));
    }
}
