//! Storage adapter trait and implementations.
//!
//! This module defines the `StorageAdapter` trait, a uniform CRUD surface
//! over virtual paths shared by the local filesystem adapter and the
//! S3-compatible adapter. Callers hold a [`BackendHandle`](crate::BackendHandle)
//! and never branch on which concrete adapter is behind it.

mod local;
#[cfg(feature = "s3")]
mod s3;

pub use self::local::LocalAdapter;
#[cfg(feature = "s3")]
pub use self::s3::S3Adapter;
use crate::error::Result;
use crate::models::{Entry, ListOptions, Listing};
use async_trait::async_trait;

/// Unified interface for storage backends.
///
/// Every method takes a POSIX-style virtual path as seen by the caller
/// under their scoped root. Implementations normalize and (for the local
/// adapter) sandbox-check each path before touching anything.
///
/// # Listing order
/// `list` returns directories before files, each group sorted by name
/// case-insensitively, and reports the unpaginated `total` alongside the
/// requested page.
#[async_trait]
pub trait StorageAdapter: Send + Sync {
    /// List the members of a directory.
    async fn list(&self, path: &str, options: ListOptions) -> Result<Listing>;

    /// Metadata for a single entry, or `None` if nothing exists there.
    ///
    /// Only absence maps to `None`; any other failure raises.
    async fn stat(&self, path: &str) -> Result<Option<Entry>>;

    /// Read full file contents.
    async fn read(&self, path: &str) -> Result<Vec<u8>>;

    /// Create or overwrite a file, creating parent directories as needed.
    async fn write(&self, path: &str, data: &[u8]) -> Result<()>;

    /// Delete an entry; recursive for directories.
    ///
    /// The local adapter soft-deletes into the trash; the S3 adapter
    /// removes objects outright and is idempotent.
    async fn delete(&self, path: &str) -> Result<()>;

    /// Move an entry. Refuses occupied destinations and moves of a
    /// directory into itself or a descendant.
    async fn rename(&self, from: &str, to: &str) -> Result<()>;

    /// Copy an entry, recursively for local directories. The S3 adapter
    /// only copies single objects.
    async fn copy(&self, from: &str, to: &str) -> Result<()>;

    /// Create a directory. Idempotent locally, approximated on S3 with a
    /// zero-byte placeholder object.
    async fn mkdir(&self, path: &str) -> Result<()>;

    /// Check whether anything exists at the path.
    async fn exists(&self, path: &str) -> Result<bool>;
}
