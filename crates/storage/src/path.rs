//! Virtual path handling and sandbox containment.
//!
//! Callers address storage through POSIX-style virtual paths rooted at `/`.
//! This module normalizes those paths, resolves them against a user's
//! symlink-resolved host root, and refuses anything that would land outside
//! it. The `.trash` subtree is reserved for the local adapter's own
//! bookkeeping and is never addressable through the public surface.

use crate::error::{ErrorKind, Result};
use std::path::{Path, PathBuf};

/// Reserved top-level segment holding trashed items and their sidecars.
pub const TRASH_SEGMENT: &str = ".trash";

/// A virtual path resolved against a host root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    /// Normalized virtual form, always starting with `/`.
    pub normalized: String,
    /// Host location. For [`resolve_safe`] this is a realpath; for
    /// [`resolve_destination`] the leaf may not exist yet.
    pub host_path: PathBuf,
}

/// Normalize a raw request path into canonical virtual form.
///
/// Backslashes become slashes, a leading `/` is ensured, and `.`, `..`, and
/// duplicate separators collapse. `..` clamps at the root rather than
/// escaping it; whether the clamped path exists is decided later by
/// [`resolve_safe`].
///
/// ```
/// use stash_storage::path::normalize;
/// assert_eq!(normalize("docs//notes/../readme.md").unwrap(), "/docs/readme.md");
/// assert_eq!(normalize("/../../etc").unwrap(), "/etc");
/// assert_eq!(normalize("\\win\\style").unwrap(), "/win/style");
/// assert!(normalize("   ").is_err());
/// ```
pub fn normalize(input: &str) -> Result<String> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        exn::bail!(ErrorKind::InvalidPath(input.to_string()));
    }
    // NUL passes through string handling fine but truncates C-based
    // syscalls later. Reject it before it ever reaches a host path.
    if trimmed.contains('\0') {
        exn::bail!(ErrorKind::InvalidPath(trimmed.replace('\0', "\\0")));
    }
    let slashed = trimmed.replace('\\', "/");
    let mut segments: Vec<&str> = Vec::new();
    for segment in slashed.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    Ok(format!("/{}", segments.join("/")))
}

/// Whether a normalized path is the reserved trash subtree or inside it.
pub fn is_trash_path(normalized: &str) -> bool {
    let reserved = format!("/{TRASH_SEGMENT}");
    normalized == reserved || normalized.starts_with(&format!("{reserved}/"))
}

/// The leaf name of a normalized virtual path (empty for the root).
pub fn leaf_name(normalized: &str) -> &str {
    normalized.rsplit('/').next().unwrap_or("")
}

/// Validate a single path segment for use as a new leaf name.
///
/// Rejects empty names, separators, `.`/`..`, and NUL.
pub fn sanitize_leaf(name: &str) -> Result<String> {
    let trimmed = name.trim();
    if trimmed.is_empty()
        || trimmed == "."
        || trimmed == ".."
        || trimmed.contains('/')
        || trimmed.contains('\\')
        || trimmed.contains('\0')
    {
        exn::bail!(ErrorKind::InvalidPath(name.replace('\0', "\\0")));
    }
    Ok(trimmed.to_string())
}

/// Resolve a virtual path that must already exist on the host.
///
/// The returned host path is the realpath of the joined location, so a
/// symlink planted inside the root cannot smuggle the caller outside it:
/// after resolution the result must still be the root itself or a
/// descendant. Containment is checked component-wise, which is what rules
/// out the `/data/foobar`-passes-for-`/data/foo` prefix confusion.
pub async fn resolve_safe(virtual_path: &str, root_real: &Path) -> Result<Resolved> {
    let normalized = normalize(virtual_path)?;
    if is_trash_path(&normalized) {
        exn::bail!(ErrorKind::InvalidPath(normalized));
    }
    let joined = join_host(root_real, &normalized);
    let host_path = match tokio::fs::canonicalize(&joined).await {
        Ok(real) => real,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            exn::bail!(ErrorKind::NotFound(normalized));
        }
        Err(e) => exn::bail!(ErrorKind::Io(e)),
    };
    if host_path != root_real && !host_path.starts_with(root_real) {
        tracing::warn!(path = %normalized, "request resolved outside the scoped root");
        exn::bail!(ErrorKind::Escape(normalized));
    }
    Ok(Resolved {
        normalized,
        host_path,
    })
}

/// Resolve a virtual path whose leaf may not exist yet.
///
/// The parent must [`resolve_safe`]; the leaf is sanitized and joined onto
/// the parent's realpath. The root and the `.trash` subtree are never valid
/// destinations.
pub async fn resolve_destination(virtual_path: &str, root_real: &Path) -> Result<Resolved> {
    let normalized = normalize(virtual_path)?;
    if normalized == "/" || is_trash_path(&normalized) {
        exn::bail!(ErrorKind::InvalidPath(normalized));
    }
    // A normalized non-root path always contains at least the leading slash.
    let (parent, leaf) = normalized
        .rsplit_once('/')
        .expect("normalized path starts with a slash");
    let leaf = sanitize_leaf(leaf)?;
    let parent_virtual = if parent.is_empty() { "/" } else { parent };
    let parent = resolve_safe(parent_virtual, root_real).await?;
    Ok(Resolved {
        normalized,
        host_path: parent.host_path.join(leaf),
    })
}

fn join_host(root_real: &Path, normalized: &str) -> PathBuf {
    let relative = normalized.trim_start_matches('/');
    if relative.is_empty() {
        root_real.to_path_buf()
    } else {
        root_real.join(relative)
    }
}
