//! Recursive name and content search.
//!
//! A plain linear scan over the adapter's namespace: directories are
//! walked breadth-first via `list`, names match case-insensitively, and
//! file contents are byte-scanned up to a per-file cap. Anything with a
//! NUL byte in the scanned window is treated as binary and skipped.
//! There is no index; cost is O(files x size) per request.

use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use serde::Serialize;
use stash_storage::{Entry, ListOptions, StorageAdapter};
use std::collections::VecDeque;

/// One search result.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchHit {
    /// Full virtual path of the matching entry.
    pub path: String,
    #[serde(flatten)]
    pub entry: Entry,
    /// True when the match came from file contents rather than the name.
    pub content_match: bool,
}

/// Search `base` and everything under it for `query`.
pub async fn search(
    adapter: &dyn StorageAdapter,
    base: &str,
    query: &str,
    max_file_bytes: u64,
) -> Result<Vec<SearchHit>> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        exn::bail!(ErrorKind::InvalidRequest("empty search query".to_string()));
    }
    let mut hits = Vec::new();
    let mut queue = VecDeque::from([normalize_base(base)]);
    while let Some(dir) = queue.pop_front() {
        let listing = adapter
            .list(&dir, ListOptions::default())
            .await
            .or_raise(|| ErrorKind::InvalidRequest(format!("unsearchable path: {dir}")))?;
        for entry in listing.entries {
            let path = join_virtual(&dir, &entry.name);
            if entry.is_dir() {
                queue.push_back(path.clone());
            }
            if entry.name.to_lowercase().contains(&needle) {
                hits.push(SearchHit {
                    path,
                    entry,
                    content_match: false,
                });
                continue;
            }
            if entry.is_dir() || entry.size > max_file_bytes {
                continue;
            }
            match adapter.read(&path).await {
                Ok(bytes) => {
                    // NUL in the window means binary; skip it.
                    if memchr::memchr(0, &bytes).is_some() {
                        continue;
                    }
                    let haystack = String::from_utf8_lossy(&bytes).to_lowercase();
                    if haystack.contains(&needle) {
                        hits.push(SearchHit {
                            path,
                            entry,
                            content_match: true,
                        });
                    }
                }
                // Files may vanish mid-walk; the listing is not a snapshot.
                Err(e) => {
                    tracing::trace!(path = %path, error = %e, "skipping unreadable file during search");
                }
            }
        }
    }
    Ok(hits)
}

fn normalize_base(base: &str) -> String {
    let trimmed = base.trim();
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        trimmed.to_string()
    }
}

fn join_virtual(dir: &str, name: &str) -> String {
    if dir.ends_with('/') {
        format!("{dir}{name}")
    } else {
        format!("{dir}/{name}")
    }
}
