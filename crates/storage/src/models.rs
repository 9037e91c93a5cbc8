//! Storage models.
//!
//! These types are the storage-neutral shapes shared by every adapter:
//! directory members, listing pages, and pagination options.

use serde::{Deserialize, Serialize};

/// Whether a directory member is itself a directory or a plain file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Dir,
    File,
}

/// A single directory member.
///
/// `name` is always a bare leaf: no separators, no NUL, never `.` or `..`.
/// `mtime` is epoch milliseconds; directories report a size of zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: EntryKind,
    pub size: u64,
    pub mtime: i64,
}

impl Entry {
    pub fn dir(name: impl Into<String>, mtime: i64) -> Self {
        Self {
            name: name.into(),
            kind: EntryKind::Dir,
            size: 0,
            mtime,
        }
    }

    pub fn file(name: impl Into<String>, size: u64, mtime: i64) -> Self {
        Self {
            name: name.into(),
            kind: EntryKind::File,
            size,
            mtime,
        }
    }

    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Dir
    }
}

/// Pagination window for a listing.
#[derive(Debug, Clone, Copy, Default)]
pub struct ListOptions {
    /// Maximum entries to return; `None` returns everything.
    pub limit: Option<usize>,
    /// Entries to skip after sorting.
    pub offset: usize,
}

/// One page of a listing plus the unpaginated count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Listing {
    pub entries: Vec<Entry>,
    pub total: usize,
}

/// Sort directories before files, each group in case-insensitive name order.
pub(crate) fn sort_entries(entries: &mut [Entry]) {
    entries.sort_by(|a, b| {
        (a.kind != EntryKind::Dir, a.name.to_lowercase())
            .cmp(&(b.kind != EntryKind::Dir, b.name.to_lowercase()))
    });
}

/// Apply the pagination window, preserving the pre-window total.
pub(crate) fn paginate(mut entries: Vec<Entry>, options: ListOptions) -> Listing {
    let total = entries.len();
    if options.offset > 0 {
        entries.drain(..options.offset.min(total));
    }
    if let Some(limit) = options.limit {
        entries.truncate(limit);
    }
    Listing { entries, total }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture() -> Vec<Entry> {
        vec![
            Entry::file("zeta.txt", 1, 0),
            Entry::dir("Photos", 0),
            Entry::file("Alpha.txt", 1, 0),
            Entry::dir("docs", 0),
            Entry::file("beta.txt", 1, 0),
        ]
    }

    #[test]
    fn dirs_sort_before_files_case_insensitively() {
        let mut entries = fixture();
        sort_entries(&mut entries);
        let names: Vec<_> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["docs", "Photos", "Alpha.txt", "beta.txt", "zeta.txt"]);
    }

    #[test]
    fn pagination_preserves_total() {
        let mut entries = fixture();
        sort_entries(&mut entries);
        let page = paginate(
            entries,
            ListOptions {
                limit: Some(2),
                offset: 1,
            },
        );
        assert_eq!(page.total, 5);
        let names: Vec<_> = page.entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["Photos", "Alpha.txt"]);
    }

    #[test]
    fn offset_past_the_end_yields_an_empty_page() {
        let page = paginate(
            fixture(),
            ListOptions {
                limit: None,
                offset: 99,
            },
        );
        assert_eq!(page.total, 5);
        assert!(page.entries.is_empty());
    }

    #[test]
    fn entry_kind_serializes_as_type() {
        let json = serde_json::to_value(Entry::dir("docs", 42)).unwrap();
        assert_eq!(json["type"], "dir");
        assert_eq!(json["size"], 0);
        assert_eq!(json["mtime"], 42);
    }
}
