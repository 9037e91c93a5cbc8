//! Trash sidecar metadata and restore bookkeeping.
//!
//! The local adapter soft-deletes by renaming entries into
//! `<root>/.trash/` and writing one JSON sidecar per item under
//! `<root>/.trash/.meta/<id>.json`. This module is the read side of those
//! sidecars: listing, restoring, and the startup reconciliation pass that
//! drops sidecars whose physical item has gone missing.
//!
//! Sidecars that fail to parse or lack their identifying fields are
//! tolerated and skipped when listing; they are never created by us.

use crate::error::{ErrorKind, Result};
use crate::models::EntryKind;
use crate::path;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use time::OffsetDateTime;
use tokio::fs;
use uuid::Uuid;

/// Metadata recorded for every trashed entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrashRecord {
    pub id: Uuid,
    /// Leaf name the entry had before deletion.
    pub name: String,
    /// Virtual path the entry was removed from.
    pub original_path: String,
    /// Deletion time, epoch milliseconds.
    pub deleted_at: i64,
    #[serde(rename = "type")]
    pub kind: EntryKind,
    pub size: u64,
    /// Physical filename inside `.trash/`.
    pub trash_name: String,
}

impl TrashRecord {
    pub(crate) fn new(name: String, original_path: String, kind: EntryKind, size: u64) -> Self {
        let id = Uuid::new_v4();
        let deleted_at = (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64;
        let trash_name = format!("{deleted_at}-{name}-{id}");
        Self {
            id,
            name,
            original_path,
            deleted_at,
            kind,
            size,
            trash_name,
        }
    }

    pub(crate) fn sidecar_name(&self) -> String {
        format!("{}.json", self.id)
    }
}

pub(crate) fn trash_dir(root_real: &Path) -> PathBuf {
    root_real.join(path::TRASH_SEGMENT)
}

pub(crate) fn meta_dir(root_real: &Path) -> PathBuf {
    trash_dir(root_real).join(".meta")
}

/// Read-side view of the local adapter's trash sidecars.
#[derive(Debug, Clone)]
pub struct TrashStore {
    root_real: PathBuf,
}

impl TrashStore {
    /// A store over the same realpath root as the owning local adapter.
    pub fn new(root_real: impl Into<PathBuf>) -> Self {
        Self {
            root_real: root_real.into(),
        }
    }

    /// All valid trash records, newest deletion first.
    pub async fn list(&self) -> Result<Vec<TrashRecord>> {
        let meta_dir = meta_dir(&self.root_real);
        let mut dir = match fs::read_dir(&meta_dir).await {
            Ok(dir) => dir,
            // Nothing has ever been trashed under this root.
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(ErrorKind::Io(e).into()),
        };
        let mut records = Vec::new();
        while let Some(child) = dir.next_entry().await.map_err(ErrorKind::Io)? {
            let file_name = child.file_name();
            let file_name = file_name.to_string_lossy();
            if !file_name.ends_with(".json") {
                continue;
            }
            let bytes = match fs::read(child.path()).await {
                Ok(bytes) => bytes,
                Err(e) => {
                    tracing::trace!(sidecar = %file_name, error = %e, "skipping unreadable sidecar");
                    continue;
                }
            };
            match serde_json::from_slice::<TrashRecord>(&bytes) {
                Ok(record)
                    if !record.trash_name.is_empty() && !record.original_path.is_empty() =>
                {
                    records.push(record);
                }
                Ok(_) => {
                    tracing::trace!(sidecar = %file_name, "skipping sidecar with empty fields");
                }
                Err(e) => {
                    tracing::trace!(sidecar = %file_name, error = %e, "skipping malformed sidecar");
                }
            }
        }
        records.sort_by_key(|r| std::cmp::Reverse(r.deleted_at));
        Ok(records)
    }

    /// Restore a trashed entry to its original virtual path.
    ///
    /// The original parent must still exist and the destination leaf must
    /// be free. On success the physical item is renamed back and the
    /// sidecar removed. Returns the restored virtual path.
    pub async fn restore(&self, id: Uuid) -> Result<String> {
        let record = self.record(id).await?;
        let dest = match path::resolve_destination(&record.original_path, &self.root_real).await {
            Ok(dest) => dest,
            Err(e) if matches!(&*e, ErrorKind::NotFound(_)) => {
                exn::bail!(ErrorKind::ParentMissing(record.original_path.clone()));
            }
            Err(e) => return Err(e),
        };
        if fs::try_exists(&dest.host_path).await.map_err(ErrorKind::Io)? {
            exn::bail!(ErrorKind::Conflict(dest.normalized));
        }
        let item = trash_dir(&self.root_real).join(&record.trash_name);
        if !fs::try_exists(&item).await.map_err(ErrorKind::Io)? {
            // Sidecar without its item: discard it and report the mismatch.
            let _ = fs::remove_file(self.sidecar_path(&record)).await;
            exn::bail!(ErrorKind::Sidecar(format!(
                "trash item missing for record {id}"
            )));
        }
        fs::rename(&item, &dest.host_path).await.map_err(ErrorKind::Io)?;
        fs::remove_file(self.sidecar_path(&record)).await.map_err(ErrorKind::Io)?;
        tracing::debug!(id = %id, path = %dest.normalized, "restored entry from trash");
        Ok(dest.normalized)
    }

    /// Permanently remove a trashed item and its sidecar.
    ///
    /// This is the only physical recursive removal in the crate: restore
    /// undoes a soft delete, purge makes it final. An item that has
    /// already vanished still gets its sidecar dropped.
    pub async fn purge(&self, id: Uuid) -> Result<()> {
        let record = self.record(id).await?;
        let item = trash_dir(&self.root_real).join(&record.trash_name);
        match fs::symlink_metadata(&item).await {
            Ok(meta) if meta.is_dir() => {
                fs::remove_dir_all(&item).await.map_err(ErrorKind::Io)?;
            }
            Ok(_) => {
                fs::remove_file(&item).await.map_err(ErrorKind::Io)?;
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => exn::bail!(ErrorKind::Io(e)),
        }
        fs::remove_file(self.sidecar_path(&record)).await.map_err(ErrorKind::Io)?;
        tracing::debug!(id = %id, trash_name = %record.trash_name, "purged trash item");
        Ok(())
    }

    /// Startup pass: delete sidecars whose physical item is missing.
    ///
    /// Orphan physical items without a sidecar are left alone; they remain
    /// discoverable only by filesystem inspection. Returns how many
    /// sidecars were dropped.
    pub async fn reconcile(&self) -> Result<usize> {
        let trash_dir = trash_dir(&self.root_real);
        let mut dropped = 0;
        for record in self.list().await? {
            let item = trash_dir.join(&record.trash_name);
            if !fs::try_exists(&item).await.map_err(ErrorKind::Io)? {
                tracing::warn!(id = %record.id, trash_name = %record.trash_name, "dropping dangling trash sidecar");
                fs::remove_file(self.sidecar_path(&record)).await.map_err(ErrorKind::Io)?;
                dropped += 1;
            }
        }
        Ok(dropped)
    }

    async fn record(&self, id: Uuid) -> Result<TrashRecord> {
        let sidecar = meta_dir(&self.root_real).join(format!("{id}.json"));
        let bytes = match fs::read(&sidecar).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                exn::bail!(ErrorKind::NotFound(id.to_string()));
            }
            Err(e) => exn::bail!(ErrorKind::Io(e)),
        };
        serde_json::from_slice(&bytes)
            .map_err(|e| ErrorKind::Sidecar(format!("sidecar {id}: {e}")).into())
    }

    fn sidecar_path(&self, record: &TrashRecord) -> PathBuf {
        meta_dir(&self.root_real).join(record.sidecar_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::LocalAdapter;
    use crate::{ListOptions, StorageAdapter};

    async fn fixture() -> (tempfile::TempDir, LocalAdapter, TrashStore) {
        let tmp = tempfile::tempdir().unwrap();
        let adapter = LocalAdapter::new(tmp.path()).await.unwrap();
        let store = TrashStore::new(adapter.root_real());
        (tmp, adapter, store)
    }

    #[tokio::test]
    async fn list_is_empty_without_a_trash_directory() {
        let (_tmp, _adapter, store) = fixture().await;
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn trash_then_restore_round_trips() {
        let (_tmp, adapter, store) = fixture().await;
        adapter.write("/notes.txt", b"hello").await.unwrap();
        adapter.delete("/notes.txt").await.unwrap();

        let records = store.list().await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "notes.txt");
        assert_eq!(records[0].original_path, "/notes.txt");

        let restored = store.restore(records[0].id).await.unwrap();
        assert_eq!(restored, "/notes.txt");
        assert_eq!(adapter.read("/notes.txt").await.unwrap(), b"hello");
        assert!(store.list().await.unwrap().is_empty());
        // The physical trash directory holds nothing but the meta dir.
        let listing = adapter.list("/", ListOptions::default()).await.unwrap();
        let names: Vec<_> = listing.entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["notes.txt"]);
    }

    #[tokio::test]
    async fn restore_conflicts_when_the_destination_is_occupied() {
        let (_tmp, adapter, store) = fixture().await;
        adapter.write("/notes.txt", b"old").await.unwrap();
        adapter.delete("/notes.txt").await.unwrap();
        adapter.write("/notes.txt", b"new").await.unwrap();

        let records = store.list().await.unwrap();
        let err = store.restore(records[0].id).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Conflict(_)));
        assert_eq!(adapter.read("/notes.txt").await.unwrap(), b"new");
    }

    #[tokio::test]
    async fn restore_requires_the_original_parent() {
        let (_tmp, adapter, store) = fixture().await;
        adapter.write("/dir/file.txt", b"x").await.unwrap();
        adapter.delete("/dir/file.txt").await.unwrap();
        adapter.delete("/dir").await.unwrap();

        let records = store.list().await.unwrap();
        let file_record = records.iter().find(|r| r.name == "file.txt").unwrap();
        let err = store.restore(file_record.id).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::ParentMissing(_)));
    }

    #[tokio::test]
    async fn listing_sorts_newest_first_and_skips_garbage() {
        let (_tmp, adapter, store) = fixture().await;
        adapter.write("/first.txt", b"1").await.unwrap();
        adapter.delete("/first.txt").await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        adapter.write("/second.txt", b"2").await.unwrap();
        adapter.delete("/second.txt").await.unwrap();
        // A malformed sidecar must not break listing.
        std::fs::write(meta_dir(adapter.root_real()).join("junk.json"), b"{nope").unwrap();

        let records = store.list().await.unwrap();
        assert_eq!(records.len(), 2);
        assert!(records[0].deleted_at >= records[1].deleted_at);
        assert_eq!(records[0].name, "second.txt");
    }

    #[tokio::test]
    async fn purge_removes_the_item_and_its_sidecar_for_good() {
        let (_tmp, adapter, store) = fixture().await;
        adapter.write("/dir/nested.txt", b"x").await.unwrap();
        adapter.delete("/dir").await.unwrap();
        adapter.write("/solo.txt", b"y").await.unwrap();
        adapter.delete("/solo.txt").await.unwrap();

        let records = store.list().await.unwrap();
        assert_eq!(records.len(), 2);
        for record in &records {
            store.purge(record.id).await.unwrap();
            assert!(!trash_dir(adapter.root_real()).join(&record.trash_name).exists());
            assert!(!store.sidecar_path(record).exists());
        }
        assert!(store.list().await.unwrap().is_empty());

        // Purged records are unknown afterwards.
        let err = store.purge(records[0].id).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound(_)));
    }

    #[tokio::test]
    async fn purge_of_a_missing_item_still_drops_the_sidecar() {
        let (_tmp, adapter, store) = fixture().await;
        adapter.write("/a.txt", b"a").await.unwrap();
        adapter.delete("/a.txt").await.unwrap();
        let records = store.list().await.unwrap();
        std::fs::remove_file(trash_dir(adapter.root_real()).join(&records[0].trash_name)).unwrap();

        store.purge(records[0].id).await.unwrap();
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn reconcile_drops_dangling_sidecars() {
        let (_tmp, adapter, store) = fixture().await;
        adapter.write("/a.txt", b"a").await.unwrap();
        adapter.write("/b.txt", b"b").await.unwrap();
        adapter.delete("/a.txt").await.unwrap();
        adapter.delete("/b.txt").await.unwrap();

        // Simulate a crash that lost one physical item.
        let records = store.list().await.unwrap();
        let victim = &records[0];
        std::fs::remove_file(trash_dir(adapter.root_real()).join(&victim.trash_name)).unwrap();

        assert_eq!(store.reconcile().await.unwrap(), 1);
        assert_eq!(store.list().await.unwrap().len(), 1);
    }
}
