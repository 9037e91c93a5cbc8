//! Local filesystem storage adapter.
//!
//! Serves a user's scoped subtree of the host filesystem. Every host
//! operation goes through [`path::resolve_safe`] or
//! [`path::resolve_destination`] against the adapter's symlink-resolved
//! root, so nothing this adapter does can touch a path outside it.
//!
//! Symbolic links are never traversed: listings skip them, recursive
//! copies skip them, and resolution refuses any link whose realpath lands
//! outside the root. Logical `delete` is a move into the `.trash` subtree
//! plus a metadata sidecar; see [`crate::trash`] for the read side.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;
use tokio::fs;

use crate::error::{ErrorKind, Result};
use crate::models::{self, Entry, ListOptions, Listing};
use crate::path::{self, Resolved, TRASH_SEGMENT};
use crate::trash::{self, TrashRecord};
use crate::{EntryKind, StorageAdapter};

/// Local filesystem storage adapter scoped to one realpath root.
#[derive(Debug, Clone)]
pub struct LocalAdapter {
    root_real: PathBuf,
}

impl LocalAdapter {
    /// Create an adapter over an existing directory.
    ///
    /// The root is canonicalized here once; all containment checks compare
    /// against this realpath.
    pub async fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root_real = fs::canonicalize(root.as_ref()).await.map_err(ErrorKind::Io)?;
        let meta = fs::metadata(&root_real).await.map_err(ErrorKind::Io)?;
        if !meta.is_dir() {
            exn::bail!(ErrorKind::InvalidPath(root_real.display().to_string()));
        }
        Ok(Self { root_real })
    }

    pub fn root_real(&self) -> &Path {
        &self.root_real
    }

    /// Resolve a virtual path that must already exist under this root.
    pub async fn resolve_existing(&self, virtual_path: &str) -> Result<Resolved> {
        path::resolve_safe(virtual_path, &self.root_real).await
    }

    async fn resolve_dest(&self, virtual_path: &str) -> Result<Resolved> {
        path::resolve_destination(virtual_path, &self.root_real).await
    }

    /// Accumulate the recursive byte size of the given virtual paths,
    /// stopping early once `limit` is reached. Symlinks contribute nothing.
    ///
    /// Archive assembly uses this to decide between compressing and
    /// storing without walking unbounded trees for exact totals.
    pub async fn probe_size(&self, paths: &[String], limit: u64) -> Result<u64> {
        let mut total = 0u64;
        for virtual_path in paths {
            let resolved = self.resolve_existing(virtual_path).await?;
            total = Self::sum_tree(&resolved.host_path, total, limit).await?;
            if total >= limit {
                return Ok(total);
            }
        }
        Ok(total)
    }

    async fn sum_tree(host: &Path, mut total: u64, limit: u64) -> Result<u64> {
        let meta = fs::symlink_metadata(host).await.map_err(ErrorKind::Io)?;
        if meta.file_type().is_symlink() {
            return Ok(total);
        }
        if meta.is_file() {
            return Ok(total.saturating_add(meta.len()));
        }
        let mut dir = fs::read_dir(host).await.map_err(ErrorKind::Io)?;
        while let Some(child) = dir.next_entry().await.map_err(ErrorKind::Io)? {
            total = Box::pin(Self::sum_tree(&child.path(), total, limit)).await?;
            if total >= limit {
                return Ok(total);
            }
        }
        Ok(total)
    }

    /// Move an entry into the trash and record its sidecar.
    ///
    /// The physical rename happens first so that every sidecar on disk
    /// refers to an item that exists; a sidecar that cannot be written
    /// rolls the rename back.
    pub async fn move_to_trash(&self, virtual_path: &str) -> Result<TrashRecord> {
        let resolved = self.resolve_existing(virtual_path).await?;
        if resolved.normalized == "/" {
            exn::bail!(ErrorKind::InvalidPath(resolved.normalized));
        }
        let meta = fs::metadata(&resolved.host_path).await.map_err(ErrorKind::Io)?;
        let kind = if meta.is_dir() { EntryKind::Dir } else { EntryKind::File };
        let size = if meta.is_dir() { 0 } else { meta.len() };
        let name = path::leaf_name(&resolved.normalized).to_string();
        let record = TrashRecord::new(name, resolved.normalized.clone(), kind, size);

        let meta_dir = trash::meta_dir(&self.root_real);
        fs::create_dir_all(&meta_dir).await.map_err(ErrorKind::Io)?;
        let item = trash::trash_dir(&self.root_real).join(&record.trash_name);
        fs::rename(&resolved.host_path, &item).await.map_err(ErrorKind::Io)?;

        let sidecar = meta_dir.join(record.sidecar_name());
        let json = serde_json::to_vec_pretty(&record)
            .map_err(|e| ErrorKind::Sidecar(e.to_string()))?;
        if let Err(e) = fs::write(&sidecar, json).await {
            // Undo the rename rather than leave an orphan trash item.
            if let Err(undo) = fs::rename(&item, &resolved.host_path).await {
                tracing::warn!(
                    path = %resolved.normalized,
                    error = %undo,
                    "failed to roll back trash rename after sidecar write error",
                );
            }
            exn::bail!(ErrorKind::Io(e));
        }
        tracing::debug!(path = %resolved.normalized, id = %record.id, "moved entry to trash");
        Ok(record)
    }

    fn guard_destination(&self, source: &Path, dest: &Path, to: &str) -> Result<()> {
        if dest == source || dest.starts_with(source) {
            exn::bail!(ErrorKind::IntoItself(to.to_string()));
        }
        Ok(())
    }

    async fn ensure_absent(dest: &Path, to: &str) -> Result<()> {
        if fs::try_exists(dest).await.map_err(ErrorKind::Io)? {
            exn::bail!(ErrorKind::Conflict(to.to_string()));
        }
        Ok(())
    }

    /// Recursive copy that silently skips symlinks anywhere in the tree.
    async fn copy_tree(source: &Path, dest: &Path) -> Result<()> {
        let meta = fs::symlink_metadata(source).await.map_err(ErrorKind::Io)?;
        if meta.file_type().is_symlink() {
            return Ok(());
        }
        if meta.is_dir() {
            fs::create_dir(dest).await.map_err(ErrorKind::Io)?;
            let mut dir = fs::read_dir(source).await.map_err(ErrorKind::Io)?;
            while let Some(child) = dir.next_entry().await.map_err(ErrorKind::Io)? {
                let file_type = child.file_type().await.map_err(ErrorKind::Io)?;
                if file_type.is_symlink() {
                    continue;
                }
                Box::pin(Self::copy_tree(&child.path(), &dest.join(child.file_name()))).await?;
            }
        } else {
            fs::copy(source, dest).await.map_err(ErrorKind::Io)?;
        }
        Ok(())
    }

    fn mtime_ms(meta: &std::fs::Metadata) -> i64 {
        meta.modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_millis() as i64)
            .unwrap_or(0)
    }

    fn entry_from(name: String, meta: &std::fs::Metadata) -> Entry {
        if meta.is_dir() {
            Entry::dir(name, Self::mtime_ms(meta))
        } else {
            Entry::file(name, meta.len(), Self::mtime_ms(meta))
        }
    }
}

#[async_trait]
impl StorageAdapter for LocalAdapter {
    async fn list(&self, virtual_path: &str, options: ListOptions) -> Result<Listing> {
        let resolved = self.resolve_existing(virtual_path).await?;
        let meta = fs::metadata(&resolved.host_path).await.map_err(ErrorKind::Io)?;
        if !meta.is_dir() {
            exn::bail!(ErrorKind::InvalidPath(resolved.normalized));
        }
        let mut entries = Vec::new();
        let mut dir = fs::read_dir(&resolved.host_path).await.map_err(ErrorKind::Io)?;
        while let Some(child) = dir.next_entry().await.map_err(ErrorKind::Io)? {
            let file_type = child.file_type().await.map_err(ErrorKind::Io)?;
            if file_type.is_symlink() {
                continue;
            }
            let name = child.file_name().to_string_lossy().into_owned();
            if resolved.normalized == "/" && name == TRASH_SEGMENT {
                continue;
            }
            match child.metadata().await {
                Ok(child_meta) => entries.push(Self::entry_from(name, &child_meta)),
                // The entry vanished between readdir and stat; drop it.
                Err(e) => tracing::trace!(name, error = %e, "skipping unstattable entry"),
            }
        }
        models::sort_entries(&mut entries);
        Ok(models::paginate(entries, options))
    }

    async fn stat(&self, virtual_path: &str) -> Result<Option<Entry>> {
        let resolved = match self.resolve_existing(virtual_path).await {
            Ok(resolved) => resolved,
            Err(e) if matches!(&*e, ErrorKind::NotFound(_)) => return Ok(None),
            Err(e) => return Err(e),
        };
        match fs::metadata(&resolved.host_path).await {
            Ok(meta) => Ok(Some(Self::entry_from(
                path::leaf_name(&resolved.normalized).to_string(),
                &meta,
            ))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(ErrorKind::Io(e).into()),
        }
    }

    async fn read(&self, virtual_path: &str) -> Result<Vec<u8>> {
        let resolved = self.resolve_existing(virtual_path).await?;
        fs::read(&resolved.host_path).await.map_err(|e| ErrorKind::Io(e).into())
    }

    async fn write(&self, virtual_path: &str, data: &[u8]) -> Result<()> {
        let normalized = path::normalize(virtual_path)?;
        if let Some((parent, _leaf)) = normalized.rsplit_once('/') {
            if !parent.is_empty() {
                // Create missing ancestors one sanitized segment at a time;
                // mkdir is idempotent and resolver-guarded.
                let segments: Vec<&str> = parent.trim_start_matches('/').split('/').collect();
                let mut ancestor = String::new();
                for segment in segments {
                    ancestor.push('/');
                    ancestor.push_str(segment);
                    self.mkdir(&ancestor).await?;
                }
            }
        }
        let resolved = self.resolve_dest(&normalized).await?;
        fs::write(&resolved.host_path, data).await.map_err(ErrorKind::Io)?;
        Ok(())
    }

    async fn delete(&self, virtual_path: &str) -> Result<()> {
        self.move_to_trash(virtual_path).await?;
        Ok(())
    }

    async fn rename(&self, from: &str, to: &str) -> Result<()> {
        let source = self.resolve_existing(from).await?;
        let dest = self.resolve_dest(to).await?;
        Self::ensure_absent(&dest.host_path, &dest.normalized).await?;
        self.guard_destination(&source.host_path, &dest.host_path, &dest.normalized)?;
        fs::rename(&source.host_path, &dest.host_path).await.map_err(ErrorKind::Io)?;
        Ok(())
    }

    async fn copy(&self, from: &str, to: &str) -> Result<()> {
        let source = self.resolve_existing(from).await?;
        let dest = self.resolve_dest(to).await?;
        Self::ensure_absent(&dest.host_path, &dest.normalized).await?;
        self.guard_destination(&source.host_path, &dest.host_path, &dest.normalized)?;
        Self::copy_tree(&source.host_path, &dest.host_path).await
    }

    async fn mkdir(&self, virtual_path: &str) -> Result<()> {
        let resolved = self.resolve_dest(virtual_path).await?;
        match fs::metadata(&resolved.host_path).await {
            Ok(meta) if meta.is_dir() => Ok(()),
            Ok(_) => exn::bail!(ErrorKind::Conflict(resolved.normalized)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                fs::create_dir(&resolved.host_path).await.map_err(ErrorKind::Io)?;
                Ok(())
            }
            Err(e) => Err(ErrorKind::Io(e).into()),
        }
    }

    async fn exists(&self, virtual_path: &str) -> Result<bool> {
        match self.resolve_existing(virtual_path).await {
            Ok(_) => Ok(true),
            Err(e) if matches!(&*e, ErrorKind::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }
}
