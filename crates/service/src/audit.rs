//! Append-only audit trail.
//!
//! One JSON object per line: `{ts, ip, action, ...}` plus whatever fields
//! the action cares about. A single writer lock serializes appends; each
//! event is flushed before the lock drops so a crash loses at most the
//! event being written.

use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use serde::Serialize;
use serde_json::Value;
use std::fs::OpenOptions;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::sync::Mutex;
use time::OffsetDateTime;

/// One audit event.
#[derive(Debug, Clone, Serialize)]
pub struct AuditEvent {
    /// Event time, epoch milliseconds.
    pub ts: i64,
    /// Remote address as reported by the dispatch layer.
    pub ip: String,
    pub action: String,
    #[serde(flatten)]
    fields: serde_json::Map<String, Value>,
}

impl AuditEvent {
    pub fn new(action: impl Into<String>, ip: impl Into<String>) -> Self {
        Self {
            ts: (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64,
            ip: ip.into(),
            action: action.into(),
            fields: serde_json::Map::new(),
        }
    }

    /// Attach an action-specific field.
    pub fn field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }
}

/// Append-only JSON-line sink.
pub struct AuditSink {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl AuditSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn append(&self, event: &AuditEvent) -> Result<()> {
        // unwrap is safe: no panics while the lock is held
        let _guard = self.write_lock.lock().unwrap();
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .or_raise(|| ErrorKind::Audit("creating log directory".to_string()))?;
            }
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .or_raise(|| ErrorKind::Audit(self.path.display().to_string()))?;
        let mut writer = BufWriter::new(file);
        let line = serde_json::to_string(event)
            .or_raise(|| ErrorKind::Audit("serializing event".to_string()))?;
        writeln!(writer, "{line}").or_raise(|| ErrorKind::Audit("appending event".to_string()))?;
        writer
            .flush()
            .or_raise(|| ErrorKind::Audit("flushing event".to_string()))?;
        Ok(())
    }
}
