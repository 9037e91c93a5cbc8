//! Environment-backed runtime settings.
//!
//! One flat struct extracted with figment's `Env` provider. Only the
//! variables named here are consulted; everything optional carries the
//! same default the rest of the workspace documents.

use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use figment::Figment;
use figment::providers::Env;
use serde::Deserialize;
use std::path::PathBuf;

/// Environment variables the service reads.
const ENV_KEYS: &[&str] = &[
    "FILE_ROOT",
    "SESSION_SECRET",
    "ADMIN_PASSWORD",
    "USERS_FILE",
    "USERS_JSON",
    "ARCHIVE_LARGE_MB",
    "SEARCH_MAX_BYTES",
    "AUDIT_LOG_PATH",
    "MAX_S3_CONNECTIONS",
    "SETTINGS_PATH",
];

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Host directory every user root must resolve inside.
    pub file_root: PathBuf,
    /// HMAC key for session tokens; shared across replicas.
    pub session_secret: String,
    #[serde(default)]
    pub admin_password: Option<String>,
    #[serde(default)]
    pub users_file: Option<PathBuf>,
    #[serde(default)]
    pub users_json: Option<String>,
    /// Zip archives probing at or past this many MiB switch to store mode.
    #[serde(default = "default_archive_large_mb")]
    pub archive_large_mb: u64,
    /// Per-file cap for content search scans.
    #[serde(default = "default_search_max_bytes")]
    pub search_max_bytes: u64,
    #[serde(default = "default_audit_log_path")]
    pub audit_log_path: PathBuf,
    /// Cap on distinct live S3 configurations across the process.
    #[serde(default = "default_max_s3_connections")]
    pub max_s3_connections: usize,
    /// Location of the S3 profile document.
    #[serde(default = "default_settings_path")]
    pub settings_path: PathBuf,
}

fn default_archive_large_mb() -> u64 {
    100
}

fn default_search_max_bytes() -> u64 {
    200 * 1024
}

fn default_audit_log_path() -> PathBuf {
    PathBuf::from("audit.log")
}

fn default_max_s3_connections() -> usize {
    5
}

fn default_settings_path() -> PathBuf {
    PathBuf::from("data/settings.json")
}

impl Settings {
    /// Extract settings from the process environment.
    pub fn from_env() -> Result<Self> {
        Figment::new()
            .merge(Env::raw().only(ENV_KEYS))
            .extract()
            .or_raise(|| ErrorKind::Environment)
    }

    /// The archive store-mode threshold in bytes.
    pub fn archive_large_bytes(&self) -> u64 {
        self.archive_large_mb * 1024 * 1024
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_everything_optional() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("FILE_ROOT", "/srv/files");
            jail.set_env("SESSION_SECRET", "s3cret");
            let settings = Settings::from_env().expect("settings extract");
            assert_eq!(settings.file_root, PathBuf::from("/srv/files"));
            assert_eq!(settings.archive_large_mb, 100);
            assert_eq!(settings.archive_large_bytes(), 100 * 1024 * 1024);
            assert_eq!(settings.search_max_bytes, 200 * 1024);
            assert_eq!(settings.max_s3_connections, 5);
            assert_eq!(settings.settings_path, PathBuf::from("data/settings.json"));
            assert_eq!(settings.audit_log_path, PathBuf::from("audit.log"));
            assert!(settings.admin_password.is_none());
            Ok(())
        });
    }

    #[test]
    fn overrides_are_honored() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("FILE_ROOT", "/data");
            jail.set_env("SESSION_SECRET", "s");
            jail.set_env("ARCHIVE_LARGE_MB", "1");
            jail.set_env("MAX_S3_CONNECTIONS", "2");
            jail.set_env("SEARCH_MAX_BYTES", "1024");
            let settings = Settings::from_env().expect("settings extract");
            assert_eq!(settings.archive_large_bytes(), 1024 * 1024);
            assert_eq!(settings.max_s3_connections, 2);
            assert_eq!(settings.search_max_bytes, 1024);
            Ok(())
        });
    }

    #[test]
    fn missing_required_variables_fail() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("SESSION_SECRET", "s");
            assert!(Settings::from_env().is_err());
            Ok(())
        });
    }
}
