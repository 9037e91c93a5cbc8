//! Persisted S3 configuration profiles.
//!
//! All profiles live in one pretty-printed JSON document
//! (`{"s3Configs": [...]}`) so operators can edit it by hand. Every
//! mutation holds an exclusive async lock across the whole
//! read-modify-write cycle (concurrent admin edits must not lose each
//! other) and lands via write-then-rename so a crash never leaves a
//! half-written document.
//!
//! The stored `secretAccessKey` is plaintext; the list surface returns
//! [`ProfileSummary`], which simply has no field for it. Only get-by-id
//! hands the full profile back, for the admin editing flow.

use crate::error::{ErrorKind, Result};
use exn::{OptionExt, ResultExt};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::fs;
use tokio::sync::Mutex;
use uuid::Uuid;

/// One named S3-compatible endpoint configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct S3ConfigProfile {
    pub id: Uuid,
    pub name: String,
    pub region: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    pub access_key_id: String,
    pub secret_access_key: String,
    pub bucket: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_default: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,
}

/// Redacted view of a profile for list surfaces: everything but the
/// secret key.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileSummary {
    pub id: Uuid,
    pub name: String,
    pub region: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    pub access_key_id: String,
    pub bucket: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_default: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,
}

impl From<&S3ConfigProfile> for ProfileSummary {
    fn from(profile: &S3ConfigProfile) -> Self {
        Self {
            id: profile.id,
            name: profile.name.clone(),
            region: profile.region.clone(),
            endpoint: profile.endpoint.clone(),
            access_key_id: profile.access_key_id.clone(),
            bucket: profile.bucket.clone(),
            prefix: profile.prefix.clone(),
            is_default: profile.is_default,
            active: profile.active,
        }
    }
}

/// Incoming profile fields for create/update; the store mints the id.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileDraft {
    pub name: String,
    pub region: String,
    #[serde(default)]
    pub endpoint: Option<String>,
    pub access_key_id: String,
    pub secret_access_key: String,
    pub bucket: String,
    #[serde(default)]
    pub prefix: Option<String>,
    #[serde(default)]
    pub is_default: Option<bool>,
    #[serde(default)]
    pub active: Option<bool>,
}

impl ProfileDraft {
    fn into_profile(self, id: Uuid) -> S3ConfigProfile {
        S3ConfigProfile {
            id,
            name: self.name,
            region: self.region,
            endpoint: self.endpoint,
            access_key_id: self.access_key_id,
            secret_access_key: self.secret_access_key,
            bucket: self.bucket,
            prefix: self.prefix,
            is_default: self.is_default,
            active: self.active,
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct SettingsDocument {
    #[serde(default, rename = "s3Configs")]
    s3_configs: Vec<S3ConfigProfile>,
}

/// File-backed CRUD over the profile document.
pub struct S3ConfigStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl S3ConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// All profiles, secrets redacted.
    pub async fn list(&self) -> Result<Vec<ProfileSummary>> {
        let document = self.load().await?;
        Ok(document.s3_configs.iter().map(ProfileSummary::from).collect())
    }

    /// One full profile, secret included, for the admin editing flow.
    pub async fn get(&self, id: Uuid) -> Result<Option<S3ConfigProfile>> {
        let document = self.load().await?;
        Ok(document.s3_configs.into_iter().find(|p| p.id == id))
    }

    /// Mint an id and persist a new profile.
    pub async fn create(&self, draft: ProfileDraft) -> Result<S3ConfigProfile> {
        let _guard = self.write_lock.lock().await;
        let mut document = self.load().await?;
        let profile = draft.into_profile(Uuid::new_v4());
        document.s3_configs.push(profile.clone());
        self.persist(&document).await?;
        tracing::info!(id = %profile.id, name = %profile.name, "created S3 profile");
        Ok(profile)
    }

    /// Replace the fields of an existing profile, keeping its id.
    pub async fn update(&self, id: Uuid, draft: ProfileDraft) -> Result<S3ConfigProfile> {
        let _guard = self.write_lock.lock().await;
        let mut document = self.load().await?;
        let slot = document
            .s3_configs
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_raise(|| ErrorKind::UnknownProfile(id))?;
        *slot = draft.into_profile(id);
        let updated = slot.clone();
        self.persist(&document).await?;
        Ok(updated)
    }

    /// Remove a profile. The caller is responsible for dropping any live
    /// connection bindings for the id afterwards.
    pub async fn delete(&self, id: Uuid) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut document = self.load().await?;
        let before = document.s3_configs.len();
        document.s3_configs.retain(|p| p.id != id);
        if document.s3_configs.len() == before {
            exn::bail!(ErrorKind::UnknownProfile(id));
        }
        self.persist(&document).await?;
        tracing::info!(id = %id, "deleted S3 profile");
        Ok(())
    }

    async fn load(&self) -> Result<SettingsDocument> {
        let bytes = match fs::read(&self.path).await {
            Ok(bytes) => bytes,
            // First run: no document yet.
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(SettingsDocument::default());
            }
            Err(e) => exn::bail!(ErrorKind::Store(e.to_string())),
        };
        serde_json::from_slice(&bytes).map_err(|e| ErrorKind::Store(e.to_string()).into())
    }

    async fn persist(&self, document: &SettingsDocument) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .await
                .or_raise(|| ErrorKind::Store("creating settings directory".to_string()))?;
        }
        let json = serde_json::to_vec_pretty(document)
            .or_raise(|| ErrorKind::Store("serializing settings".to_string()))?;
        // Write-then-rename: readers never observe a torn document.
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json)
            .await
            .or_raise(|| ErrorKind::Store("writing settings".to_string()))?;
        fs::rename(&tmp, &self.path)
            .await
            .or_raise(|| ErrorKind::Store("replacing settings".to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft(name: &str) -> ProfileDraft {
        ProfileDraft {
            name: name.to_string(),
            region: "us-east-1".to_string(),
            endpoint: Some("http://localhost:9000".to_string()),
            access_key_id: "AKIA".to_string(),
            secret_access_key: "shh".to_string(),
            bucket: "bucket".to_string(),
            prefix: None,
            is_default: None,
            active: Some(true),
        }
    }

    fn store(tmp: &tempfile::TempDir) -> S3ConfigStore {
        S3ConfigStore::new(tmp.path().join("data/settings.json"))
    }

    #[tokio::test]
    async fn an_absent_document_lists_empty() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(store(&tmp).list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn crud_round_trips_through_the_document() {
        let tmp = tempfile::tempdir().unwrap();
        let store = store(&tmp);
        let created = store.create(draft("minio")).await.unwrap();
        assert_eq!(created.name, "minio");

        let fetched = store.get(created.id).await.unwrap().unwrap();
        assert_eq!(fetched.secret_access_key, "shh");

        let mut change = draft("minio-renamed");
        change.secret_access_key = "rotated".to_string();
        let updated = store.update(created.id, change).await.unwrap();
        assert_eq!(updated.id, created.id);
        assert_eq!(updated.name, "minio-renamed");

        store.delete(created.id).await.unwrap();
        assert!(store.get(created.id).await.unwrap().is_none());
        let missing = store.delete(created.id).await.unwrap_err();
        assert!(matches!(&*missing, ErrorKind::UnknownProfile(_)));
    }

    #[tokio::test]
    async fn listing_never_carries_the_secret() {
        let tmp = tempfile::tempdir().unwrap();
        let store = store(&tmp);
        store.create(draft("minio")).await.unwrap();
        let listed = serde_json::to_string(&store.list().await.unwrap()).unwrap();
        assert!(!listed.contains("secretAccessKey"));
        assert!(!listed.contains("shh"));
        assert!(listed.contains("accessKeyId"));
    }

    #[tokio::test]
    async fn the_document_is_operator_readable() {
        let tmp = tempfile::tempdir().unwrap();
        let store = store(&tmp);
        store.create(draft("minio")).await.unwrap();
        let raw = std::fs::read_to_string(tmp.path().join("data/settings.json")).unwrap();
        // Pretty-printed with the expected top-level key.
        assert!(raw.contains("\"s3Configs\""));
        assert!(raw.contains('\n'));
    }
}
