//! S3-compatible storage adapter.
//!
//! Presents the same virtual-path surface as the local adapter over an
//! object store. S3 has no directories, so the adapter simulates them:
//! listings use `Delimiter="/"` and surface `CommonPrefixes` as
//! directories, `mkdir` drops a zero-byte `<key>/` placeholder so empty
//! prefixes stay discoverable, and `stat` falls back to a one-key prefix
//! probe when no object answers a HEAD.
//!
//! Known approximation: simulated directories report "now" as their
//! mtime, because CommonPrefixes carry no timestamp.
//!
//! # Credentials
//!
//! Credentials always come explicitly from a stored profile; the SDK's
//! ambient credential chain is never consulted, since one process serves
//! many unrelated endpoints at once.

use crate::error::{ErrorKind, Result};
use crate::models::{self, Entry, ListOptions, Listing};
use crate::path;
use crate::StorageAdapter;
use async_trait::async_trait;
use aws_sdk_s3::{
    Client,
    config::{BehaviorVersion, Credentials, Region, retry::RetryConfig},
    error::{ProvideErrorMetadata, SdkError},
    operation::{copy_object::CopyObjectError, get_object::GetObjectError, head_object::HeadObjectError},
    primitives::{ByteStream, DateTime},
    types::{Delete, ObjectIdentifier},
};
use exn::ResultExt;
use time::OffsetDateTime;

/// S3-compatible storage adapter for one bucket, optionally under a key
/// prefix. Paths are case-sensitive exactly as object keys are.
#[derive(Debug, Clone)]
pub struct S3Adapter {
    client: Client,
    bucket: String,
    prefix: Option<String>,
}

impl S3Adapter {
    /// Build an adapter from an S3 profile's connection details.
    ///
    /// Path-style addressing and the SDK's standard exponential back-off
    /// are always on, for compatibility with MinIO, Backblaze, and other
    /// S3-compatible services behind custom endpoints.
    pub fn new(
        bucket: impl Into<String>,
        prefix: Option<String>,
        region: impl Into<String>,
        endpoint: Option<String>,
        key_id: impl Into<String>,
        key_secret: impl Into<String>,
    ) -> Self {
        let credentials = Credentials::new(key_id, key_secret, None, None, "stash-profile");
        let mut builder = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .credentials_provider(credentials)
            .region(Region::new(region.into()))
            .retry_config(RetryConfig::standard().with_max_attempts(4))
            .force_path_style(true);
        if let Some(endpoint_url) = endpoint {
            builder = builder.endpoint_url(endpoint_url);
        }
        Self::from_client(Client::from_conf(builder.build()), bucket, prefix)
    }

    /// Wrap an existing client; used by tests with mocked rule sets.
    pub fn from_client(client: Client, bucket: impl Into<String>, prefix: Option<String>) -> Self {
        let prefix = prefix
            .map(|p| p.trim_matches('/').to_string())
            .filter(|p| !p.is_empty());
        Self {
            client,
            bucket: bucket.into(),
            prefix,
        }
    }

    /// Probe the connection with a single-key listing.
    pub async fn test_connection(&self) -> Result<()> {
        let prefix = Self::dir_prefix_of(&self.key_for("/"));
        self.client
            .list_objects_v2()
            .bucket(&self.bucket)
            .prefix(prefix)
            .max_keys(1)
            .send()
            .await
            .map_err(|e| map_generic_error(&e))?;
        Ok(())
    }

    /// A virtual URL pointing back at the service's own download surface.
    ///
    /// Reads are always mediated by the service; no pre-signed URLs.
    pub fn public_url(&self, virtual_path: &str) -> Result<String> {
        let normalized = path::normalize(virtual_path)?;
        Ok(format!("/api/s3/download?path={}", urlencoding::encode(&normalized)))
    }

    /// Construct the full object key for a virtual path.
    fn key_for(&self, normalized: &str) -> String {
        let clean = normalized.trim_matches('/');
        match (&self.prefix, clean.is_empty()) {
            (Some(prefix), true) => prefix.clone(),
            (Some(prefix), false) => format!("{prefix}/{clean}"),
            (None, _) => clean.to_string(),
        }
    }

    /// The listing prefix for a simulated directory key.
    fn dir_prefix_of(key: &str) -> String {
        if key.is_empty() {
            String::new()
        } else {
            format!("{key}/")
        }
    }

    /// Key for an operation that must not target the scoped root.
    fn non_root_key(&self, virtual_path: &str) -> Result<(String, String)> {
        let normalized = path::normalize(virtual_path)?;
        if normalized == "/" {
            exn::bail!(ErrorKind::InvalidPath(normalized));
        }
        let key = self.key_for(&normalized);
        Ok((normalized, key))
    }

    /// Whether any object lives under `<key>/`.
    async fn prefix_has_contents(&self, key: &str) -> Result<bool> {
        let resp = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .prefix(Self::dir_prefix_of(key))
            .max_keys(1)
            .send()
            .await
            .map_err(|e| map_generic_error(&e))?;
        Ok(!resp.contents().is_empty())
    }

    fn now_ms() -> i64 {
        (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64
    }

    fn datetime_ms(dt: &DateTime) -> i64 {
        (dt.as_nanos() / 1_000_000) as i64
    }
}

#[async_trait]
impl StorageAdapter for S3Adapter {
    async fn list(&self, virtual_path: &str, options: ListOptions) -> Result<Listing> {
        let normalized = path::normalize(virtual_path)?;
        let prefix = Self::dir_prefix_of(&self.key_for(&normalized));
        let resp = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .prefix(&prefix)
            .delimiter("/")
            .max_keys(options.limit.unwrap_or(1000) as i32)
            .send()
            .await
            .map_err(|e| map_generic_error(&e))?;

        let now = Self::now_ms();
        let mut entries = Vec::new();
        for common in resp.common_prefixes() {
            let Some(p) = common.prefix() else { continue };
            // CommonPrefixes have no timestamp; "now" is the best we get.
            let name = p.strip_prefix(&prefix).unwrap_or(p).trim_end_matches('/');
            if !name.is_empty() {
                entries.push(Entry::dir(name, now));
            }
        }
        for object in resp.contents() {
            let Some(key) = object.key() else { continue };
            // The placeholder object for the listed prefix is not a member.
            if key == prefix || key.ends_with('/') {
                continue;
            }
            let name = key.strip_prefix(&prefix).unwrap_or(key);
            if name.contains('/') {
                continue;
            }
            let mtime = object.last_modified().map(Self::datetime_ms).unwrap_or(now);
            let size = object.size().unwrap_or(0).max(0) as u64;
            entries.push(Entry::file(name, size, mtime));
        }
        models::sort_entries(&mut entries);
        // MaxKeys already bounded the page; only the offset applies here.
        let total = entries.len();
        if options.offset > 0 {
            entries.drain(..options.offset.min(total));
        }
        Ok(Listing { entries, total })
    }

    async fn stat(&self, virtual_path: &str) -> Result<Option<Entry>> {
        let normalized = path::normalize(virtual_path)?;
        if normalized == "/" {
            return Ok(Some(Entry::dir("", Self::now_ms())));
        }
        let key = self.key_for(&normalized);
        let leaf = path::leaf_name(&normalized).to_string();
        match self.client.head_object().bucket(&self.bucket).key(&key).send().await {
            Ok(head) => {
                let size = head.content_length().unwrap_or(0).max(0) as u64;
                let mtime = head
                    .last_modified()
                    .map(|dt| Self::datetime_ms(dt))
                    .unwrap_or_else(Self::now_ms);
                Ok(Some(Entry::file(leaf, size, mtime)))
            }
            Err(SdkError::ServiceError(e)) if matches!(e.err(), HeadObjectError::NotFound(_)) => {
                // No object with that exact key; a populated prefix still
                // counts as a simulated directory.
                if self.prefix_has_contents(&key).await? {
                    Ok(Some(Entry::dir(leaf, Self::now_ms())))
                } else {
                    Ok(None)
                }
            }
            Err(e) => Err(map_head_error(e, &normalized).into()),
        }
    }

    async fn read(&self, virtual_path: &str) -> Result<Vec<u8>> {
        let (normalized, key) = self.non_root_key(virtual_path)?;
        let resp = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await
            .map_err(|e| map_get_error(e, &normalized))?;
        let bytes = resp
            .body
            .collect()
            .await
            .or_raise(|| ErrorKind::Network("failed to read response body".to_string()))?
            .into_bytes();
        Ok(bytes.to_vec())
    }

    async fn write(&self, virtual_path: &str, data: &[u8]) -> Result<()> {
        let (_, key) = self.non_root_key(virtual_path)?;
        let body = ByteStream::from(data.to_vec());
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .body(body)
            .send()
            .await
            .map_err(|e| map_generic_error(&e))?;
        Ok(())
    }

    /// Recursive and idempotent: children of the simulated directory go
    /// first (in batches, paginated), then the named object itself.
    /// Objects that no longer exist are no-ops.
    async fn delete(&self, virtual_path: &str) -> Result<()> {
        let (_, key) = self.non_root_key(virtual_path)?;
        let prefix = Self::dir_prefix_of(&key);
        let mut continuation: Option<String> = None;
        loop {
            let mut request = self.client.list_objects_v2().bucket(&self.bucket).prefix(&prefix);
            if let Some(token) = continuation.take() {
                request = request.continuation_token(token);
            }
            let resp = request.send().await.map_err(|e| map_generic_error(&e))?;
            let mut ids = Vec::new();
            for object in resp.contents() {
                let Some(k) = object.key() else { continue };
                let id = ObjectIdentifier::builder()
                    .key(k)
                    .build()
                    .map_err(|e| ErrorKind::Backend(e.to_string()))?;
                ids.push(id);
            }
            if !ids.is_empty() {
                let delete = Delete::builder()
                    .set_objects(Some(ids))
                    .build()
                    .map_err(|e| ErrorKind::Backend(e.to_string()))?;
                self.client
                    .delete_objects()
                    .bucket(&self.bucket)
                    .delete(delete)
                    .send()
                    .await
                    .map_err(|e| map_generic_error(&e))?;
            }
            if resp.is_truncated().unwrap_or(false) {
                continuation = resp.next_continuation_token().map(str::to_string);
            } else {
                break;
            }
        }
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await
            .map_err(|e| map_generic_error(&e))?;
        Ok(())
    }

    async fn rename(&self, from: &str, to: &str) -> Result<()> {
        // S3 has no rename; copy, then delete the source. A failed delete
        // would leave a duplicate, so it propagates instead of warning.
        self.copy(from, to).await?;
        self.delete(from).await
    }

    async fn copy(&self, from: &str, to: &str) -> Result<()> {
        let (from_normalized, from_key) = self.non_root_key(from)?;
        let (_, to_key) = self.non_root_key(to)?;
        if self.prefix_has_contents(&from_key).await? {
            // Copying a populated simulated directory would only move the
            // placeholder object and silently strand its children.
            exn::bail!(ErrorKind::Unsupported(format!(
                "folder copy is not supported on S3: {from_normalized}"
            )));
        }
        let copy_source = format!("{}/{}", self.bucket, from_key);
        self.client
            .copy_object()
            .bucket(&self.bucket)
            .copy_source(&copy_source)
            .key(&to_key)
            .send()
            .await
            .map_err(|e| map_copy_error(e, &from_normalized))?;
        Ok(())
    }

    async fn mkdir(&self, virtual_path: &str) -> Result<()> {
        let (_, key) = self.non_root_key(virtual_path)?;
        // Zero-byte placeholder so the prefix lists even while empty.
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(format!("{key}/"))
            .body(ByteStream::from_static(b""))
            .send()
            .await
            .map_err(|e| map_generic_error(&e))?;
        Ok(())
    }

    async fn exists(&self, virtual_path: &str) -> Result<bool> {
        Ok(self.stat(virtual_path).await?.is_some())
    }
}

fn map_head_error(e: SdkError<HeadObjectError>, path: &str) -> ErrorKind {
    match &e {
        SdkError::ServiceError(s) if matches!(s.err(), HeadObjectError::NotFound(_)) => {
            ErrorKind::NotFound(path.to_string())
        }
        SdkError::TimeoutError(_) | SdkError::DispatchFailure(_) => ErrorKind::Network(e.to_string()),
        _ => ErrorKind::Backend(e.to_string()),
    }
}

fn map_get_error(e: SdkError<GetObjectError>, path: &str) -> ErrorKind {
    match &e {
        SdkError::ServiceError(s) if matches!(s.err(), GetObjectError::NoSuchKey(_)) => {
            ErrorKind::NotFound(path.to_string())
        }
        SdkError::TimeoutError(_) | SdkError::DispatchFailure(_) => ErrorKind::Network(e.to_string()),
        _ => ErrorKind::Backend(e.to_string()),
    }
}

fn map_copy_error(e: SdkError<CopyObjectError>, path: &str) -> ErrorKind {
    match &e {
        // `NoSuchKey` on copy isn't formally declared in the S3 API spec,
        // so the SDK doesn't model it; match on the raw error code.
        SdkError::ServiceError(s) if matches!(s.err().code(), Some("NoSuchKey")) => {
            ErrorKind::NotFound(path.to_string())
        }
        SdkError::TimeoutError(_) | SdkError::DispatchFailure(_) => ErrorKind::Network(e.to_string()),
        _ => ErrorKind::Backend(e.to_string()),
    }
}

fn map_generic_error<E>(e: &SdkError<E>) -> ErrorKind
where
    SdkError<E>: std::fmt::Display,
{
    match e {
        SdkError::TimeoutError(_) | SdkError::DispatchFailure(_) => ErrorKind::Network(e.to_string()),
        _ => ErrorKind::Backend(e.to_string()),
    }
}
