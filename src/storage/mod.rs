//! Blob storage for persisted images.
//!
//! # Responsibilities
//! - Abstract the external object store behind [`BlobStore`]
//! - Provide an in-memory store (tests, embedding) and a filesystem store
//!
//! # Design Decisions
//! - Keys are validated before touching storage; no path traversal
//! - Bodies are `Bytes` so the upstream buffer is shared, not copied

use std::path::{Component, Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("invalid object key: {0}")]
    InvalidKey(String),
    #[error("invalid bucket name: {0}")]
    InvalidBucket(String),
    #[error("storage io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Write-only view of an object store.
#[async_trait]
pub trait BlobStore: Send + Sync + std::fmt::Debug {
    async fn put(&self, bucket: &str, key: &str, body: Bytes, content_type: &str) -> Result<(), StorageError>;
}

/// One object recorded by [`MemoryBlobStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub bucket: String,
    pub key: String,
    pub body: Bytes,
    pub content_type: String,
}

/// Keeps every put in memory, in order.
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    objects: Mutex<Vec<StoredObject>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every put so far.
    pub fn puts(&self) -> Vec<StoredObject> {
        self.objects.lock().map(|o| o.clone()).unwrap_or_default()
    }

    /// Latest object stored under `bucket`/`key`.
    pub fn get(&self, bucket: &str, key: &str) -> Option<StoredObject> {
        self.puts()
            .into_iter()
            .rev()
            .find(|o| o.bucket == bucket && o.key == key)
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(&self, bucket: &str, key: &str, body: Bytes, content_type: &str) -> Result<(), StorageError> {
        validate_key(key)?;
        let object = StoredObject {
            bucket: bucket.to_string(),
            key: key.to_string(),
            body,
            content_type: content_type.to_string(),
        };
        if let Ok(mut objects) = self.objects.lock() {
            objects.push(object);
        }
        Ok(())
    }
}

/// Stores objects as files under `<root>/<bucket>/<key>`.
///
/// The content type is written next to the object as `<key>.content-type`.
#[derive(Debug, Clone)]
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn object_path(&self, bucket: &str, key: &str) -> Result<PathBuf, StorageError> {
        if bucket.is_empty() || bucket.contains(['/', '\\']) || bucket == ".." || bucket == "." {
            return Err(StorageError::InvalidBucket(bucket.to_string()));
        }
        let key_path = validate_key(key)?;
        Ok(self.root.join(bucket).join(key_path))
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn put(&self, bucket: &str, key: &str, body: Bytes, content_type: &str) -> Result<(), StorageError> {
        let path = self.object_path(bucket, key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, &body).await?;

        let mut meta = path.clone().into_os_string();
        meta.push(".content-type");
        tokio::fs::write(PathBuf::from(meta), content_type.as_bytes()).await?;

        tracing::debug!(path = %path.display(), bytes = body.len(), "Object written");
        Ok(())
    }
}

/// Keys are relative paths made only of normal components.
fn validate_key(key: &str) -> Result<&Path, StorageError> {
    let path = Path::new(key);
    let valid = !key.is_empty() && path.components().all(|c| matches!(c, Component::Normal(_)));
    if valid {
        Ok(path)
    } else {
        Err(StorageError::InvalidKey(key.to_string()))
    }
}
