//! Media object storage.
//!
//! Objects live in named buckets under keys of the form
//! `{prefix}-{sanitizedTitle}-{timestamp}`.

use async_trait::async_trait;
use chrono::Utc;
use std::path::{Path, PathBuf};

use crate::errors::AppError;

/// Upload ceiling per object (50 MB).
pub const MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bucket {
    Songs,
    Images,
    Videos,
    Spotlight,
}

impl Bucket {
    pub fn as_str(&self) -> &'static str {
        match self {
            Bucket::Songs => "songs",
            Bucket::Images => "images",
            Bucket::Videos => "videos",
            Bucket::Spotlight => "spotlight",
        }
    }
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put(&self, bucket: Bucket, key: &str, bytes: &[u8]) -> Result<(), AppError>;

    async fn delete(&self, bucket: Bucket, key: &str) -> Result<(), AppError>;

    async fn exists(&self, bucket: Bucket, key: &str) -> Result<bool, AppError>;
}

/// Keeps ASCII alphanumerics only.
pub fn sanitize_title(title: &str) -> String {
    title.chars().filter(|c| c.is_ascii_alphanumeric()).collect()
}

pub fn object_key(prefix: &str, title: &str, timestamp_ms: i64) -> String {
    format!("{}-{}-{}", prefix, sanitize_title(title), timestamp_ms)
}

pub fn validate_upload(label: &str, bytes: &[u8]) -> Result<(), AppError> {
    if bytes.is_empty() {
        return Err(AppError::Validation(format!("{} file is empty", label)));
    }
    if bytes.len() > MAX_UPLOAD_BYTES {
        return Err(AppError::Validation(format!(
            "{} file exceeds the {} MB limit",
            label,
            MAX_UPLOAD_BYTES / (1024 * 1024)
        )));
    }
    Ok(())
}

/// Validates and stores one object, returning its key.
pub async fn upload(
    store: &dyn ObjectStore,
    bucket: Bucket,
    prefix: &str,
    title: &str,
    bytes: &[u8],
) -> Result<String, AppError> {
    validate_upload(prefix, bytes)?;
    let key = object_key(prefix, title, Utc::now().timestamp_millis());
    store.put(bucket, &key, bytes).await?;
    log::debug!("Stored {} bytes at {}/{}", bytes.len(), bucket.as_str(), key);
    Ok(key)
}

/// Best-effort removal used when cleaning up after a failed write.
pub async fn remove_quietly(store: &dyn ObjectStore, bucket: Bucket, key: &str) {
    if let Err(e) = store.delete(bucket, key).await {
        log::warn!("Failed to remove {}/{}: {}", bucket.as_str(), key, e);
    }
}

/// Object store rooted at a local directory, one subdirectory per bucket.
pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, bucket: Bucket, key: &str) -> Result<PathBuf, AppError> {
        if key.is_empty() || key.contains(['/', '\\']) || key.starts_with('.') {
            return Err(AppError::Validation(format!("Invalid object key '{}'", key)));
        }
        Ok(self.root.join(bucket.as_str()).join(key))
    }
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    async fn put(&self, bucket: Bucket, key: &str, bytes: &[u8]) -> Result<(), AppError> {
        let path = self.path_for(bucket, key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, bytes).await?;
        Ok(())
    }

    async fn delete(&self, bucket: Bucket, key: &str) -> Result<(), AppError> {
        let path = self.path_for(bucket, key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn exists(&self, bucket: Bucket, key: &str) -> Result<bool, AppError> {
        let path = self.path_for(bucket, key)?;
        Ok(tokio::fs::try_exists(&path).await?)
    }
}
