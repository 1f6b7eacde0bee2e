//! Directory-backed object store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};

use crate::error::{StorageError, StorageResult};
use crate::fs::{move_file, partial_path};

/// Output namespaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Bucket {
    Variants,
    Thumbnails,
}

impl Bucket {
    pub const ALL: [Bucket; 2] = [Bucket::Variants, Bucket::Thumbnails];

    pub fn as_str(&self) -> &'static str {
        match self {
            Bucket::Variants => "variants",
            Bucket::Thumbnails => "thumbnails",
        }
    }
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One stored file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredObject {
    pub name: String,
    pub size: u64,
    pub modified: DateTime<Utc>,
}

/// Flat, named file storage split into buckets.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Write `bytes` under `name`, replacing any existing object.
    async fn write_file(&self, bucket: Bucket, name: &str, bytes: &[u8]) -> StorageResult<()>;

    /// Move a local file into the store under `name`.
    async fn put_file(&self, bucket: Bucket, name: &str, src: &Path) -> StorageResult<()>;

    /// Delete `name`. Returns `false` when it did not exist.
    async fn delete_file(&self, bucket: Bucket, name: &str) -> StorageResult<bool>;

    async fn exists(&self, bucket: Bucket, name: &str) -> StorageResult<bool>;

    /// Every object currently in `bucket`.
    async fn list(&self, bucket: Bucket) -> StorageResult<Vec<StoredObject>>;
}

/// Reject anything that is not a single plain, visible path component.
///
/// Dot-prefixed names are reserved for in-progress writes.
pub fn validate_name(name: &str) -> StorageResult<()> {
    let bad = name.is_empty()
        || name.starts_with('.')
        || name.contains(['/', '\\', '\0']);
    if bad {
        return Err(StorageError::invalid_key(name));
    }
    Ok(())
}

/// [`ObjectStore`] over two local directories.
#[derive(Debug, Clone)]
pub struct LocalObjectStore {
    variants_dir: PathBuf,
    thumbnails_dir: PathBuf,
}

impl LocalObjectStore {
    pub fn new(variants_dir: impl Into<PathBuf>, thumbnails_dir: impl Into<PathBuf>) -> Self {
        Self {
            variants_dir: variants_dir.into(),
            thumbnails_dir: thumbnails_dir.into(),
        }
    }

    /// Create both directories if missing.
    pub async fn ensure_dirs(&self) -> StorageResult<()> {
        fs::create_dir_all(&self.variants_dir).await?;
        fs::create_dir_all(&self.thumbnails_dir).await?;
        Ok(())
    }

    pub fn dir(&self, bucket: Bucket) -> &Path {
        match bucket {
            Bucket::Variants => &self.variants_dir,
            Bucket::Thumbnails => &self.thumbnails_dir,
        }
    }

    /// Local path of `name` in `bucket`.
    pub fn path_for(&self, bucket: Bucket, name: &str) -> StorageResult<PathBuf> {
        validate_name(name)?;
        Ok(self.dir(bucket).join(name))
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn write_file(&self, bucket: Bucket, name: &str, bytes: &[u8]) -> StorageResult<()> {
        let path = self.path_for(bucket, name)?;
        fs::create_dir_all(self.dir(bucket)).await?;

        let partial = partial_path(&path);
        if let Err(e) = fs::write(&partial, bytes).await {
            let _ = fs::remove_file(&partial).await;
            return Err(StorageError::write_failed(name, e));
        }
        if let Err(e) = fs::rename(&partial, &path).await {
            let _ = fs::remove_file(&partial).await;
            return Err(StorageError::write_failed(name, e));
        }

        debug!(bucket = %bucket, name, bytes = bytes.len(), "Stored object");
        Ok(())
    }

    async fn put_file(&self, bucket: Bucket, name: &str, src: &Path) -> StorageResult<()> {
        let path = self.path_for(bucket, name)?;
        if !fs::try_exists(src).await? {
            return Err(StorageError::not_found(src.display().to_string()));
        }
        move_file(src, &path).await?;
        debug!(bucket = %bucket, name, "Moved object into store");
        Ok(())
    }

    async fn delete_file(&self, bucket: Bucket, name: &str) -> StorageResult<bool> {
        let path = self.path_for(bucket, name)?;
        match fs::remove_file(&path).await {
            Ok(()) => {
                debug!(bucket = %bucket, name, "Deleted object");
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StorageError::DeleteFailed {
                name: name.to_string(),
                source: e,
            }),
        }
    }

    async fn exists(&self, bucket: Bucket, name: &str) -> StorageResult<bool> {
        let path = self.path_for(bucket, name)?;
        Ok(fs::try_exists(&path).await?)
    }

    async fn list(&self, bucket: Bucket) -> StorageResult<Vec<StoredObject>> {
        let dir = self.dir(bucket);
        let mut entries = match fs::read_dir(dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut objects = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().to_string();
            if name.starts_with('.') {
                continue;
            }
            let meta = match entry.metadata().await {
                Ok(meta) if meta.is_file() => meta,
                Ok(_) => continue,
                Err(e) => {
                    warn!("Skipping unreadable entry {}: {}", entry.path().display(), e);
                    continue;
                }
            };
            let modified = meta.modified().map(DateTime::<Utc>::from).unwrap_or_else(|_| Utc::now());
            objects.push(StoredObject {
                name,
                size: meta.len(),
                modified,
            });
        }
        objects.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(objects)
    }
}
