//! Flat-file persistence backend.
//!
//! One JSON document per key at `<dir>/<key>.json`. Each `put` writes the
//! whole document to a uniquely named temporary file in the same directory,
//! syncs it and renames it over the target, so readers see either the old or
//! the new document and never a truncated one.
//!
//! # Concurrency
//!
//! Concurrent writers of the same key are not ordered against each other:
//! the last rename wins. There is no lock.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use profcache_core::{
    CacheEntry, CacheKey, DownloadArtifact, StorageError, StorageResult, DOCUMENT_EXTENSION,
};
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use super::traits::PersistenceBackend;

/// Flat-file store rooted at a directory.
#[derive(Debug, Clone)]
pub struct FileBackend {
    dir: PathBuf,
}

impl FileBackend {
    /// Create a backend rooted at `dir`. The directory is created on first
    /// write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the document for `key`.
    pub fn entry_path(&self, key: &CacheKey) -> PathBuf {
        self.dir.join(key.file_name(DOCUMENT_EXTENSION))
    }

    // Leading dot keeps temp names disjoint from key files.
    fn temp_path(&self, key: &CacheKey) -> PathBuf {
        self.dir.join(format!(".{}.{}.tmp", key, Uuid::now_v7()))
    }

    async fn read_bytes(&self, key: &CacheKey) -> StorageResult<Option<Vec<u8>>> {
        let path = self.entry_path(key);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageError::unavailable(format!(
                "failed to read {}: {}",
                path.display(),
                e
            ))),
        }
    }

    async fn write_atomic(&self, key: &CacheKey, bytes: &[u8]) -> std::io::Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let tmp = self.temp_path(key);
        let result = async {
            let mut file = tokio::fs::File::create(&tmp).await?;
            file.write_all(bytes).await?;
            file.sync_all().await?;
            drop(file);
            tokio::fs::rename(&tmp, self.entry_path(key)).await
        }
        .await;

        if result.is_err() {
            let _ = tokio::fs::remove_file(&tmp).await;
        }
        result
    }
}

#[async_trait]
impl PersistenceBackend for FileBackend {
    fn name(&self) -> &'static str {
        "file"
    }

    async fn get(&self, key: &CacheKey) -> StorageResult<Option<CacheEntry>> {
        match self.read_bytes(key).await? {
            Some(bytes) => CacheEntry::from_document_bytes(key, &bytes).map(Some),
            None => Ok(None),
        }
    }

    async fn put(&self, entry: &CacheEntry) -> StorageResult<()> {
        let bytes = entry.to_document_bytes()?;
        self.write_atomic(&entry.key, &bytes).await.map_err(|e| {
            StorageError::unavailable(format!(
                "failed to write {}: {}",
                self.entry_path(&entry.key).display(),
                e
            ))
        })?;

        tracing::trace!(key = %entry.key, bytes = bytes.len(), "wrote cache file");
        Ok(())
    }

    async fn artifact(&self, key: &CacheKey) -> StorageResult<Option<DownloadArtifact>> {
        Ok(self
            .read_bytes(key)
            .await?
            .map(|bytes| DownloadArtifact::json(key, bytes)))
    }

    async fn health_check(&self) -> StorageResult<()> {
        tokio::fs::create_dir_all(&self.dir).await.map_err(|e| {
            StorageError::unavailable(format!("cannot create {}: {}", self.dir.display(), e))
        })?;

        let metadata = tokio::fs::metadata(&self.dir).await.map_err(|e| {
            StorageError::unavailable(format!("cannot stat {}: {}", self.dir.display(), e))
        })?;

        if metadata.permissions().readonly() {
            return Err(StorageError::unavailable(format!(
                "{} is read-only",
                self.dir.display()
            )));
        }
        Ok(())
    }
}
