//! Persistence backend and upstream fetcher traits.
//!
//! Both traits are object safe so that the backend can be chosen from
//! configuration at startup and injected into the orchestrator as
//! `Arc<dyn ...>`.

use async_trait::async_trait;
use profcache_core::{CacheEntry, CacheKey, DownloadArtifact, FetchError, Payload, StorageResult};

/// Durable key to entry storage.
///
/// # Contract
///
/// - `get` reports a missing key as `Ok(None)`, never as an error.
/// - `put` replaces any existing entry for the key in full, and a reader
///   never observes a partially written entry.
/// - Bytes that fail to deserialize surface as
///   [`StorageError::CorruptEntry`](profcache_core::StorageError::CorruptEntry);
///   the orchestrator treats those as absent.
/// - A payload field named `timestamp` is never stored, since the document
///   form reserves that name for `fetched_at`. Every backend drops it on
///   `put`, so `get` returns the same payload whichever backend is used.
#[async_trait]
pub trait PersistenceBackend: Send + Sync {
    /// Short backend name for logs and health output.
    fn name(&self) -> &'static str;

    /// Point lookup.
    async fn get(&self, key: &CacheKey) -> StorageResult<Option<CacheEntry>>;

    /// Upsert by key.
    async fn put(&self, entry: &CacheEntry) -> StorageResult<()>;

    /// Byte-exact serialized form of the stored entry, for file download.
    async fn artifact(&self, key: &CacheKey) -> StorageResult<Option<DownloadArtifact>>;

    /// Verify the backend is reachable and writable.
    async fn health_check(&self) -> StorageResult<()>;
}

/// Performs the expensive upstream retrieval for a key.
#[async_trait]
pub trait UpstreamFetcher: Send + Sync {
    async fn fetch(&self, key: &CacheKey) -> Result<Payload, FetchError>;
}
