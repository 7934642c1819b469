//! Fetch-through orchestrator.
//!
//! Per request: check the backend, serve a fresh entry as-is, otherwise
//! fetch upstream, write the result back and serve it.
//!
//! ```text
//! CHECK_CACHE --fresh--> SERVE_CACHED
//!      |
//!      +--absent / stale / corrupt / cache disabled--> FETCH_UPSTREAM
//!                                                         |--ok--> SERVE_FRESH
//!                                                         +--err-> FAIL
//! ```
//!
//! A failed refetch never falls back to a stale entry, and never writes to
//! the backend. A successful one re-reads the stored entry before writing so
//! `fetched_at` never moves backwards for a key.

use std::sync::Arc;
use std::time::Duration;

use chrono::{SubsecRound, Utc};
use profcache_core::{
    CacheEntry, CacheKey, DownloadArtifact, FreshnessPolicy, ProfcacheResult, Resolved,
    StorageError, DEFAULT_TTL,
};

use super::single_flight::SingleFlight;
use super::traits::{PersistenceBackend, UpstreamFetcher};

/// Configuration for the fetch-through orchestrator.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Entries younger than this are served without refetching.
    pub ttl: Duration,
    /// Allow at most one in-flight upstream fetch per key.
    pub single_flight: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: DEFAULT_TTL,
            single_flight: false,
        }
    }
}

impl CacheConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the entry TTL.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Enable or disable per-key single-flight.
    pub fn with_single_flight(mut self, enabled: bool) -> Self {
        self.single_flight = enabled;
        self
    }
}

/// Read-through cache over an injected backend and upstream fetcher.
///
/// Holds no per-request state; cloning is cheap and clones share the
/// backend, fetcher and single-flight table.
#[derive(Clone)]
pub struct FetchThrough {
    backend: Arc<dyn PersistenceBackend>,
    fetcher: Arc<dyn UpstreamFetcher>,
    policy: FreshnessPolicy,
    single_flight: Option<Arc<SingleFlight>>,
}

impl FetchThrough {
    pub fn new(
        backend: Arc<dyn PersistenceBackend>,
        fetcher: Arc<dyn UpstreamFetcher>,
        config: CacheConfig,
    ) -> Self {
        Self {
            backend,
            fetcher,
            policy: FreshnessPolicy::new(config.ttl),
            single_flight: config
                .single_flight
                .then(|| Arc::new(SingleFlight::new())),
        }
    }

    pub fn with_defaults(
        backend: Arc<dyn PersistenceBackend>,
        fetcher: Arc<dyn UpstreamFetcher>,
    ) -> Self {
        Self::new(backend, fetcher, CacheConfig::default())
    }

    pub fn backend(&self) -> &dyn PersistenceBackend {
        self.backend.as_ref()
    }

    pub fn policy(&self) -> &FreshnessPolicy {
        &self.policy
    }

    pub fn single_flight_enabled(&self) -> bool {
        self.single_flight.is_some()
    }

    /// Resolve `key` to an entry, fetching upstream when needed.
    ///
    /// With `use_cache` false a stored entry is never served and the fetcher
    /// is always invoked.
    pub async fn resolve(&self, key: &CacheKey, use_cache: bool) -> ProfcacheResult<Resolved> {
        let started = Utc::now().trunc_subsecs(6);

        if use_cache {
            match self.load(key).await? {
                Some(entry) if self.policy.is_fresh(&entry, Utc::now()) => {
                    tracing::debug!(
                        key = %key,
                        age_secs = FreshnessPolicy::age(&entry, Utc::now()).as_secs(),
                        "serving cached entry"
                    );
                    return Ok(Resolved::from_cache(entry));
                }
                Some(entry) => {
                    tracing::debug!(key = %key, fetched_at = %entry.fetched_at, "cached entry is stale");
                }
                None => {
                    tracing::debug!(key = %key, "no cached entry");
                }
            }
        } else {
            tracing::debug!(key = %key, "cache bypassed by caller");
        }

        let Some(flight) = &self.single_flight else {
            return self.fetch_and_store(key).await;
        };

        let _guard = flight.acquire(key).await;
        // Another request may have refreshed the key while we waited.
        if let Some(entry) = self.load(key).await?.filter(|e| e.fetched_at >= started) {
            tracing::debug!(key = %key, "joined in-flight fetch");
            return Ok(Resolved::joined(entry));
        }
        self.fetch_and_store(key).await
    }

    /// Download artifact of the stored entry. Never invokes the fetcher.
    pub async fn artifact(&self, key: &CacheKey) -> ProfcacheResult<Option<DownloadArtifact>> {
        Ok(self.backend.artifact(key).await?)
    }

    async fn load(&self, key: &CacheKey) -> ProfcacheResult<Option<CacheEntry>> {
        match self.backend.get(key).await {
            Ok(entry) => Ok(entry),
            Err(StorageError::CorruptEntry { reason, .. }) => {
                tracing::warn!(
                    key = %key,
                    backend = self.backend.name(),
                    %reason,
                    "corrupt cache entry, treating as absent"
                );
                Ok(None)
            }
            Err(err) => {
                tracing::error!(key = %key, backend = self.backend.name(), error = %err, "cache lookup failed");
                Err(err.into())
            }
        }
    }

    async fn fetch_and_store(&self, key: &CacheKey) -> ProfcacheResult<Resolved> {
        tracing::debug!(key = %key, "fetching upstream");

        let payload = self.fetcher.fetch(key).await.map_err(|err| {
            tracing::warn!(key = %key, kind = err.kind(), error = %err, "upstream fetch failed");
            err
        })?;

        // Never stamp earlier than the stored entry, even when the cache was
        // bypassed or the stored entry is dated ahead of this clock.
        let mut fetched_at = Utc::now();
        if let Some(stored) = self.load(key).await? {
            fetched_at = fetched_at.max(stored.fetched_at);
        }
        let entry = CacheEntry::new(key.clone(), payload, fetched_at);

        self.backend.put(&entry).await.map_err(|err| {
            tracing::error!(key = %key, backend = self.backend.name(), error = %err, "cache write failed");
            err
        })?;

        tracing::debug!(key = %key, fetched_at = %entry.fetched_at, "stored fresh entry");
        Ok(Resolved::from_upstream(entry))
    }
}
