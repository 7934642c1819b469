//! Freshness policy and resolution metadata.
//!
//! A stored entry may be served without refetching only while its age is
//! strictly below the configured TTL. There is no sliding window and no
//! per-key override; callers that want fresh data disable cache use instead.

use chrono::{DateTime, Utc};
use std::time::Duration;

use crate::entry::CacheEntry;

/// Default time-to-live for cached entries.
pub const DEFAULT_TTL: Duration = Duration::from_secs(60 * 60);

/// Decides whether a stored entry may be served as-is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FreshnessPolicy {
    ttl: Duration,
}

impl Default for FreshnessPolicy {
    fn default() -> Self {
        Self { ttl: DEFAULT_TTL }
    }
}

impl FreshnessPolicy {
    pub fn new(ttl: Duration) -> Self {
        Self { ttl }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// True iff `now - entry.fetched_at < ttl`.
    ///
    /// Entries stamped in the future have a negative age and are fresh.
    pub fn is_fresh(&self, entry: &CacheEntry, now: DateTime<Utc>) -> bool {
        let age = now.signed_duration_since(entry.fetched_at);
        match chrono::Duration::from_std(self.ttl) {
            Ok(ttl) => age < ttl,
            // TTL beyond chrono's range never expires.
            Err(_) => true,
        }
    }

    /// Absent entries are never fresh.
    pub fn is_fresh_opt(&self, entry: Option<&CacheEntry>, now: DateTime<Utc>) -> bool {
        entry.is_some_and(|e| self.is_fresh(e, now))
    }

    /// Age of an entry, clamped at zero.
    pub fn age(entry: &CacheEntry, now: DateTime<Utc>) -> Duration {
        now.signed_duration_since(entry.fetched_at)
            .to_std()
            .unwrap_or(Duration::ZERO)
    }
}

/// Where a resolved entry came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResolveSource {
    /// Served from the backend without refetching.
    Cache,
    /// Fetched upstream and written back.
    Upstream,
    /// Shared the result of a concurrent in-flight fetch for the same key.
    Joined,
}

impl ResolveSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cache => "cache",
            Self::Upstream => "upstream",
            Self::Joined => "joined",
        }
    }
}

/// Outcome of a successful resolution, carrying how it was served.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved {
    entry: CacheEntry,
    source: ResolveSource,
}

impl Resolved {
    pub fn from_cache(entry: CacheEntry) -> Self {
        Self {
            entry,
            source: ResolveSource::Cache,
        }
    }

    pub fn from_upstream(entry: CacheEntry) -> Self {
        Self {
            entry,
            source: ResolveSource::Upstream,
        }
    }

    pub fn joined(entry: CacheEntry) -> Self {
        Self {
            entry,
            source: ResolveSource::Joined,
        }
    }

    pub fn entry(&self) -> &CacheEntry {
        &self.entry
    }

    pub fn into_entry(self) -> CacheEntry {
        self.entry
    }

    pub fn source(&self) -> ResolveSource {
        self.source
    }

    pub fn was_cache_hit(&self) -> bool {
        self.source == ResolveSource::Cache
    }
}
