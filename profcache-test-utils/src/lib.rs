//! Profcache Test Utilities
//!
//! Centralized test infrastructure for the profcache workspace:
//! - In-memory persistence backend with failure injection
//! - Scripted upstream fetcher with call counting
//! - Fixtures for common scenarios
//! - Proptest generators for keys and payloads

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use proptest::prelude::*;
use serde_json::{json, Value};

// Re-export core types for convenience
pub use profcache_core::{
    Action, CacheEntry, CacheKey, DownloadArtifact, FetchError, FreshnessPolicy, Payload,
    ProfcacheError, ProfcacheResult, ResolveSource, Resolved, StorageError, StorageResult,
};
pub use profcache_storage::{CacheConfig, FetchThrough, FileBackend, PersistenceBackend, UpstreamFetcher};

// ============================================================================
// IN-MEMORY BACKEND
// ============================================================================

/// Persistence backend holding serialized documents in memory.
///
/// Stores the same document bytes the flat-file store would write, so
/// `artifact` is byte-exact and raw corrupt bytes can be planted.
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    documents: RwLock<HashMap<CacheKey, Vec<u8>>>,
    unavailable: AtomicBool,
    gets: AtomicUsize,
    puts: AtomicUsize,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail with `Unavailable`.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Plant raw bytes under a key, bypassing serialization.
    pub fn insert_raw(&self, key: &CacheKey, bytes: impl Into<Vec<u8>>) {
        self.documents
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key.clone(), bytes.into());
    }

    /// Raw bytes currently stored for a key.
    pub fn raw(&self, key: &CacheKey) -> Option<Vec<u8>> {
        self.documents
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(key)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.documents.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get_count(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    pub fn put_count(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }

    fn check_available(&self) -> StorageResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(StorageError::unavailable("in-memory backend switched off"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl PersistenceBackend for InMemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, key: &CacheKey) -> StorageResult<Option<CacheEntry>> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;
        match self.raw(key) {
            Some(bytes) => CacheEntry::from_document_bytes(key, &bytes).map(Some),
            None => Ok(None),
        }
    }

    async fn put(&self, entry: &CacheEntry) -> StorageResult<()> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;
        let bytes = entry.to_document_bytes()?;
        self.insert_raw(&entry.key, bytes);
        Ok(())
    }

    async fn artifact(&self, key: &CacheKey) -> StorageResult<Option<DownloadArtifact>> {
        self.check_available()?;
        Ok(self.raw(key).map(|bytes| DownloadArtifact::json(key, bytes)))
    }

    async fn health_check(&self) -> StorageResult<()> {
        self.check_available()
    }
}

// ============================================================================
// FAKE FETCHER
// ============================================================================

/// Upstream fetcher with scripted outcomes and call counting.
///
/// Outcomes are looked up per key first, then fall back to the default.
#[derive(Debug)]
pub struct FakeFetcher {
    default: Mutex<Result<Payload, FetchError>>,
    per_key: Mutex<HashMap<CacheKey, Result<Payload, FetchError>>>,
    calls: Mutex<HashMap<CacheKey, usize>>,
    total: AtomicUsize,
    delay: Duration,
}

impl FakeFetcher {
    /// Fetcher returning `payload` for every key.
    pub fn returning(payload: Payload) -> Self {
        Self::with_default(Ok(payload))
    }

    /// Fetcher failing with `err` for every key.
    pub fn failing(err: FetchError) -> Self {
        Self::with_default(Err(err))
    }

    fn with_default(default: Result<Payload, FetchError>) -> Self {
        Self {
            default: Mutex::new(default),
            per_key: Mutex::new(HashMap::new()),
            calls: Mutex::new(HashMap::new()),
            total: AtomicUsize::new(0),
            delay: Duration::ZERO,
        }
    }

    /// Sleep this long inside every fetch.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Script the outcome for one key.
    pub fn script(&self, key: &CacheKey, outcome: Result<Payload, FetchError>) {
        self.per_key
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key.clone(), outcome);
    }

    /// Replace the default outcome.
    pub fn set_default(&self, outcome: Result<Payload, FetchError>) {
        *self.default.lock().unwrap_or_else(|e| e.into_inner()) = outcome;
    }

    /// Total number of fetches across keys.
    pub fn calls(&self) -> usize {
        self.total.load(Ordering::SeqCst)
    }

    /// Number of fetches for one key.
    pub fn calls_for(&self, key: &CacheKey) -> usize {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(key)
            .copied()
            .unwrap_or(0)
    }
}

#[async_trait]
impl UpstreamFetcher for FakeFetcher {
    async fn fetch(&self, key: &CacheKey) -> Result<Payload, FetchError> {
        self.total.fetch_add(1, Ordering::SeqCst);
        *self
            .calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .entry(key.clone())
            .or_insert(0) += 1;

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let scripted = self
            .per_key
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(key)
            .cloned();
        match scripted {
            Some(outcome) => outcome,
            None => self.default.lock().unwrap_or_else(|e| e.into_inner()).clone(),
        }
    }
}

// ============================================================================
// FIXTURES
// ============================================================================

/// Parse a key, panicking on invalid input. Test use only.
pub fn key(raw: &str) -> CacheKey {
    match CacheKey::parse(raw) {
        Ok(key) => key,
        Err(e) => panic!("invalid test key {:?}: {}", raw, e),
    }
}

/// Convert a JSON object literal into a payload. Test use only.
pub fn payload(value: Value) -> Payload {
    match value {
        Value::Object(map) => map,
        other => panic!("payload must be a JSON object, got {}", other),
    }
}

/// Realistic profile document with all five sections.
pub fn profile_payload(first_name: &str) -> Payload {
    payload(json!({
        "profile": {
            "firstName": first_name,
            "lastName": "Example",
            "headline": "Software Engineer",
            "profile_id": format!("ACoAA{}", first_name.to_uppercase()),
        },
        "contact_info": {
            "email_address": format!("{}@example.com", first_name.to_lowercase()),
            "websites": [],
        },
        "experiences": [
            {"title": "Engineer", "companyName": "Acme", "timePeriod": {"startDate": {"year": 2020}}}
        ],
        "skills": [{"name": "Rust"}, {"name": "PostgreSQL"}],
        "connections": [{"public_id": "someone-else"}],
    }))
}

/// Entry for `raw_key` fetched `age` ago.
pub fn entry_aged(raw_key: &str, payload: Payload, age: chrono::Duration) -> CacheEntry {
    CacheEntry::new(key(raw_key), payload, Utc::now() - age)
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

/// Valid cache keys.
pub fn arb_cache_key() -> impl Strategy<Value = CacheKey> {
    "[a-zA-Z0-9_-][a-zA-Z0-9._-]{0,40}".prop_map(|raw| key(&raw))
}

/// JSON leaf values.
pub fn arb_json_leaf() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(|n| json!(n)),
        "[a-zA-Z0-9 ]{0,20}".prop_map(Value::String),
    ]
}

/// Nested JSON values up to a small depth.
pub fn arb_json_value() -> impl Strategy<Value = Value> {
    arb_json_leaf().prop_recursive(3, 24, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
            prop::collection::hash_map("[a-z_]{1,8}", inner, 0..4)
                .prop_map(|m| Value::Object(m.into_iter().collect())),
        ]
    })
}

/// Payload objects, sometimes carrying the reserved `timestamp` field.
pub fn arb_payload() -> impl Strategy<Value = Payload> {
    prop::collection::hash_map("timestamp|[a-z_]{1,12}", arb_json_value(), 0..6)
        .prop_map(|m| m.into_iter().collect())
}
