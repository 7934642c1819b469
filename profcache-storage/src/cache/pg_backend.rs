//! PostgreSQL-backed structured store.
//!
//! One row per key in `profile_cache`. Connections come from a deadpool
//! pool and are acquired and released per call; acquisition queues up to
//! the pool's wait timeout under exhaustion rather than failing immediately.
//!
//! `put` is a single `INSERT ... ON CONFLICT DO UPDATE` statement, so each
//! key is replaced atomically. The conflict clause only applies when the
//! incoming `fetched_at` is not older than the stored one, which keeps
//! `fetched_at` non-decreasing per key even when writers race.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use deadpool_postgres::{Object, Pool, PoolError};
use profcache_core::{
    CacheEntry, CacheKey, DownloadArtifact, StorageError, StorageResult, TIMESTAMP_FIELD,
};
use serde_json::Value as JsonValue;

use super::traits::PersistenceBackend;

/// Table holding cached entries.
pub const TABLE_NAME: &str = "profile_cache";

const CREATE_TABLE_SQL: &str = "CREATE TABLE IF NOT EXISTS profile_cache (
    key TEXT PRIMARY KEY,
    payload JSONB NOT NULL,
    fetched_at TIMESTAMPTZ NOT NULL
)";

const SELECT_SQL: &str = "SELECT payload, fetched_at FROM profile_cache WHERE key = $1";

const UPSERT_SQL: &str = "INSERT INTO profile_cache (key, payload, fetched_at)
    VALUES ($1, $2, $3)
    ON CONFLICT (key) DO UPDATE
    SET payload = EXCLUDED.payload, fetched_at = EXCLUDED.fetched_at
    WHERE profile_cache.fetched_at <= EXCLUDED.fetched_at";

/// Structured store over a deadpool-postgres pool.
#[derive(Clone)]
pub struct PgBackend {
    pool: Pool,
    /// Connections older than this are retired before acquisition.
    max_connection_age: Option<Duration>,
}

impl PgBackend {
    pub fn new(pool: Pool) -> Self {
        Self {
            pool,
            max_connection_age: None,
        }
    }

    /// Retire pooled connections older than `age`.
    pub fn with_max_connection_age(mut self, age: Duration) -> Self {
        self.max_connection_age = Some(age);
        self
    }

    /// Current pool size for observability.
    pub fn pool_size(&self) -> usize {
        self.pool.status().size
    }

    /// Create the cache table if it does not exist.
    pub async fn ensure_schema(&self) -> StorageResult<()> {
        let conn = self.get_conn().await?;
        conn.batch_execute(CREATE_TABLE_SQL)
            .await
            .map_err(db_error)?;
        tracing::info!(table = TABLE_NAME, "cache schema ready");
        Ok(())
    }

    async fn get_conn(&self) -> StorageResult<Object> {
        if let Some(max_age) = self.max_connection_age {
            let _ = self.pool.retain(|_, metrics| metrics.age() < max_age);
        }
        self.pool.get().await.map_err(pool_error)
    }

    async fn fetch_row(&self, key: &CacheKey) -> StorageResult<Option<CacheEntry>> {
        let conn = self.get_conn().await?;
        let stmt = conn.prepare_cached(SELECT_SQL).await.map_err(db_error)?;
        let row = conn
            .query_opt(&stmt, &[&key.as_str()])
            .await
            .map_err(db_error)?;

        let Some(row) = row else {
            return Ok(None);
        };

        let payload: JsonValue = row
            .try_get(0)
            .map_err(|e| StorageError::corrupt(key.as_str(), format!("payload: {}", e)))?;
        let fetched_at: DateTime<Utc> = row
            .try_get(1)
            .map_err(|e| StorageError::corrupt(key.as_str(), format!("fetched_at: {}", e)))?;

        match payload {
            JsonValue::Object(payload) => {
                Ok(Some(CacheEntry::new(key.clone(), payload, fetched_at)))
            }
            _ => Err(StorageError::corrupt(
                key.as_str(),
                "payload is not a JSON object",
            )),
        }
    }
}

#[async_trait]
impl PersistenceBackend for PgBackend {
    fn name(&self) -> &'static str {
        "postgres"
    }

    async fn get(&self, key: &CacheKey) -> StorageResult<Option<CacheEntry>> {
        self.fetch_row(key).await
    }

    async fn put(&self, entry: &CacheEntry) -> StorageResult<()> {
        let conn = self.get_conn().await?;
        let stmt = conn.prepare_cached(UPSERT_SQL).await.map_err(db_error)?;
        let mut payload = entry.payload.clone();
        payload.remove(TIMESTAMP_FIELD);
        let payload = JsonValue::Object(payload);

        let updated = conn
            .execute(&stmt, &[&entry.key.as_str(), &payload, &entry.fetched_at])
            .await
            .map_err(db_error)?;

        if updated == 0 {
            tracing::debug!(
                key = %entry.key,
                "stored entry is newer than incoming write, kept stored entry"
            );
        }
        Ok(())
    }

    async fn artifact(&self, key: &CacheKey) -> StorageResult<Option<DownloadArtifact>> {
        match self.fetch_row(key).await? {
            Some(entry) => Ok(Some(DownloadArtifact::json(key, entry.to_document_bytes()?))),
            None => Ok(None),
        }
    }

    async fn health_check(&self) -> StorageResult<()> {
        let conn = self.get_conn().await?;
        conn.query_one("SELECT 1", &[]).await.map_err(db_error)?;
        Ok(())
    }
}

fn db_error(err: tokio_postgres::Error) -> StorageError {
    tracing::error!("Database error: {:?}", err);
    StorageError::unavailable(format!("database operation failed: {}", err))
}

fn pool_error(err: PoolError) -> StorageError {
    tracing::error!("Connection pool error: {:?}", err);
    match err {
        PoolError::Timeout(_) => StorageError::unavailable("connection pool exhausted"),
        PoolError::Closed => StorageError::unavailable("connection pool is closed"),
        other => StorageError::unavailable(format!("failed to acquire connection: {}", other)),
    }
}

#[cfg(all(test, feature = "db-tests"))]
mod tests {
    use super::*;
    use deadpool_postgres::{Config, Runtime};
    use profcache_core::Payload;
    use serde_json::json;
    use tokio_postgres::NoTls;

    fn test_backend() -> PgBackend {
        let mut cfg = Config::new();
        cfg.url = std::env::var("DATABASE_URL").ok();
        let pool = cfg
            .create_pool(Some(Runtime::Tokio1), NoTls)
            .expect("DATABASE_URL must point at a reachable database");
        PgBackend::new(pool).with_max_connection_age(Duration::from_secs(1800))
    }

    fn unique_key(prefix: &str) -> CacheKey {
        CacheKey::parse(&format!("{}-{}", prefix, uuid::Uuid::now_v7().simple())).unwrap()
    }

    fn payload() -> Payload {
        match json!({"profile": {"firstName": "Alice"}, "skills": [{"name": "Rust"}]}) {
            JsonValue::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[tokio::test]
    async fn test_round_trip() {
        let backend = test_backend();
        backend.ensure_schema().await.unwrap();
        let entry = CacheEntry::fetched_now(unique_key("alice"), payload());

        assert_eq!(backend.get(&entry.key).await.unwrap(), None);
        backend.put(&entry).await.unwrap();
        assert_eq!(backend.get(&entry.key).await.unwrap(), Some(entry.clone()));

        let artifact = backend.artifact(&entry.key).await.unwrap().unwrap();
        assert_eq!(artifact.bytes, entry.to_document_bytes().unwrap());
    }

    #[tokio::test]
    async fn test_older_write_does_not_replace_newer() {
        let backend = test_backend();
        backend.ensure_schema().await.unwrap();
        let key = unique_key("bob");
        let newer = CacheEntry::fetched_now(key.clone(), payload());
        let older = CacheEntry::new(
            key.clone(),
            Payload::new(),
            newer.fetched_at - chrono::Duration::minutes(5),
        );

        backend.put(&newer).await.unwrap();
        backend.put(&older).await.unwrap();
        assert_eq!(backend.get(&key).await.unwrap(), Some(newer));
    }

    #[tokio::test]
    async fn test_reserved_timestamp_field_is_not_stored() {
        let backend = test_backend();
        backend.ensure_schema().await.unwrap();
        let mut entry = CacheEntry::fetched_now(unique_key("carol"), payload());
        entry
            .payload
            .insert("timestamp".to_string(), json!("upstream value"));

        backend.put(&entry).await.unwrap();
        let loaded = backend.get(&entry.key).await.unwrap().unwrap();
        assert!(!loaded.payload.contains_key("timestamp"));
        assert_eq!(loaded.payload, payload());
    }

    #[tokio::test]
    async fn test_health_check() {
        let backend = test_backend();
        backend.health_check().await.unwrap();
        assert!(backend.pool_size() >= 1);
    }
}
