//! End-to-end lookups against the structured store.
//!
//! Run with `--features db-tests` and `DATABASE_URL` pointing at a scratch
//! database.

#![cfg(feature = "db-tests")]

mod support;

use std::sync::Arc;

use axum::http::StatusCode;
use profcache_api::{build_backend, BackendKind, DbConfig, ServiceConfig};
use profcache_test_utils::{key, profile_payload, CacheConfig, FakeFetcher, PersistenceBackend};
use support::{get, router};

async fn postgres_backend() -> Arc<dyn PersistenceBackend> {
    let service = ServiceConfig {
        backend: BackendKind::Postgres,
        ..ServiceConfig::default()
    };
    build_backend(&service, &DbConfig::from_env())
        .await
        .expect("postgres backend should start")
}

fn unique_key(prefix: &str) -> String {
    format!("{}-{}", prefix, chrono::Utc::now().timestamp_micros())
}

#[tokio::test]
async fn lookup_round_trips_through_postgres() {
    let backend = postgres_backend().await;
    let fetcher = Arc::new(FakeFetcher::returning(profile_payload("Alice")));
    let app = router(backend.clone(), fetcher.clone(), CacheConfig::default());
    let raw_key = unique_key("alice");

    let first = get(&app, &format!("/fetchdata/{}/raw", raw_key)).await;
    assert_eq!(first.status, StatusCode::OK);
    assert_eq!(first.header("x-cache"), Some("MISS"));

    let download = get(&app, &format!("/fetchdata/{}/download", raw_key)).await;
    assert_eq!(download.status, StatusCode::OK);
    assert_eq!(download.header("x-cache"), Some("HIT"));
    assert_eq!(download.json()["profile"]["firstName"], "Alice");

    let stored = backend.get(&key(&raw_key)).await.unwrap().unwrap();
    assert_eq!(stored.payload, profile_payload("Alice"));
    assert_eq!(fetcher.calls(), 1);
}

#[tokio::test]
async fn readiness_checks_postgres() {
    let backend = postgres_backend().await;
    let fetcher = Arc::new(FakeFetcher::returning(profile_payload("Alice")));
    let app = router(backend, fetcher, CacheConfig::default());

    let response = get(&app, "/health/ready").await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.json()["details"]["storage"]["backend"], "postgres");
}
