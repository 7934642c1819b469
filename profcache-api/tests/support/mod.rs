//! Shared helpers for router-level tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    http::{HeaderMap, Request, StatusCode},
    Router,
};
use profcache_api::{create_router, AppState, RouterConfig};
use profcache_test_utils::{CacheConfig, FakeFetcher, FetchThrough, PersistenceBackend};
use serde_json::Value;
use tower::ServiceExt; // for `oneshot`

/// Collected response parts.
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl TestResponse {
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body).expect("response body should be JSON")
    }

    pub fn text(&self) -> String {
        String::from_utf8(self.body.clone()).expect("response body should be UTF-8")
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

pub fn router(
    backend: Arc<dyn PersistenceBackend>,
    fetcher: Arc<FakeFetcher>,
    config: CacheConfig,
) -> Router {
    router_with_timeout(backend, fetcher, config, Duration::from_secs(60))
}

pub fn router_with_timeout(
    backend: Arc<dyn PersistenceBackend>,
    fetcher: Arc<FakeFetcher>,
    config: CacheConfig,
    request_timeout: Duration,
) -> Router {
    let cache = FetchThrough::new(backend, fetcher, config);
    create_router(
        AppState::with_html_renderer(cache),
        &RouterConfig { request_timeout },
    )
}

pub async fn get(router: &Router, uri: &str) -> TestResponse {
    let request = Request::builder()
        .uri(uri)
        .body(Body::empty())
        .expect("request should build");

    let response = router
        .clone()
        .oneshot(request)
        .await
        .expect("router is infallible");

    let status = response.status();
    let headers = response.headers().clone();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body should be readable")
        .to_vec();

    TestResponse {
        status,
        headers,
        body,
    }
}
