//! Shared application state for Axum routers.

use std::sync::Arc;
use std::time::Instant;

use profcache_storage::{
    CacheConfig, FetchThrough, FileBackend, PersistenceBackend, UpstreamFetcher,
};

use crate::config::{BackendKind, ServiceConfig, UpstreamConfig};
use crate::db::DbConfig;
use crate::error::ApiResult;
use crate::render::{HtmlRenderer, Renderer};
use crate::upstream::{HttpProfileFetcher, MeteredFetcher};

/// Application-wide state shared across all routes.
#[derive(Clone)]
pub struct AppState {
    /// Fetch-through orchestrator over the configured backend.
    pub cache: FetchThrough,
    /// Web-view renderer.
    pub renderer: Arc<dyn Renderer>,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(cache: FetchThrough, renderer: Arc<dyn Renderer>) -> Self {
        Self {
            cache,
            renderer,
            start_time: Instant::now(),
        }
    }

    /// State with the built-in HTML renderer.
    pub fn with_html_renderer(cache: FetchThrough) -> Self {
        Self::new(cache, Arc::new(HtmlRenderer::new()))
    }

    /// Wire the production backend and upstream client from configuration.
    pub async fn from_config(
        service: &ServiceConfig,
        upstream: &UpstreamConfig,
        db: &DbConfig,
    ) -> ApiResult<Self> {
        let backend = build_backend(service, db).await?;
        let fetcher: Arc<dyn UpstreamFetcher> = Arc::new(MeteredFetcher::new(Arc::new(
            HttpProfileFetcher::new(upstream)?,
        )));

        let cache_config = CacheConfig::new()
            .with_ttl(service.cache_ttl)
            .with_single_flight(service.single_flight);

        tracing::info!(
            backend = backend.name(),
            ttl_secs = service.cache_ttl.as_secs(),
            single_flight = service.single_flight,
            upstream = %upstream.base_url,
            "Cache configured"
        );

        Ok(Self::with_html_renderer(FetchThrough::new(
            backend,
            fetcher,
            cache_config,
        )))
    }
}

/// Construct the persistence backend named by the configuration.
pub async fn build_backend(
    service: &ServiceConfig,
    db: &DbConfig,
) -> ApiResult<Arc<dyn PersistenceBackend>> {
    match service.backend {
        BackendKind::File => Ok(Arc::new(FileBackend::new(service.data_dir.clone()))),
        BackendKind::Postgres => {
            let backend = db.create_backend()?;
            backend.ensure_schema().await?;
            Ok(Arc::new(backend))
        }
    }
}
