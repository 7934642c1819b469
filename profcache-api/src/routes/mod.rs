//! HTTP Routes Module
//!
//! Includes:
//! - Profile lookup (`/fetchdata/{key}/{action}`)
//! - Index page with the lookup form
//! - Health check endpoints (Kubernetes-compatible)
//! - Prometheus metrics

pub mod fetch;
pub mod health;
pub mod index;

use std::time::Duration;

use axum::{http::Method, routing::get, Router};
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::DEFAULT_REQUEST_TIMEOUT;
use crate::state::AppState;
use crate::telemetry::metrics_handler;

pub use health::create_router as health_router;

/// Router-level settings.
#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// Requests running longer than this are answered with 408 and their
    /// handler future is dropped.
    pub request_timeout: Duration,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

/// Build the service router with its middleware stack.
pub fn create_router(state: AppState, config: &RouterConfig) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET]);

    Router::new()
        .route("/", get(index::index))
        .route("/fetchdata/:key/:action", get(fetch::fetch_data))
        .nest("/health", health::create_router())
        .route("/metrics", get(metrics_handler))
        .layer(
            ServiceBuilder::new()
                .layer(CompressionLayer::new())
                .layer(TraceLayer::new_for_http())
                .layer(TimeoutLayer::new(config.request_timeout))
                .layer(cors),
        )
        .with_state(state)
}
