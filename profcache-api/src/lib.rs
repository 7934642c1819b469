//! Profcache API - HTTP front door for the profile lookup service
//!
//! Serves profile lookups through the fetch-through cache in
//! `profcache-storage`, with an index page, health checks and Prometheus
//! metrics. The persistence backend (flat files or PostgreSQL) and the
//! upstream client are chosen from environment configuration at startup.

pub mod config;
pub mod db;
pub mod error;
pub mod render;
pub mod routes;
pub mod state;
pub mod telemetry;
pub mod upstream;

// Re-export commonly used types
pub use config::{BackendKind, ServiceConfig, UpstreamConfig};
pub use db::{DbConfig, DbSslMode};
pub use error::{ApiError, ApiResult, ErrorCode};
pub use render::{HtmlRenderer, Renderer};
pub use routes::{create_router, RouterConfig};
pub use state::{build_backend, AppState};
pub use upstream::{HttpProfileFetcher, MeteredFetcher, SessionCookies};
