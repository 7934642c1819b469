//! Prometheus Metrics Definitions
//!
//! Defines the profcache metrics and exposes a /metrics endpoint for
//! Prometheus scraping.

use axum::{http::StatusCode, response::IntoResponse};
use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_histogram_vec, CounterVec, Encoder, HistogramVec, TextEncoder,
};

use crate::error::{ApiError, ApiResult};

/// Upstream fetch latency buckets (seconds). Profile fetches fan out into
/// five calls, so the range reaches past the client timeout.
const UPSTREAM_LATENCY_BUCKETS: &[f64] = &[0.050, 0.100, 0.250, 0.500, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0];

/// Global metrics instance - initialized once on first use
pub static METRICS: Lazy<ApiResult<ProfcacheMetrics>> = Lazy::new(ProfcacheMetrics::new);

/// Registered metrics, or `None` if registration failed.
pub fn metrics() -> Option<&'static ProfcacheMetrics> {
    METRICS.as_ref().ok()
}

/// Container for all profcache metrics.
#[derive(Clone)]
pub struct ProfcacheMetrics {
    /// Resolutions by outcome - labels: source (cache/upstream/joined/error)
    pub resolve_total: CounterVec,

    /// Upstream fetch duration - labels: outcome
    pub upstream_fetch_duration_seconds: HistogramVec,

    /// Lookup requests - labels: action, status
    pub http_requests_total: CounterVec,
}

impl ProfcacheMetrics {
    /// Create and register all metrics with Prometheus.
    pub fn new() -> ApiResult<Self> {
        Ok(Self {
            resolve_total: register_counter_vec!(
                "profcache_resolve_total",
                "Total number of cache resolutions by source",
                &["source"]
            )
            .map_err(|e| ApiError::internal_error(format!("Failed to register resolve_total: {}", e)))?,

            upstream_fetch_duration_seconds: register_histogram_vec!(
                "profcache_upstream_fetch_duration_seconds",
                "Upstream profile fetch duration in seconds",
                &["outcome"],
                UPSTREAM_LATENCY_BUCKETS.to_vec()
            )
            .map_err(|e| {
                ApiError::internal_error(format!(
                    "Failed to register upstream_fetch_duration_seconds: {}",
                    e
                ))
            })?,

            http_requests_total: register_counter_vec!(
                "profcache_http_requests_total",
                "Total number of profile lookup requests",
                &["action", "status"]
            )
            .map_err(|e| ApiError::internal_error(format!("Failed to register http_requests_total: {}", e)))?,
        })
    }

    /// Record how a lookup was resolved.
    pub fn record_resolve(&self, source: &str) {
        self.resolve_total.with_label_values(&[source]).inc();
    }

    /// Record an upstream fetch.
    pub fn record_upstream_fetch(&self, outcome: &str, duration_secs: f64) {
        self.upstream_fetch_duration_seconds
            .with_label_values(&[outcome])
            .observe(duration_secs);
    }

    /// Record a lookup request.
    pub fn record_http_request(&self, action: &str, status: u16) {
        let status_str = status.to_string();
        self.http_requests_total
            .with_label_values(&[action, &status_str])
            .inc();
    }
}

/// Handler for GET /metrics endpoint.
///
/// Returns Prometheus text format metrics.
pub async fn metrics_handler() -> impl IntoResponse {
    // Touch the registry so the families exist before the first lookup.
    let _ = metrics();

    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    match encoder.encode(&metric_families, &mut buffer) {
        Ok(_) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            buffer,
        ),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode metrics");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [("content-type", "text/plain")],
                format!("Failed to encode metrics: {}", e).into_bytes(),
            )
        }
    }
}
