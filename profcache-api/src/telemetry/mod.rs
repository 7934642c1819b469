//! Profcache Telemetry - Observability Infrastructure
//!
//! Structured logging through `tracing-subscriber` and Prometheus metrics
//! for the HTTP layer and the fetch-through path.

pub mod metrics;
pub mod tracer;

pub use metrics::{metrics, metrics_handler, ProfcacheMetrics, METRICS};
pub use tracer::{init_tracing, LogFormat, TelemetryConfig};
