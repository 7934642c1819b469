//! Profcache API Server Entry Point
//!
//! Bootstraps configuration, wires the persistence backend and upstream
//! client, and starts the Axum HTTP server.

use profcache_api::telemetry::{init_tracing, TelemetryConfig};
use profcache_api::{
    create_router, ApiError, ApiResult, AppState, DbConfig, RouterConfig, ServiceConfig,
    UpstreamConfig,
};

#[tokio::main]
async fn main() -> ApiResult<()> {
    let telemetry_config = TelemetryConfig::default();
    init_tracing(&telemetry_config)?;

    let service_config = ServiceConfig::from_env()?;
    let upstream_config = UpstreamConfig::from_env()?;
    let db_config = DbConfig::from_env();

    let state = AppState::from_config(&service_config, &upstream_config, &db_config).await?;
    let app = create_router(
        state,
        &RouterConfig {
            request_timeout: service_config.request_timeout,
        },
    );

    let addr = service_config.bind_addr()?;
    tracing::info!(%addr, backend = service_config.backend.as_str(), "Starting profcache server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ApiError::internal_error(format!("Failed to bind {}: {}", addr, e)))?;

    let server = axum::serve(listener, app);
    tokio::select! {
        result = server => {
            result.map_err(|e| ApiError::internal_error(format!("Server error: {}", e)))?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
        }
    }

    Ok(())
}
