//! Service Configuration Module
//!
//! Configuration for the HTTP service, the persistence backend selection and
//! the upstream client. Everything is loaded from environment variables with
//! defaults suitable for local development.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use profcache_core::DEFAULT_TTL;

use crate::error::{ApiError, ApiResult};

/// Default request deadline.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Default upstream call timeout.
pub const DEFAULT_UPSTREAM_TIMEOUT: Duration = Duration::from_secs(30);

// ============================================================================
// BACKEND SELECTION
// ============================================================================

/// Which persistence backend serves the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    /// One JSON file per key under the data directory.
    File,
    /// `profile_cache` table in PostgreSQL.
    Postgres,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::File => "file",
            BackendKind::Postgres => "postgres",
        }
    }
}

impl FromStr for BackendKind {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "file" | "files" | "fs" => Ok(BackendKind::File),
            "postgres" | "postgresql" | "pg" => Ok(BackendKind::Postgres),
            other => Err(ApiError::internal_error(format!(
                "Unknown backend '{}', expected 'file' or 'postgres'",
                other
            ))),
        }
    }
}

// ============================================================================
// SERVICE CONFIGURATION
// ============================================================================

/// HTTP service and cache configuration.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub bind_host: String,
    pub port: u16,
    pub backend: BackendKind,
    /// Flat-file store directory.
    pub data_dir: PathBuf,
    pub cache_ttl: Duration,
    /// Serialize concurrent upstream fetches per key.
    pub single_flight: bool,
    /// Per-request deadline.
    pub request_timeout: Duration,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            bind_host: "0.0.0.0".to_string(),
            port: 3000,
            backend: BackendKind::File,
            data_dir: PathBuf::from("data"),
            cache_ttl: DEFAULT_TTL,
            single_flight: false,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

impl ServiceConfig {
    /// Create ServiceConfig from environment variables.
    ///
    /// Environment variables:
    /// - `PROFCACHE_BIND`: Bind host (default: 0.0.0.0)
    /// - `PORT` or `PROFCACHE_PORT`: Listen port (default: 3000)
    /// - `PROFCACHE_BACKEND`: "file" or "postgres" (default: file)
    /// - `PROFCACHE_DATA_DIR`: Flat-file store directory (default: data)
    /// - `PROFCACHE_CACHE_TTL_SECS`: Freshness window (default: 3600)
    /// - `PROFCACHE_SINGLE_FLIGHT`: "true" to dedupe concurrent fetches (default: false)
    /// - `PROFCACHE_REQUEST_TIMEOUT_SECS`: Request deadline (default: 60)
    pub fn from_env() -> ApiResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> ApiResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let backend = match lookup("PROFCACHE_BACKEND") {
            Some(raw) => raw.parse()?,
            None => defaults.backend,
        };

        Ok(Self {
            bind_host: lookup("PROFCACHE_BIND").unwrap_or(defaults.bind_host),
            port: lookup("PORT")
                .or_else(|| lookup("PROFCACHE_PORT"))
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.port),
            backend,
            data_dir: lookup("PROFCACHE_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            cache_ttl: parse_secs(lookup("PROFCACHE_CACHE_TTL_SECS")).unwrap_or(defaults.cache_ttl),
            single_flight: lookup("PROFCACHE_SINGLE_FLIGHT")
                .map(|s| parse_flag(&s))
                .unwrap_or(defaults.single_flight),
            request_timeout: parse_secs(lookup("PROFCACHE_REQUEST_TIMEOUT_SECS"))
                .unwrap_or(defaults.request_timeout),
        })
    }

    /// Socket address to listen on.
    pub fn bind_addr(&self) -> ApiResult<SocketAddr> {
        let addr = format!("{}:{}", self.bind_host, self.port);
        addr.parse::<SocketAddr>().map_err(|e| {
            ApiError::internal_error(format!("Invalid bind address {}: {}", addr, e))
        })
    }
}

// ============================================================================
// UPSTREAM CONFIGURATION
// ============================================================================

/// Upstream profile API client configuration.
///
/// There is no default base URL: the fetcher speaks a generic profile-API
/// contract (see [`HttpProfileFetcher`](crate::upstream::HttpProfileFetcher))
/// and the deployment names the service that implements it.
#[derive(Debug, Clone)]
pub struct UpstreamConfig {
    /// Base URL the `profiles/...` paths are resolved against.
    pub base_url: String,
    /// Session cookie document, re-read on every fetch.
    pub cookies_path: PathBuf,
    pub timeout: Duration,
}

impl UpstreamConfig {
    /// Config for `base_url` with default cookie path and timeout.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            cookies_path: PathBuf::from("cookies.json"),
            timeout: DEFAULT_UPSTREAM_TIMEOUT,
        }
    }

    /// Create UpstreamConfig from environment variables.
    ///
    /// Environment variables:
    /// - `PROFCACHE_UPSTREAM_URL`: Base URL of the profile API (required)
    /// - `PROFCACHE_COOKIES_PATH`: Session cookie file (default: cookies.json)
    /// - `PROFCACHE_UPSTREAM_TIMEOUT_SECS`: Per-call timeout (default: 30)
    pub fn from_env() -> ApiResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> ApiResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let base_url = lookup("PROFCACHE_UPSTREAM_URL")
            .map(|raw| raw.trim().to_string())
            .filter(|raw| !raw.is_empty())
            .ok_or_else(|| ApiError::internal_error("PROFCACHE_UPSTREAM_URL must be set"))?;

        let defaults = Self::new(base_url);
        Ok(Self {
            cookies_path: lookup("PROFCACHE_COOKIES_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.cookies_path),
            timeout: parse_secs(lookup("PROFCACHE_UPSTREAM_TIMEOUT_SECS"))
                .unwrap_or(defaults.timeout),
            base_url: defaults.base_url,
        })
    }
}

pub(crate) fn parse_secs(raw: Option<String>) -> Option<Duration> {
    raw.and_then(|s| s.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

pub(crate) fn parse_flag(raw: &str) -> bool {
    matches!(raw.trim().to_lowercase().as_str(), "true" | "1" | "yes" | "on")
}
