//! Database Connection Pool Module
//!
//! PostgreSQL connection pooling for the structured store using
//! deadpool-postgres. Only the pool lives here; SQL is owned by
//! `profcache_storage::PgBackend`.
//!
//! Unless TLS is disabled, connections go through a rustls connector that
//! verifies the server against the webpki root set.

use deadpool_postgres::{
    Config, ManagerConfig, Pool, PoolConfig, RecyclingMethod, Runtime, SslMode, Timeouts,
};
use profcache_storage::PgBackend;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio_postgres::NoTls;
use tokio_postgres_rustls::MakeRustlsConnect;

use crate::config::parse_secs;
use crate::error::{ApiError, ApiResult};

// ============================================================================
// TLS MODE
// ============================================================================

/// libpq-style `sslmode` subset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DbSslMode {
    /// Plain TCP only.
    Disable,
    /// TLS when the server offers it.
    Prefer,
    /// Fail unless the connection is TLS.
    Require,
}

impl FromStr for DbSslMode {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "disable" => Ok(Self::Disable),
            "prefer" => Ok(Self::Prefer),
            "require" => Ok(Self::Require),
            _ => Err(()),
        }
    }
}

impl From<DbSslMode> for SslMode {
    fn from(mode: DbSslMode) -> Self {
        match mode {
            DbSslMode::Disable => SslMode::Disable,
            DbSslMode::Prefer => SslMode::Prefer,
            DbSslMode::Require => SslMode::Require,
        }
    }
}

// ============================================================================
// CONNECTION POOL CONFIGURATION
// ============================================================================

/// Database connection pool configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbConfig {
    /// Full connection URL; takes precedence over the discrete fields.
    pub url: Option<String>,
    /// PostgreSQL host
    pub host: String,
    /// PostgreSQL port
    pub port: u16,
    /// Database name
    pub dbname: String,
    /// Database user
    pub user: String,
    /// Database password
    pub password: String,
    /// Connections kept in the pool
    pub pool_size: usize,
    /// Extra connections allowed under load
    pub max_overflow: usize,
    /// How long a caller waits for a free connection
    pub pool_timeout: Duration,
    /// Connections older than this are retired
    pub pool_recycle: Duration,
    /// TLS mode; `None` keeps the URL's `sslmode` or the driver default
    pub ssl_mode: Option<DbSslMode>,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            url: None,
            host: "localhost".to_string(),
            port: 5432,
            dbname: "profcache".to_string(),
            user: "postgres".to_string(),
            password: "".to_string(),
            pool_size: 10,
            max_overflow: 20,
            pool_timeout: Duration::from_secs(30),
            pool_recycle: Duration::from_secs(1800),
            ssl_mode: None,
        }
    }
}

impl DbConfig {
    /// Create a new database configuration from environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Self {
            url: lookup("DATABASE_URL").filter(|s| !s.trim().is_empty()),
            host: lookup("PROFCACHE_DB_HOST").unwrap_or(defaults.host),
            port: lookup("PROFCACHE_DB_PORT")
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.port),
            dbname: lookup("PROFCACHE_DB_NAME").unwrap_or(defaults.dbname),
            user: lookup("PROFCACHE_DB_USER").unwrap_or(defaults.user),
            password: lookup("PROFCACHE_DB_PASSWORD").unwrap_or(defaults.password),
            pool_size: lookup("PROFCACHE_DB_POOL_SIZE")
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.pool_size),
            max_overflow: lookup("PROFCACHE_DB_MAX_OVERFLOW")
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_overflow),
            pool_timeout: parse_secs(lookup("PROFCACHE_DB_POOL_TIMEOUT"))
                .unwrap_or(defaults.pool_timeout),
            pool_recycle: parse_secs(lookup("PROFCACHE_DB_POOL_RECYCLE"))
                .unwrap_or(defaults.pool_recycle),
            ssl_mode: lookup("PROFCACHE_DB_SSLMODE")
                .and_then(|s| s.parse().ok())
                .or(defaults.ssl_mode),
        }
    }

    /// Upper bound on open connections.
    pub fn max_connections(&self) -> usize {
        (self.pool_size + self.max_overflow).max(1)
    }

    /// Whether connections use the TLS connector.
    pub fn tls_enabled(&self) -> bool {
        self.ssl_mode != Some(DbSslMode::Disable)
    }

    /// Create a connection pool from this configuration.
    pub fn create_pool(&self) -> ApiResult<Pool> {
        let mut cfg = Config::new();
        match &self.url {
            Some(url) => cfg.url = Some(url.clone()),
            None => {
                cfg.host = Some(self.host.clone());
                cfg.port = Some(self.port);
                cfg.dbname = Some(self.dbname.clone());
                cfg.user = Some(self.user.clone());
                cfg.password = Some(self.password.clone());
            }
        }

        cfg.ssl_mode = self.ssl_mode.map(SslMode::from);
        cfg.manager = Some(ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        });

        let mut pool_config = PoolConfig::new(self.max_connections());
        pool_config.timeouts = Timeouts {
            wait: Some(self.pool_timeout),
            create: Some(self.pool_timeout),
            recycle: Some(self.pool_timeout),
        };
        cfg.pool = Some(pool_config);

        let pool = if self.tls_enabled() {
            cfg.create_pool(Some(Runtime::Tokio1), rustls_connector()?)
        } else {
            cfg.create_pool(Some(Runtime::Tokio1), NoTls)
        };
        pool.map_err(|e| ApiError::internal_error(format!("Failed to create pool: {}", e)))
    }

    /// Build the structured store over a fresh pool.
    pub fn create_backend(&self) -> ApiResult<PgBackend> {
        let pool = self.create_pool()?;
        Ok(PgBackend::new(pool).with_max_connection_age(self.pool_recycle))
    }
}

fn rustls_connector() -> ApiResult<MakeRustlsConnect> {
    let roots = rustls::RootCertStore {
        roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
    };
    let config =
        rustls::ClientConfig::builder_with_provider(Arc::new(rustls::crypto::ring::default_provider()))
            .with_safe_default_protocol_versions()
            .map_err(|e| ApiError::internal_error(format!("Invalid TLS configuration: {}", e)))?
            .with_root_certificates(roots)
            .with_no_client_auth();
    Ok(MakeRustlsConnect::new(config))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| vars.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = DbConfig::from_lookup(lookup(&[]));
        assert_eq!(config, DbConfig::default());
        assert_eq!(config.max_connections(), 30);
    }

    #[test]
    fn test_url_takes_precedence() {
        let config = DbConfig::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://cache:secret@db:5432/profiles"),
            ("PROFCACHE_DB_HOST", "ignored"),
        ]));
        assert_eq!(
            config.url.as_deref(),
            Some("postgres://cache:secret@db:5432/profiles")
        );
    }

    #[test]
    fn test_pool_parameters() {
        let config = DbConfig::from_lookup(lookup(&[
            ("PROFCACHE_DB_POOL_SIZE", "4"),
            ("PROFCACHE_DB_MAX_OVERFLOW", "2"),
            ("PROFCACHE_DB_POOL_TIMEOUT", "5"),
            ("PROFCACHE_DB_POOL_RECYCLE", "600"),
        ]));
        assert_eq!(config.max_connections(), 6);
        assert_eq!(config.pool_timeout, Duration::from_secs(5));
        assert_eq!(config.pool_recycle, Duration::from_secs(600));
    }

    #[test]
    fn test_ssl_mode() {
        let config = DbConfig::from_lookup(lookup(&[("PROFCACHE_DB_SSLMODE", "REQUIRE")]));
        assert_eq!(config.ssl_mode, Some(DbSslMode::Require));
        assert!(config.tls_enabled());

        let config = DbConfig::from_lookup(lookup(&[("PROFCACHE_DB_SSLMODE", "disable")]));
        assert_eq!(config.ssl_mode, Some(DbSslMode::Disable));
        assert!(!config.tls_enabled());

        let config = DbConfig::from_lookup(lookup(&[("PROFCACHE_DB_SSLMODE", "verify-full")]));
        assert_eq!(config.ssl_mode, None);
        assert!(config.tls_enabled());
    }

    #[tokio::test]
    async fn test_create_pool_with_required_tls() {
        let config = DbConfig {
            ssl_mode: Some(DbSslMode::Require),
            ..DbConfig::default()
        };
        let pool = config.create_pool().unwrap();
        assert_eq!(pool.status().size, 0);
    }

    #[tokio::test]
    async fn test_create_pool_is_lazy() {
        // No connection is opened until the first checkout.
        let pool = DbConfig::default().create_pool().unwrap();
        assert_eq!(pool.status().max_size, 30);
        assert_eq!(pool.status().size, 0);
    }
}
