//! Cache layer: persistence backends and the fetch-through orchestrator.
//!
//! The orchestrator ([`FetchThrough`]) is constructed with an explicit
//! backend and upstream fetcher, both injected as trait objects so the
//! backend can be chosen from configuration:
//!
//! - [`FileBackend`]: one JSON document per key in a directory.
//! - [`PgBackend`]: one row per key in PostgreSQL, via a connection pool.
//!
//! # Example
//!
//! ```ignore
//! let backend = Arc::new(FileBackend::new("data"));
//! let cache = FetchThrough::new(backend, fetcher, CacheConfig::default());
//!
//! let resolved = cache.resolve(&CacheKey::parse("alice")?, true).await?;
//! if resolved.was_cache_hit() {
//!     tracing::debug!("served from cache");
//! }
//! ```

pub mod file_backend;
pub mod pg_backend;
pub mod read_through;
pub mod single_flight;
pub mod traits;

pub use file_backend::FileBackend;
pub use pg_backend::{PgBackend, TABLE_NAME};
pub use read_through::{CacheConfig, FetchThrough};
pub use single_flight::{FlightGuard, SingleFlight};
pub use traits::{PersistenceBackend, UpstreamFetcher};
