//! Profcache Storage
//!
//! Persistence backends for cached profile entries and the fetch-through
//! orchestrator that sits in front of the upstream fetcher.

pub mod cache;

pub use cache::{
    CacheConfig, FetchThrough, FileBackend, FlightGuard, PersistenceBackend, PgBackend,
    SingleFlight, UpstreamFetcher, TABLE_NAME,
};
