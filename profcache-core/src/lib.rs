//! Profcache Core - Cache Model
//!
//! Cache key derivation, the cached entry model, the freshness policy and
//! the error taxonomy shared by every other crate. No I/O lives here.

pub mod action;
pub mod entry;
pub mod error;
pub mod freshness;
pub mod key;

pub use action::Action;
pub use entry::{
    format_timestamp, parse_timestamp, CacheEntry, DownloadArtifact, Payload,
    DOCUMENT_CONTENT_TYPE, DOCUMENT_EXTENSION, TIMESTAMP_FIELD,
};
pub use error::{
    FetchError, KeyError, ProfcacheError, ProfcacheResult, ProjectionError, StorageError,
    StorageResult,
};
pub use freshness::{FreshnessPolicy, ResolveSource, Resolved, DEFAULT_TTL};
pub use key::{CacheKey, MAX_KEY_LEN};
