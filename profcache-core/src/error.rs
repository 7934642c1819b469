//! Error types for profcache.

use thiserror::Error;

/// Cache key validation errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyError {
    #[error("key must not be empty")]
    Empty,

    #[error("key is {len} bytes, maximum is {max}")]
    TooLong { len: usize, max: usize },

    #[error("key contains invalid character {ch:?}")]
    InvalidChar { ch: char },

    #[error("key must not start with '.'")]
    LeadingDot,
}

/// Persistence backend errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    /// Backend unreachable or unwritable.
    #[error("Storage unavailable: {reason}")]
    Unavailable { reason: String },

    /// Stored bytes for a key failed to deserialize.
    #[error("Corrupt cache entry for {key}: {reason}")]
    CorruptEntry { key: String, reason: String },
}

impl StorageError {
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable {
            reason: reason.into(),
        }
    }

    pub fn corrupt(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::CorruptEntry {
            key: key.into(),
            reason: reason.into(),
        }
    }

    pub fn is_corrupt(&self) -> bool {
        matches!(self, Self::CorruptEntry { .. })
    }
}

/// Upstream fetch failures. Each variant carries the detail of the
/// underlying failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("Error loading credentials: {0}")]
    CredentialLoad(String),

    #[error("Error during upstream authentication: {0}")]
    Authentication(String),

    #[error("Error fetching data: {0}")]
    Upstream(String),
}

impl FetchError {
    /// Stable label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::CredentialLoad(_) => "credential_load",
            Self::Authentication(_) => "authentication",
            Self::Upstream(_) => "upstream",
        }
    }

    pub fn detail(&self) -> &str {
        match self {
            Self::CredentialLoad(d) | Self::Authentication(d) | Self::Upstream(d) => d,
        }
    }
}

/// Result projection errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProjectionError {
    #[error("Invalid action: {0}")]
    InvalidAction(String),
}

/// Master error type for all profcache errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProfcacheError {
    #[error("Key error: {0}")]
    Key(#[from] KeyError),

    #[error("{0}")]
    Storage(#[from] StorageError),

    #[error("{0}")]
    Fetch(#[from] FetchError),

    #[error("{0}")]
    Projection(#[from] ProjectionError),
}

/// Result type alias for profcache operations.
pub type ProfcacheResult<T> = Result<T, ProfcacheError>;

/// Result type alias for backend operations.
pub type StorageResult<T> = Result<T, StorageError>;
