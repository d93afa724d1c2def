//! Store- and cache-specific error types and conversions
//!
//! `StoreError` describes failures of a persistence backend. `CacheError`
//! is what [`RecordCache`](crate::RecordCache) hands back to callers and
//! separates per-record failures (skip and continue) from storage failures
//! (stop the crawl).

use package_rot_core::{FetchError, RecordError};
use thiserror::Error;

/// Result type alias for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Result type alias for cache lookups
pub type CacheResult<T> = Result<T, CacheError>;

/// Persistence backend errors
#[derive(Debug, Error)]
pub enum StoreError {
    /// Filesystem I/O failed
    #[error("Storage I/O error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// A stored entry exists but cannot be decoded
    #[error("Corrupted cache entry for {key}: {message}")]
    Corrupted { key: String, message: String },

    /// Serialization of an entry failed
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// The key cannot be mapped onto the backend
    #[error("Invalid cache key: {0}")]
    InvalidKey(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl StoreError {
    pub(crate) fn io(path: impl AsRef<std::path::Path>, source: std::io::Error) -> Self {
        StoreError::Io {
            path: path.as_ref().display().to_string(),
            source,
        }
    }

    /// Check if this error describes an unreadable entry rather than a broken backend
    pub fn is_corruption(&self) -> bool {
        matches!(self, StoreError::Corrupted { .. })
    }
}

/// Convert serde_json errors
impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(format!("{}", err))
    }
}

/// Errors returned by a cache lookup
#[derive(Debug, Error)]
pub enum CacheError {
    /// The fetched document failed validation
    #[error("Invalid record for {name}: {source}")]
    Record {
        name: String,
        #[source]
        source: RecordError,
    },

    /// The registry could not be reached; the previous entry was kept
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// The backing store failed
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl CacheError {
    /// Whether the crawl may skip this record and carry on
    pub fn is_record_local(&self) -> bool {
        match self {
            CacheError::Record { .. } | CacheError::Fetch(_) => true,
            CacheError::Store(err) => err.is_corruption() || matches!(err, StoreError::InvalidKey(_)),
        }
    }
}
