//! Service-layer error types
//!
//! This module defines error types specific to the service layer,
//! mapping record, fetch and storage errors to service-level errors.

use package_rot_core::{FetchError, RecordError};
use package_rot_store::{CacheError, StoreError};
use thiserror::Error;

/// Result type alias for service operations
pub type ServiceResult<T> = std::result::Result<T, ServiceError>;

/// Service-layer error types
#[derive(Error, Debug)]
pub enum ServiceError {
    /// A record failed validation
    #[error("Invalid record for {name}: {source}")]
    InvalidRecord {
        name: String,
        #[source]
        source: RecordError,
    },

    /// A registry request failed after all retries
    #[error("Registry unavailable: {0}")]
    Registry(FetchError),

    /// The catalog could not be enumerated
    #[error("Catalog enumeration failed: {0}")]
    Catalog(FetchError),

    /// The record store failed; the crawl cannot continue
    #[error("Storage failure: {0}")]
    Storage(#[from] StoreError),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Internal service error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ServiceError {
    /// Whether the error only concerns a single package
    pub fn is_record_local(&self) -> bool {
        matches!(
            self,
            ServiceError::InvalidRecord { .. } | ServiceError::Registry(_)
        )
    }
}

impl From<CacheError> for ServiceError {
    fn from(err: CacheError) -> Self {
        match err {
            CacheError::Record { name, source } => ServiceError::InvalidRecord { name, source },
            CacheError::Fetch(err) => ServiceError::Registry(err),
            CacheError::Store(err) => ServiceError::Storage(err),
        }
    }
}

impl From<reqwest::Error> for ServiceError {
    fn from(err: reqwest::Error) -> Self {
        ServiceError::Configuration(format!("HTTP client error: {}", err))
    }
}

impl From<url::ParseError> for ServiceError {
    fn from(err: url::ParseError) -> Self {
        ServiceError::Configuration(format!("Invalid URL: {}", err))
    }
}
