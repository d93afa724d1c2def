//! Error types for package-rot
//!
//! `RecordError` covers everything that can go wrong while turning a catalog
//! document into a [`RegistryRecord`](crate::RegistryRecord). `FetchError`
//! covers transport-level failures of the collaborators that talk to the
//! network; those are always transient and never describe the package itself.

use thiserror::Error;

/// Result type alias for record construction
pub type Result<T> = std::result::Result<T, RecordError>;

/// Errors raised while validating a catalog document
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RecordError {
    /// A required field is missing from the document
    #[error("Schema error: missing required field `{field}`")]
    Schema { field: String },

    /// A field is present but has the wrong shape
    #[error("Type mismatch for `{field}`: expected {expected}, found {found}")]
    TypeMismatch {
        field: String,
        expected: String,
        found: String,
    },
}

impl RecordError {
    /// Create a schema error for a missing field
    pub fn missing(field: impl Into<String>) -> Self {
        RecordError::Schema {
            field: field.into(),
        }
    }

    /// Create a type mismatch error
    pub fn mismatch(
        field: impl Into<String>,
        expected: impl Into<String>,
        found: impl Into<String>,
    ) -> Self {
        RecordError::TypeMismatch {
            field: field.into(),
            expected: expected.into(),
            found: found.into(),
        }
    }

    /// Dotted path of the offending field
    pub fn field(&self) -> &str {
        match self {
            RecordError::Schema { field } => field,
            RecordError::TypeMismatch { field, .. } => field,
        }
    }
}

impl From<serde_json::Error> for RecordError {
    fn from(err: serde_json::Error) -> Self {
        RecordError::mismatch("<document>", "JSON document", err.to_string())
    }
}

/// Transient failures of network collaborators
///
/// None of these variants may ever be recorded as a package status.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// The request did not complete before its deadline
    #[error("Request to {target} timed out")]
    Timeout { target: String },

    /// Connection, TLS or body transfer failure
    #[error("Transport failure for {target}: {message}")]
    Transport { target: String, message: String },

    /// The remote asked us to back off (429 or a 5xx gateway status)
    #[error("Registry throttled request for {target} with status {status}")]
    Throttled { target: String, status: u16 },

    /// The response body could not be decoded
    #[error("Malformed response from {target}: {message}")]
    MalformedResponse { target: String, message: String },
}

impl FetchError {
    /// Whether retrying the same request may succeed
    pub fn is_retryable(&self) -> bool {
        !matches!(self, FetchError::MalformedResponse { .. })
    }

    /// The URL or package name the failure relates to
    pub fn target(&self) -> &str {
        match self {
            FetchError::Timeout { target }
            | FetchError::Transport { target, .. }
            | FetchError::Throttled { target, .. }
            | FetchError::MalformedResponse { target, .. } => target,
        }
    }
}
