//! Core domain models for package-rot
//!
//! This crate turns raw registry catalog documents into typed, immutable
//! [`RegistryRecord`] snapshots and exposes the read-only queries the
//! liveness classifier is built on. It performs no I/O.

mod document;

pub mod error;
pub mod info;
pub mod record;
pub mod release;
pub mod types;

// Re-exports for convenience
pub use error::{FetchError, RecordError, Result};
pub use info::Info;
pub use record::{extract_urls, RegistryRecord, STATUS_OK};
pub use release::{parse_timestamp, Release, ReleaseArtifact, Releases};
pub use types::{Liveness, RecordOrigin};
