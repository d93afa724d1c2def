//! Record persistence and caching for package-rot
//!
//! This crate provides:
//! - the [`RecordStore`] trait with a filesystem backend (atomic
//!   write-then-rename, one JSON document per package) and an in-memory
//!   backend
//! - the [`Clock`] abstraction used for every expiry decision
//! - [`RecordCache`], a TTL cache that refreshes through a [`RecordSource`]
//!   and collapses concurrent refreshes of the same package into one fetch
//!
//! # Example
//!
//! ```rust,no_run
//! use package_rot_store::{CacheConfig, FileSystemStore, RecordCache, RecordSource, SystemClock};
//! use std::sync::Arc;
//!
//! # async fn example(source: Arc<dyn RecordSource>) -> Result<(), Box<dyn std::error::Error>> {
//! let cache = RecordCache::new(
//!     Arc::new(FileSystemStore::new("/var/cache/package-rot")),
//!     source,
//!     Arc::new(SystemClock),
//!     CacheConfig::default(),
//! );
//!
//! let cached = cache.get("requests", "package-rot/0.1.0 (ops@example.org)").await?;
//! println!("{} -> {}", cached.record.name, cached.record.fetch_status);
//! # Ok(())
//! # }
//! ```

// Re-export core domain types for convenience
pub use package_rot_core;

pub mod backend;
pub mod cache;
pub mod clock;
pub mod error;

pub use backend::{FileSystemStore, MemoryStore, RecordStore, StoredRecord};
pub use cache::{
    CacheConfig, CacheStats, CachedRecord, RecordCache, RecordSource, DEFAULT_CACHE_TTL_SECS,
};
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{CacheError, CacheResult, StoreError, StoreResult};
