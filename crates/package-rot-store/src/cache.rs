//! TTL record cache with single-flight refresh
//!
//! [`RecordCache`] hands out [`RegistryRecord`] snapshots no older than the
//! configured TTL. A stale or missing entry is refreshed through a
//! [`RecordSource`]; concurrent callers asking for the same package wait on a
//! per-name lock and re-read the store, so only one of them reaches the
//! registry.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use package_rot_core::{FetchError, RecordOrigin, RegistryRecord};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, warn};

use crate::backend::{RecordStore, StoredRecord};
use crate::clock::Clock;
use crate::error::{CacheError, CacheResult, StoreError};

/// Default TTL for cached records (30 days)
pub const DEFAULT_CACHE_TTL_SECS: u64 = 60 * 60 * 24 * 30;

/// Upstream that produces raw catalog documents
#[async_trait]
pub trait RecordSource: Send + Sync {
    /// Fetch the catalog document for a package.
    ///
    /// Non-200 responses are not errors: they come back as
    /// `{"status": .., "project_name": ..}` documents. Only transport-level
    /// failures are reported as [`FetchError`].
    async fn fetch(&self, name: &str, user_agent: &str) -> Result<serde_json::Value, FetchError>;
}

/// Cache configuration
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum age of an entry before it is refreshed
    pub ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(DEFAULT_CACHE_TTL_SECS),
        }
    }
}

impl CacheConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the TTL
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Set the TTL in whole days
    pub fn with_ttl_days(self, days: u64) -> Self {
        self.with_ttl(Duration::from_secs(days * 24 * 60 * 60))
    }

    fn ttl_delta(&self) -> chrono::Duration {
        chrono::Duration::from_std(self.ttl).unwrap_or(chrono::Duration::MAX)
    }
}

/// A record handed out by the cache
#[derive(Debug, Clone, PartialEq)]
pub struct CachedRecord {
    pub record: RegistryRecord,

    /// When the registry was queried for this snapshot
    pub fetched_at: DateTime<Utc>,

    pub origin: RecordOrigin,
}

impl CachedRecord {
    pub fn from_registry(&self) -> bool {
        self.origin == RecordOrigin::Registry
    }
}

/// Cache statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups answered from the store
    pub hits: u64,

    /// Lookups that found nothing usable
    pub misses: u64,

    /// Requests sent to the registry
    pub fetches: u64,

    /// Stored entries that could not be decoded
    pub corrupted: u64,
}

impl CacheStats {
    /// Calculate hit rate
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    fetches: AtomicU64,
    corrupted: AtomicU64,
}

type KeyLock = Arc<tokio::sync::Mutex<()>>;

/// Outcome of reading one entry from the store
enum Lookup {
    Fresh(CachedRecord),
    Missing,
    Expired(DateTime<Utc>),
    Unreadable(String),
}

/// Package-name keyed record cache
pub struct RecordCache {
    store: Arc<dyn RecordStore>,
    source: Arc<dyn RecordSource>,
    clock: Arc<dyn Clock>,
    config: CacheConfig,
    in_flight: Mutex<HashMap<String, KeyLock>>,
    counters: Counters,
}

impl RecordCache {
    pub fn new(
        store: Arc<dyn RecordStore>,
        source: Arc<dyn RecordSource>,
        clock: Arc<dyn Clock>,
        config: CacheConfig,
    ) -> Self {
        Self {
            store,
            source,
            clock,
            config,
            in_flight: Mutex::new(HashMap::new()),
            counters: Counters::default(),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Return a record no older than the TTL, fetching it if needed.
    ///
    /// `user_agent` identifies us to the registry and is not part of the key.
    pub async fn get(&self, name: &str, user_agent: &str) -> CacheResult<CachedRecord> {
        if let Lookup::Fresh(hit) = self.lookup(name).await? {
            self.counters.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(hit);
        }

        let lock = self.key_lock(name);
        let guard = lock.lock().await;

        // Another caller may have refreshed the entry while we waited
        let result = match self.lookup(name).await {
            Ok(Lookup::Fresh(hit)) => {
                self.counters.hits.fetch_add(1, Ordering::Relaxed);
                Ok(hit)
            }
            Ok(missed) => {
                self.record_miss(name, &missed);
                self.refresh(name, user_agent).await
            }
            Err(e) => Err(e),
        };

        drop(guard);
        self.release_key(name, &lock);
        result
    }

    /// Return the stored record if it is still within the TTL, without fetching
    pub async fn peek(&self, name: &str) -> CacheResult<Option<CachedRecord>> {
        match self.lookup(name).await? {
            Lookup::Fresh(hit) => Ok(Some(hit)),
            _ => Ok(None),
        }
    }

    /// Whether a snapshot taken at `fetched_at` is still usable
    pub fn is_fresh(&self, fetched_at: DateTime<Utc>) -> bool {
        self.clock.now() - fetched_at < self.config.ttl_delta()
    }

    /// Snapshot of the hit/miss counters
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            fetches: self.counters.fetches.load(Ordering::Relaxed),
            corrupted: self.counters.corrupted.load(Ordering::Relaxed),
        }
    }

    async fn lookup(&self, name: &str) -> CacheResult<Lookup> {
        let entry = match self.store.load(name).await {
            Ok(Some(entry)) => entry,
            Ok(None) => return Ok(Lookup::Missing),
            Err(e) if e.is_corruption() => return Ok(Lookup::Unreadable(e.to_string())),
            Err(e) => return Err(e.into()),
        };

        if !self.is_fresh(entry.fetched_at) {
            return Ok(Lookup::Expired(entry.fetched_at));
        }

        match RegistryRecord::from_document(&entry.record) {
            Ok(record) => {
                debug!("Cache HIT: {}", name);
                Ok(Lookup::Fresh(CachedRecord {
                    record,
                    fetched_at: entry.fetched_at,
                    origin: RecordOrigin::Cache,
                }))
            }
            Err(e) => Ok(Lookup::Unreadable(format!(
                "stored record no longer validates: {}",
                e
            ))),
        }
    }

    /// Count and log a lookup that forces a refresh
    fn record_miss(&self, name: &str, lookup: &Lookup) {
        match lookup {
            Lookup::Fresh(_) => return,
            Lookup::Missing => debug!("Cache MISS: {}", name),
            Lookup::Expired(fetched_at) => {
                debug!("Cache EXPIRED: {} (fetched {})", name, fetched_at)
            }
            Lookup::Unreadable(reason) => {
                warn!("Ignoring unreadable cache entry for {}: {}", name, reason);
                self.counters.corrupted.fetch_add(1, Ordering::Relaxed);
            }
        }
        self.counters.misses.fetch_add(1, Ordering::Relaxed);
    }

    async fn refresh(&self, name: &str, user_agent: &str) -> CacheResult<CachedRecord> {
        self.counters.fetches.fetch_add(1, Ordering::Relaxed);

        // A transport failure returns here and leaves any previous entry alone
        let document = self.source.fetch(name, user_agent).await?;

        let record =
            RegistryRecord::from_document(&document).map_err(|source| CacheError::Record {
                name: name.to_string(),
                source,
            })?;

        let fetched_at = self.clock.now();
        let encoded = record.to_document().map_err(StoreError::from)?;
        let entry = StoredRecord::new(fetched_at, encoded);
        self.store.save(name, &entry).await?;

        debug!("Cache SET: {} (status {})", name, record.fetch_status);
        Ok(CachedRecord {
            record,
            fetched_at,
            origin: RecordOrigin::Registry,
        })
    }

    fn key_lock(&self, name: &str) -> KeyLock {
        let mut in_flight = self
            .in_flight
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        in_flight
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }

    fn release_key(&self, name: &str, lock: &KeyLock) {
        let mut in_flight = self
            .in_flight
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        // Only the map and this caller hold the lock: nobody is waiting on it
        if Arc::strong_count(lock) <= 2 {
            in_flight.remove(name);
        }
    }

    #[cfg(test)]
    fn in_flight_len(&self) -> usize {
        self.in_flight
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }
}
