//! Perpetual crawl over the registry catalog
//!
//! Each pass enumerates the catalog once and pulls every name through the
//! record cache, which refreshes stale entries from the registry. Problems
//! with a single package are logged and skipped; a failing store ends the
//! run.

use crate::catalog::CatalogEnumerator;
use crate::error::{ServiceError, ServiceResult};
use futures::stream::{self, StreamExt};
use package_rot_store::RecordCache;
use serde::Serialize;
use std::pin::pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};

/// Crawl scheduler configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Packages processed at once
    pub concurrency: usize,

    /// Stop after this many passes; `None` runs until cancelled
    pub max_passes: Option<u64>,

    /// Pause before retrying a pass whose catalog could not be listed
    pub catalog_retry_delay: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            concurrency: 1,
            max_passes: None,
            catalog_retry_delay: Duration::from_secs(60),
        }
    }
}

impl SchedulerConfig {
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_max_passes(mut self, passes: u64) -> Self {
        self.max_passes = Some(passes);
        self
    }

    pub fn with_catalog_retry_delay(mut self, delay: Duration) -> Self {
        self.catalog_retry_delay = delay;
        self
    }
}

/// Counters for one pass over the catalog
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PassReport {
    /// 1-based pass number
    pub pass: u64,

    /// Names listed by the catalog
    pub total: usize,

    /// Names answered from a fresh cache entry
    pub cached: usize,

    /// Names refreshed from the registry
    pub fetched: usize,

    /// Names skipped after a record or fetch failure
    pub skipped: usize,

    /// Whether the pass stopped early
    pub cancelled: bool,
}

impl PassReport {
    /// Names that were attempted before the pass ended
    pub fn processed(&self) -> usize {
        self.cached + self.fetched + self.skipped
    }
}

pub struct CrawlScheduler {
    catalog: Arc<dyn CatalogEnumerator>,
    cache: Arc<RecordCache>,
    config: SchedulerConfig,
    passes_started: AtomicU64,
}

impl CrawlScheduler {
    pub fn new(
        catalog: Arc<dyn CatalogEnumerator>,
        cache: Arc<RecordCache>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            catalog,
            cache,
            config,
            passes_started: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Visit every catalog name once
    #[instrument(skip(self, user_agent, cancel))]
    pub async fn run_pass(
        &self,
        user_agent: &str,
        cancel: &CancellationToken,
    ) -> ServiceResult<PassReport> {
        let pass = self.passes_started.fetch_add(1, Ordering::SeqCst) + 1;

        let names = tokio::select! {
            _ = cancel.cancelled() => {
                return Ok(PassReport { pass, cancelled: true, ..Default::default() });
            }
            listed = self.catalog.list_names(user_agent) => listed.map_err(ServiceError::Catalog)?,
        };

        info!("Pass {} starting over {} packages", pass, names.len());
        let mut report = PassReport {
            pass,
            total: names.len(),
            ..Default::default()
        };

        let cache = &self.cache;
        let mut outcomes = pin!(stream::iter(names)
            .take_until(cancel.cancelled())
            .map(|name| async move {
                let outcome = cache.get(&name, user_agent).await;
                (name, outcome)
            })
            .buffer_unordered(self.config.concurrency.max(1)));

        while let Some((name, outcome)) = outcomes.next().await {
            match outcome {
                Ok(cached) if cached.from_registry() => report.fetched += 1,
                Ok(_) => report.cached += 1,
                Err(err) if err.is_record_local() => {
                    warn!(package = %name, "Skipping package: {}", err);
                    report.skipped += 1;
                }
                Err(err) => {
                    error!(package = %name, "Aborting crawl: {}", err);
                    return Err(err.into());
                }
            }
        }

        report.cancelled = cancel.is_cancelled();
        info!(
            "Pass {} {}: {} fetched, {} cached, {} skipped of {}",
            pass,
            if report.cancelled { "cancelled" } else { "finished" },
            report.fetched,
            report.cached,
            report.skipped,
            report.total
        );
        Ok(report)
    }

    /// Run passes until cancelled or `max_passes` is reached
    ///
    /// Returns the number of passes that ran to completion. A pass whose
    /// catalog listing fails still counts toward `max_passes`.
    pub async fn run(&self, user_agent: &str, cancel: CancellationToken) -> ServiceResult<u64> {
        let mut attempted = 0u64;
        let mut completed = 0u64;

        while !cancel.is_cancelled() {
            if self.config.max_passes.is_some_and(|max| attempted >= max) {
                break;
            }
            attempted += 1;

            match self.run_pass(user_agent, &cancel).await {
                Ok(report) if !report.cancelled => completed += 1,
                Ok(_) => break,
                Err(ServiceError::Catalog(err)) => {
                    warn!(
                        "Catalog unavailable, retrying in {:?}: {}",
                        self.config.catalog_retry_delay, err
                    );
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(self.config.catalog_retry_delay) => {}
                    }
                }
                Err(err) => return Err(err),
            }
        }

        info!("Crawl stopped after {} completed passes", completed);
        Ok(completed)
    }
}
