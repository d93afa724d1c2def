//! Service layer for package-rot
//!
//! This crate wires the record cache to its network collaborators and runs
//! the liveness logic on top of it.
//!
//! # Architecture
//!
//! - **RegistryClient**: fetches per-package JSON from the registry, with
//!   retries and a shared courtesy delay
//! - **CatalogEnumerator**: lists the package names a crawl pass visits
//! - **UrlProbe / EmailProbe**: reachability checks used by the classifier
//! - **LivenessClassifier**: dead / seems-dead / should-be-terminated
//! - **CrawlScheduler**: perpetual, cancellable crawl over the catalog
//!
//! # Example
//!
//! ```rust,no_run
//! use package_rot_service::{user_agent, ServicesBuilder};
//! use package_rot_store::FileSystemStore;
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let services = ServicesBuilder::new()
//!     .store(Arc::new(FileSystemStore::new("/var/cache/package-rot")))
//!     .build()?;
//!
//! let agent = user_agent("ops@example.org");
//! let cached = services.cache.get("requests", &agent).await?;
//! let report = services.classifier.classify(&cached.record, &agent).await;
//! println!("{} is {}", report.name, report.verdict);
//!
//! services.scheduler.run(&agent, CancellationToken::new()).await?;
//! # Ok(())
//! # }
//! ```

pub mod catalog;
pub mod classifier;
pub mod error;
pub mod probe;
pub mod registry;
pub mod retry;
pub mod scheduler;
pub mod throttle;

pub use catalog::{CatalogEnumerator, SimpleIndexCatalog, StaticCatalog};
pub use classifier::{
    looks_unmaintained, working_url_rate, LivenessClassifier, LivenessReport, UrlEvidence,
};
pub use error::{ServiceError, ServiceResult};
pub use probe::{
    is_valid_email_syntax, DnsEmailProbe, EmailProbe, HttpUrlProbe, UrlProbe, UrlVerdict,
};
pub use registry::{RegistryClient, RegistryConfig, DEFAULT_REGISTRY_URL};
pub use retry::RetryPolicy;
pub use scheduler::{CrawlScheduler, PassReport, SchedulerConfig};
pub use throttle::CourtesyDelay;

use package_rot_store::{
    CacheConfig, Clock, MemoryStore, RecordCache, RecordSource, RecordStore, SystemClock,
};
use std::sync::Arc;
use std::time::Duration;

/// Identity sent with every outbound request
pub fn user_agent(contact_email: &str) -> String {
    format!(
        "package-rot/{} ({})",
        env!("CARGO_PKG_VERSION"),
        contact_email
    )
}

/// Settings for the default collaborators
#[derive(Debug, Clone)]
pub struct ServicesConfig {
    pub registry: RegistryConfig,
    pub courtesy_delay: Duration,
    pub catalog_timeout: Duration,
    pub cache: CacheConfig,
    pub scheduler: SchedulerConfig,
    pub probe_timeout: Duration,
    pub check_email_deliverability: bool,
}

impl Default for ServicesConfig {
    fn default() -> Self {
        Self {
            registry: RegistryConfig::default(),
            courtesy_delay: CourtesyDelay::default().interval(),
            catalog_timeout: Duration::from_secs(60),
            cache: CacheConfig::default(),
            scheduler: SchedulerConfig::default(),
            probe_timeout: Duration::from_secs(probe::DEFAULT_PROBE_TIMEOUT_SECS),
            check_email_deliverability: true,
        }
    }
}

/// The assembled services, sharing one cache
#[derive(Clone)]
pub struct Services {
    pub cache: Arc<RecordCache>,
    pub classifier: Arc<LivenessClassifier>,
    pub scheduler: Arc<CrawlScheduler>,
}

/// Builder for [`Services`]; any collaborator left unset gets its default
/// implementation
#[derive(Default)]
pub struct ServicesBuilder {
    config: ServicesConfig,
    store: Option<Arc<dyn RecordStore>>,
    source: Option<Arc<dyn RecordSource>>,
    catalog: Option<Arc<dyn CatalogEnumerator>>,
    url_probe: Option<Arc<dyn UrlProbe>>,
    email_probe: Option<Arc<dyn EmailProbe>>,
    clock: Option<Arc<dyn Clock>>,
}

impl ServicesBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(mut self, config: ServicesConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the record store (defaults to an in-memory store)
    pub fn store(mut self, store: Arc<dyn RecordStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Set the registry source (defaults to [`RegistryClient`])
    pub fn source(mut self, source: Arc<dyn RecordSource>) -> Self {
        self.source = Some(source);
        self
    }

    pub fn catalog(mut self, catalog: Arc<dyn CatalogEnumerator>) -> Self {
        self.catalog = Some(catalog);
        self
    }

    pub fn url_probe(mut self, probe: Arc<dyn UrlProbe>) -> Self {
        self.url_probe = Some(probe);
        self
    }

    pub fn email_probe(mut self, probe: Arc<dyn EmailProbe>) -> Self {
        self.email_probe = Some(probe);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Build the services
    ///
    /// The default registry client and catalog share one courtesy delay.
    pub fn build(self) -> ServiceResult<Services> {
        let config = self.config;
        let throttle = Arc::new(CourtesyDelay::new(config.courtesy_delay));

        let store = self.store.unwrap_or_else(|| Arc::new(MemoryStore::new()));
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));

        let source: Arc<dyn RecordSource> = match self.source {
            Some(source) => source,
            None => Arc::new(RegistryClient::with_shared_throttle(
                config.registry.clone(),
                throttle.clone(),
            )?),
        };

        let catalog: Arc<dyn CatalogEnumerator> = match self.catalog {
            Some(catalog) => catalog,
            None => Arc::new(SimpleIndexCatalog::new(
                config.registry.base_url.clone(),
                config.catalog_timeout,
                config.registry.retry.clone(),
                throttle,
            )?),
        };

        let url_probe: Arc<dyn UrlProbe> = match self.url_probe {
            Some(probe) => probe,
            None => Arc::new(HttpUrlProbe::new(config.probe_timeout)?),
        };

        let email_probe: Arc<dyn EmailProbe> = match self.email_probe {
            Some(probe) => probe,
            None if config.check_email_deliverability => {
                Arc::new(DnsEmailProbe::new(config.probe_timeout))
            }
            None => Arc::new(DnsEmailProbe::syntax_only()),
        };

        let cache = Arc::new(RecordCache::new(store, source, clock.clone(), config.cache));
        let classifier = Arc::new(LivenessClassifier::new(url_probe, email_probe, clock));
        let scheduler = Arc::new(CrawlScheduler::new(catalog, cache.clone(), config.scheduler));

        Ok(Services {
            cache,
            classifier,
            scheduler,
        })
    }
}
