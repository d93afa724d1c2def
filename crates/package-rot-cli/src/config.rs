//! Crawler configuration
//!
//! This module handles hierarchical configuration loading from multiple sources:
//! - Default configuration file
//! - Environment-specific configuration file
//! - Environment variables
//! - Command-line arguments

use config::{Config, ConfigError, Environment, File};
use package_rot_service::{
    RegistryConfig, RetryPolicy, SchedulerConfig, ServicesConfig, DEFAULT_REGISTRY_URL,
};
use package_rot_store::{CacheConfig, DEFAULT_CACHE_TTL_SECS};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Registry client settings
    #[serde(default)]
    pub registry: RegistrySettings,

    /// Record cache settings
    #[serde(default)]
    pub cache: CacheSettings,

    /// Crawl settings
    #[serde(default)]
    pub crawler: CrawlerSettings,

    /// URL and email probe settings
    #[serde(default)]
    pub probe: ProbeSettings,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Registry client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrySettings {
    /// Base URL of the registry
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Per-request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub timeout_seconds: u64,

    /// Timeout for the catalog listing in seconds
    #[serde(default = "default_catalog_timeout")]
    pub catalog_timeout_seconds: u64,

    /// Minimum spacing between registry requests in milliseconds
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,

    /// Attempts per request, including the first
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,

    /// Backoff before the first retry in milliseconds
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
}

fn default_base_url() -> String {
    DEFAULT_REGISTRY_URL.to_string()
}

fn default_request_timeout() -> u64 {
    5
}

fn default_catalog_timeout() -> u64 {
    60
}

fn default_delay_ms() -> u64 {
    500
}

fn default_retry_attempts() -> u32 {
    3
}

fn default_retry_backoff_ms() -> u64 {
    1000
}

fn default_true() -> bool {
    true
}

impl Default for RegistrySettings {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_seconds: default_request_timeout(),
            catalog_timeout_seconds: default_catalog_timeout(),
            delay_ms: default_delay_ms(),
            retry_attempts: default_retry_attempts(),
            retry_backoff_ms: default_retry_backoff_ms(),
        }
    }
}

/// Record cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheSettings {
    /// Root directory of the on-disk cache
    #[serde(default = "default_cache_dir")]
    pub dir: PathBuf,

    /// Entry lifetime in days
    #[serde(default = "default_ttl_days")]
    pub ttl_days: u64,
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from("cache")
}

fn default_ttl_days() -> u64 {
    DEFAULT_CACHE_TTL_SECS / (24 * 60 * 60)
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            dir: default_cache_dir(),
            ttl_days: default_ttl_days(),
        }
    }
}

/// Crawl configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlerSettings {
    /// Packages processed at once
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Stop after this many passes
    #[serde(default)]
    pub max_passes: Option<u64>,

    /// Pause before retrying an unavailable catalog, in seconds
    #[serde(default = "default_catalog_retry")]
    pub catalog_retry_seconds: u64,
}

fn default_concurrency() -> usize {
    1
}

fn default_catalog_retry() -> u64 {
    60
}

impl Default for CrawlerSettings {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            max_passes: None,
            catalog_retry_seconds: default_catalog_retry(),
        }
    }
}

/// Probe configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeSettings {
    /// Deadline for each URL probe and DNS lookup, in seconds
    #[serde(default = "default_request_timeout")]
    pub timeout_seconds: u64,

    /// Resolve email domains in addition to checking syntax
    #[serde(default = "default_true")]
    pub check_email_deliverability: bool,
}

impl Default for ProbeSettings {
    fn default() -> Self {
        Self {
            timeout_seconds: default_request_timeout(),
            check_email_deliverability: true,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Use JSON formatting
    #[serde(default)]
    pub json_format: bool,

    /// Include thread IDs
    #[serde(default)]
    pub include_thread_ids: bool,

    /// Include target module
    #[serde(default = "default_true")]
    pub include_target: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json_format: false,
            include_thread_ids: false,
            include_target: true,
        }
    }
}

impl AppConfig {
    /// Load configuration from files and environment
    ///
    /// Configuration is loaded in the following order (later sources override earlier):
    /// 1. Default configuration file (config/default.toml)
    /// 2. Environment-specific file (config/{env}.toml)
    /// 3. Environment variables (PACKAGE_ROT_*)
    pub fn load(config_dir: impl Into<PathBuf>, environment: &str) -> Result<Self, ConfigError> {
        let config_dir = config_dir.into();

        let config = Config::builder()
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            .add_source(File::from(config_dir.join(format!("{}.toml", environment))).required(false))
            // e.g. PACKAGE_ROT_CRAWLER__CONCURRENCY=4
            .add_source(
                Environment::with_prefix("PACKAGE_ROT")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Load configuration with defaults if files don't exist
    pub fn load_or_default(config_dir: impl Into<PathBuf>, environment: &str) -> Self {
        Self::load(config_dir, environment).unwrap_or_else(|e| {
            eprintln!("Warning: Failed to load configuration: {}", e);
            eprintln!("Using default configuration");
            Self::default()
        })
    }

    /// Settings for the service layer
    pub fn services_config(&self) -> ServicesConfig {
        let retry = RetryPolicy::default()
            .with_max_attempts(self.registry.retry_attempts)
            .with_initial_backoff(Duration::from_millis(self.registry.retry_backoff_ms));

        let mut scheduler = SchedulerConfig::default()
            .with_concurrency(self.crawler.concurrency)
            .with_catalog_retry_delay(Duration::from_secs(self.crawler.catalog_retry_seconds));
        scheduler.max_passes = self.crawler.max_passes;

        ServicesConfig {
            registry: RegistryConfig::new(self.registry.base_url.clone())
                .with_timeout(Duration::from_secs(self.registry.timeout_seconds))
                .with_retry(retry),
            courtesy_delay: Duration::from_millis(self.registry.delay_ms),
            catalog_timeout: Duration::from_secs(self.registry.catalog_timeout_seconds),
            cache: CacheConfig::new().with_ttl_days(self.cache.ttl_days),
            scheduler,
            probe_timeout: Duration::from_secs(self.probe.timeout_seconds),
            check_email_deliverability: self.probe.check_email_deliverability,
        }
    }
}
