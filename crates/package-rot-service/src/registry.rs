//! Registry metadata client
//!
//! Fetches `GET {base}/pypi/{name}/json` and hands the raw document to the
//! record cache. Successful bodies get `project_name` and `status: 200`
//! injected; non-transient error statuses become a `{status, project_name}`
//! document so the package is cached and classified as dead. Throttling
//! statuses, timeouts and transport failures are retried and never recorded.

use crate::error::ServiceResult;
use crate::retry::RetryPolicy;
use crate::throttle::CourtesyDelay;
use async_trait::async_trait;
use package_rot_core::{FetchError, RegistryRecord, STATUS_OK};
use package_rot_store::RecordSource;
use reqwest::header::{ACCEPT, USER_AGENT};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument};

/// Default registry location
pub const DEFAULT_REGISTRY_URL: &str = "https://pypi.org";

/// Statuses that mean "back off and try again" rather than "package gone"
const THROTTLE_STATUSES: [u16; 4] = [429, 502, 503, 504];

pub(crate) fn is_throttle_status(status: u16) -> bool {
    THROTTLE_STATUSES.contains(&status)
}

/// Map a reqwest failure onto the transient error taxonomy
pub(crate) fn fetch_error(target: &str, err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        FetchError::Timeout {
            target: target.to_string(),
        }
    } else if err.is_decode() {
        FetchError::MalformedResponse {
            target: target.to_string(),
            message: err.to_string(),
        }
    } else {
        FetchError::Transport {
            target: target.to_string(),
            message: err.to_string(),
        }
    }
}

/// Registry client configuration
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Base URL, without the `/pypi` suffix
    pub base_url: String,

    /// Deadline for each request
    pub timeout: Duration,

    /// Retry policy for transient failures
    pub retry: RetryPolicy,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_REGISTRY_URL.to_string(),
            timeout: Duration::from_secs(5),
            retry: RetryPolicy::default(),
        }
    }
}

impl RegistryConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

/// HTTP client for the registry's per-project JSON endpoint
#[derive(Debug, Clone)]
pub struct RegistryClient {
    client: reqwest::Client,
    config: RegistryConfig,
    throttle: Arc<CourtesyDelay>,
}

impl RegistryClient {
    /// Create a client with its own courtesy delay
    pub fn new(config: RegistryConfig, throttle: CourtesyDelay) -> ServiceResult<Self> {
        Self::with_shared_throttle(config, Arc::new(throttle))
    }

    /// Create a client that shares its courtesy delay with other registry callers
    pub fn with_shared_throttle(
        config: RegistryConfig,
        throttle: Arc<CourtesyDelay>,
    ) -> ServiceResult<Self> {
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            client,
            config,
            throttle,
        })
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// The metadata URL for a package
    pub fn project_url(&self, name: &str) -> String {
        format!(
            "{}/pypi/{}/json",
            self.config.base_url.trim_end_matches('/'),
            name
        )
    }

    async fn fetch_once(&self, name: &str, url: &str, user_agent: &str) -> Result<Value, FetchError> {
        self.throttle.wait().await;

        let response = self
            .client
            .get(url)
            .header(USER_AGENT, user_agent)
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| fetch_error(url, e))?;

        let status = response.status().as_u16();
        if is_throttle_status(status) {
            return Err(FetchError::Throttled {
                target: url.to_string(),
                status,
            });
        }
        if status != STATUS_OK {
            debug!("Registry answered {} for {}", status, name);
            return Ok(RegistryRecord::status_document(name, status));
        }

        let mut document: Value = response.json().await.map_err(|e| fetch_error(url, e))?;
        let object = document
            .as_object_mut()
            .ok_or_else(|| FetchError::MalformedResponse {
                target: url.to_string(),
                message: "expected a JSON object".to_string(),
            })?;
        object.insert("project_name".to_string(), Value::from(name));
        object.insert("status".to_string(), Value::from(STATUS_OK));

        Ok(document)
    }
}

#[async_trait]
impl RecordSource for RegistryClient {
    #[instrument(skip(self, user_agent))]
    async fn fetch(&self, name: &str, user_agent: &str) -> Result<Value, FetchError> {
        let url = self.project_url(name);
        self.config
            .retry
            .run(&url, || self.fetch_once(name, &url, user_agent))
            .await
    }
}
