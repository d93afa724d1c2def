//! Package name enumeration

use crate::registry::{fetch_error, is_throttle_status, DEFAULT_REGISTRY_URL};
use crate::retry::RetryPolicy;
use crate::throttle::CourtesyDelay;
use async_trait::async_trait;
use package_rot_core::{FetchError, STATUS_OK};
use reqwest::header::{ACCEPT, USER_AGENT};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument};

/// Media type of the JSON simple index
pub const SIMPLE_INDEX_JSON: &str = "application/vnd.pypi.simple.v1+json";

/// Source of the package names a crawl pass visits
#[async_trait]
pub trait CatalogEnumerator: Send + Sync {
    /// Every package name, in catalog order
    async fn list_names(&self, user_agent: &str) -> Result<Vec<String>, FetchError>;
}

#[derive(Debug, Deserialize)]
struct SimpleIndex {
    projects: Vec<SimpleProject>,
}

#[derive(Debug, Deserialize)]
struct SimpleProject {
    name: String,
}

/// Reads the registry's JSON simple index
#[derive(Debug, Clone)]
pub struct SimpleIndexCatalog {
    client: reqwest::Client,
    base_url: String,
    retry: RetryPolicy,
    throttle: Arc<CourtesyDelay>,
}

impl SimpleIndexCatalog {
    pub fn new(
        base_url: impl Into<String>,
        timeout: Duration,
        retry: RetryPolicy,
        throttle: Arc<CourtesyDelay>,
    ) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: reqwest::Client::builder().timeout(timeout).build()?,
            base_url: base_url.into(),
            retry,
            throttle,
        })
    }

    /// Catalog of the public registry with default settings
    pub fn public() -> Result<Self, reqwest::Error> {
        Self::new(
            DEFAULT_REGISTRY_URL,
            Duration::from_secs(60),
            RetryPolicy::default(),
            Arc::new(CourtesyDelay::default()),
        )
    }

    pub fn index_url(&self) -> String {
        format!("{}/simple/", self.base_url.trim_end_matches('/'))
    }

    async fn list_once(&self, url: &str, user_agent: &str) -> Result<Vec<String>, FetchError> {
        self.throttle.wait().await;

        let response = self
            .client
            .get(url)
            .header(USER_AGENT, user_agent)
            .header(ACCEPT, SIMPLE_INDEX_JSON)
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
            return Err(FetchError::Transport {
                target: url.to_string(),
                message: format!("unexpected status {}", status),
            });
        }

        let index: SimpleIndex = response.json().await.map_err(|e| fetch_error(url, e))?;
        Ok(index.projects.into_iter().map(|p| p.name).collect())
    }
}

#[async_trait]
impl CatalogEnumerator for SimpleIndexCatalog {
    #[instrument(skip(self, user_agent))]
    async fn list_names(&self, user_agent: &str) -> Result<Vec<String>, FetchError> {
        let url = self.index_url();
        let names = self
            .retry
            .run(&url, || self.list_once(&url, user_agent))
            .await?;
        info!("Catalog lists {} packages", names.len());
        Ok(names)
    }
}

/// A fixed list of names, for targeted runs and tests
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    names: Vec<String>,
}

impl StaticCatalog {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }
}

#[async_trait]
impl CatalogEnumerator for StaticCatalog {
    async fn list_names(&self, _user_agent: &str) -> Result<Vec<String>, FetchError> {
        Ok(self.names.clone())
    }
}
