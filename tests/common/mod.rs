//! Common test utilities and helpers
//!
//! This module provides a mock registry served by wiremock, deterministic
//! probes, and a helper that wires the services against them.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use package_rot_service::{
    EmailProbe, RegistryConfig, RetryPolicy, SchedulerConfig, Services, ServicesBuilder,
    ServicesConfig, UrlProbe, UrlVerdict,
};
use package_rot_store::{ManualClock, RecordStore};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub mod fixtures;

pub const TEST_USER_AGENT: &str = "package-rot/0.1.0 (tests@example.org)";

/// Fixed "now" for clock-driven tests
pub fn test_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
}

/// Retry policy that does not slow tests down
pub fn fast_retry() -> RetryPolicy {
    RetryPolicy::default()
        .with_initial_backoff(Duration::from_millis(5))
        .with_max_backoff(Duration::from_millis(20))
}

/// A wiremock server playing the registry
pub struct TestRegistry {
    pub server: MockServer,
}

impl TestRegistry {
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    pub fn uri(&self) -> String {
        self.server.uri()
    }

    pub fn project_path(name: &str) -> String {
        format!("/pypi/{}/json", name)
    }

    /// Serve a project document, expecting exactly `hits` requests
    pub async fn mount_project(&self, name: &str, body: Value, hits: u64) {
        Mock::given(method("GET"))
            .and(path(Self::project_path(name)))
            .and(header("accept", "application/json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .expect(hits)
            .mount(&self.server)
            .await;
    }

    /// Answer a project with a bare status
    pub async fn mount_status(&self, name: &str, status: u16, hits: u64) {
        Mock::given(method("GET"))
            .and(path(Self::project_path(name)))
            .respond_with(ResponseTemplate::new(status))
            .expect(hits)
            .mount(&self.server)
            .await;
    }

    /// Serve the JSON simple index
    pub async fn mount_simple_index(&self, names: &[&str]) {
        Mock::given(method("GET"))
            .and(path("/simple/"))
            .and(header("accept", "application/vnd.pypi.simple.v1+json"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(fixtures::simple_index_document(names)),
            )
            .mount(&self.server)
            .await;
    }
}

/// URL probe that accepts a fixed set of URLs
#[derive(Default)]
pub struct FixedUrlProbe {
    working: HashSet<String>,
    calls: AtomicUsize,
}

impl FixedUrlProbe {
    pub fn accepting<I, S>(urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            working: urls.into_iter().map(Into::into).collect(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl UrlProbe for FixedUrlProbe {
    async fn probe(&self, url: &str, _user_agent: &str) -> UrlVerdict {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.working.contains(url) {
            UrlVerdict::answered(200)
        } else {
            UrlVerdict::answered(404)
        }
    }
}

/// Email probe that accepts a fixed set of addresses
#[derive(Default)]
pub struct FixedEmailProbe {
    valid: HashSet<String>,
}

impl FixedEmailProbe {
    pub fn accepting(addresses: &[&str]) -> Self {
        Self {
            valid: addresses.iter().map(|a| a.to_string()).collect(),
        }
    }
}

#[async_trait]
impl EmailProbe for FixedEmailProbe {
    async fn validate(&self, email: &str, _user_agent: &str) -> bool {
        self.valid.contains(email)
    }
}

/// Service configuration pointed at a test registry, with no courtesy delay
pub fn test_services_config(registry_uri: &str) -> ServicesConfig {
    ServicesConfig {
        registry: RegistryConfig::new(registry_uri)
            .with_timeout(Duration::from_secs(2))
            .with_retry(fast_retry()),
        courtesy_delay: Duration::ZERO,
        catalog_timeout: Duration::from_secs(2),
        scheduler: SchedulerConfig::default().with_catalog_retry_delay(Duration::from_millis(10)),
        ..Default::default()
    }
}

/// Services against a test registry with deterministic probes and clock
pub fn test_services(
    registry: &TestRegistry,
    store: Arc<dyn RecordStore>,
    clock: Arc<ManualClock>,
    url_probe: Arc<dyn UrlProbe>,
    email_probe: Arc<dyn EmailProbe>,
) -> Services {
    ServicesBuilder::new()
        .config(test_services_config(&registry.uri()))
        .store(store)
        .clock(clock)
        .url_probe(url_probe)
        .email_probe(email_probe)
        .build()
        .expect("Failed to build services")
}
