//! URL and email probes used by the liveness classifier
//!
//! Probes never fail: every network problem collapses into an invalid
//! verdict, with timeouts flagged separately so callers can tell a slow host
//! from a dead one.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::header::USER_AGENT;
use reqwest::redirect::Policy;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Default deadline for a single probe
pub const DEFAULT_PROBE_TIMEOUT_SECS: u64 = 5;

const MAX_REDIRECTS: usize = 10;

static EMAIL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^[A-Za-z0-9.!#$%&'*+/=?^_`{|}~-]+@[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?(?:\.[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?)+$",
    )
    .expect("email pattern is valid")
});

/// Outcome of probing one URL
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct UrlVerdict {
    pub valid: bool,
    pub status: Option<u16>,
    pub timed_out: bool,
}

impl UrlVerdict {
    /// Rejected without contacting anything, or unreachable
    pub fn invalid() -> Self {
        Self {
            valid: false,
            status: None,
            timed_out: false,
        }
    }

    pub fn timed_out() -> Self {
        Self {
            timed_out: true,
            ..Self::invalid()
        }
    }

    /// The host answered; only 2xx counts as working
    pub fn answered(status: u16) -> Self {
        Self {
            valid: (200..300).contains(&status),
            status: Some(status),
            timed_out: false,
        }
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UrlProbe: Send + Sync {
    async fn probe(&self, url: &str, user_agent: &str) -> UrlVerdict;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EmailProbe: Send + Sync {
    /// Whether the address is well formed and its domain resolves
    async fn validate(&self, email: &str, user_agent: &str) -> bool;
}

/// Parse a candidate and keep it only if it is an absolute http(s) URL with a host
pub fn parse_http_url(raw: &str) -> Option<Url> {
    let url = Url::parse(raw.trim()).ok()?;
    match url.scheme() {
        "http" | "https" if url.host_str().is_some_and(|h| !h.is_empty()) => Some(url),
        _ => None,
    }
}

/// Probes URLs with `HEAD`, falling back to `GET` when the server refuses `HEAD`
#[derive(Debug, Clone)]
pub struct HttpUrlProbe {
    client: reqwest::Client,
}

impl HttpUrlProbe {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(Policy::limited(MAX_REDIRECTS))
            .build()?;
        Ok(Self { client })
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> UrlVerdict {
        match request.send().await {
            Ok(response) => UrlVerdict::answered(response.status().as_u16()),
            Err(err) if err.is_timeout() => UrlVerdict::timed_out(),
            Err(err) => {
                debug!("Probe failed: {}", err);
                UrlVerdict::invalid()
            }
        }
    }
}

#[async_trait]
impl UrlProbe for HttpUrlProbe {
    async fn probe(&self, url: &str, user_agent: &str) -> UrlVerdict {
        let Some(parsed) = parse_http_url(url) else {
            return UrlVerdict::invalid();
        };

        let verdict = self
            .send(self.client.head(parsed.clone()).header(USER_AGENT, user_agent))
            .await;
        match verdict.status {
            Some(405) | Some(501) => {
                self.send(self.client.get(parsed).header(USER_AGENT, user_agent))
                    .await
            }
            _ => verdict,
        }
    }
}

/// Split a free-form contact field into individual addresses
///
/// Handles `a@x.org, b@y.org` lists and `Name <a@x.org>` forms.
pub fn email_candidates(raw: &str) -> Vec<String> {
    raw.split([',', ';'])
        .filter_map(|part| {
            let part = part.trim();
            let address = match (part.find('<'), part.rfind('>')) {
                (Some(start), Some(end)) if start < end => &part[start + 1..end],
                _ => part,
            };
            let address = address.trim();
            (!address.is_empty()).then(|| address.to_string())
        })
        .collect()
}

/// Whether a single address is syntactically valid
pub fn is_valid_email_syntax(address: &str) -> bool {
    address.len() <= 254 && EMAIL_PATTERN.is_match(address)
}

fn email_domain(address: &str) -> Option<&str> {
    address.rsplit_once('@').map(|(_, domain)| domain)
}

/// Validates addresses by syntax and, optionally, by resolving their domain
#[derive(Debug, Clone)]
pub struct DnsEmailProbe {
    timeout: Duration,
    check_deliverability: bool,
}

impl Default for DnsEmailProbe {
    fn default() -> Self {
        Self::new(Duration::from_secs(DEFAULT_PROBE_TIMEOUT_SECS))
    }
}

impl DnsEmailProbe {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            check_deliverability: true,
        }
    }

    /// Syntax checks only; no network lookups
    pub fn syntax_only() -> Self {
        Self {
            check_deliverability: false,
            ..Default::default()
        }
    }

    async fn domain_resolves(&self, domain: &str) -> bool {
        match tokio::time::timeout(self.timeout, tokio::net::lookup_host((domain, 25))).await {
            Ok(Ok(mut addrs)) => addrs.next().is_some(),
            Ok(Err(err)) => {
                debug!("Domain {} does not resolve: {}", domain, err);
                false
            }
            Err(_) => {
                debug!("Lookup of {} timed out", domain);
                false
            }
        }
    }

    async fn validate_address(&self, address: &str) -> bool {
        if !is_valid_email_syntax(address) {
            return false;
        }
        if !self.check_deliverability {
            return true;
        }
        match email_domain(address) {
            Some(domain) => self.domain_resolves(domain).await,
            None => false,
        }
    }
}

#[async_trait]
impl EmailProbe for DnsEmailProbe {
    async fn validate(&self, email: &str, _user_agent: &str) -> bool {
        for address in email_candidates(email) {
            if self.validate_address(&address).await {
                return true;
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_verdict_only_2xx_is_valid() {
        assert!(UrlVerdict::answered(200).valid);
        assert!(UrlVerdict::answered(204).valid);
        assert!(!UrlVerdict::answered(301).valid);
        assert!(!UrlVerdict::answered(404).valid);
        assert!(!UrlVerdict::answered(500).valid);
        assert!(UrlVerdict::timed_out().timed_out);
        assert!(!UrlVerdict::timed_out().valid);
    }

    #[test]
    fn test_parse_http_url() {
        assert!(parse_http_url("https://example.org/x").is_some());
        assert!(parse_http_url(" http://example.org ").is_some());
        assert!(parse_http_url("ftp://example.org").is_none());
        assert!(parse_http_url("mailto:a@example.org").is_none());
        assert!(parse_http_url("not a url").is_none());
        assert!(parse_http_url("").is_none());
    }

    #[tokio::test]
    async fn test_malformed_url_is_invalid_without_request() {
        let probe = HttpUrlProbe::new(Duration::from_secs(1)).unwrap();
        assert_eq!(
            probe.probe("javascript:alert(1)", "ua").await,
            UrlVerdict::invalid()
        );
        assert_eq!(probe.probe("UNKNOWN", "ua").await, UrlVerdict::invalid());
    }

    #[test]
    fn test_email_candidates() {
        assert_eq!(
            email_candidates("Jane Doe <jane@example.org>, bob@example.com"),
            vec!["jane@example.org", "bob@example.com"]
        );
        assert_eq!(email_candidates("  "), Vec::<String>::new());
        assert_eq!(email_candidates("a@x.io;b@y.io"), vec!["a@x.io", "b@y.io"]);
    }

    #[test]
    fn test_email_syntax() {
        assert!(is_valid_email_syntax("jane@example.org"));
        assert!(is_valid_email_syntax("first.last+tag@sub.example.co.uk"));
        assert!(!is_valid_email_syntax("jane"));
        assert!(!is_valid_email_syntax("jane@localhost"));
        assert!(!is_valid_email_syntax("jane@@example.org"));
        assert!(!is_valid_email_syntax("jane @example.org"));
        assert!(!is_valid_email_syntax("UNKNOWN"));
    }

    #[tokio::test]
    async fn test_syntax_only_probe() {
        let probe = DnsEmailProbe::syntax_only();
        assert!(probe.validate("Jane <jane@example.org>", "ua").await);
        assert!(!probe.validate("not an address", "ua").await);
        assert!(!probe.validate("", "ua").await);
    }
}
