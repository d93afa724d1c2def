//! Liveness classification
//!
//! Verdicts escalate from [`Liveness::Alive`] to [`Liveness::Dead`]:
//!
//! - **dead**: the registry did not return the package, the project is
//!   yanked, or it has never shipped a file
//! - **seems dead**: few of its links work, it barely describes itself, and
//!   its last upload is more than a year old
//! - **should be terminated**: dead, or seems dead with no reachable
//!   maintainer address
//!
//! The gates are evaluated cheapest first; URLs are only probed when the
//! text and age gates leave the answer open.

use chrono::{DateTime, Utc};
use futures::future::join_all;
use package_rot_core::{Liveness, RegistryRecord};
use package_rot_store::Clock;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, instrument};

use crate::probe::{EmailProbe, UrlProbe};

/// Releases older than this many whole days count as stale
pub const STALE_AFTER_DAYS: i64 = 365;

/// Minimum share of working links for a maintained project
pub const MIN_WORKING_URL_RATE: f64 = 0.5;

/// Minimum number of working links for a maintained project
pub const MIN_WORKING_URLS: usize = 2;

/// Descriptions shorter than this are considered empty
pub const MIN_DESCRIPTION_LENGTH: usize = 100;

/// Summaries shorter than this are considered empty
pub const MIN_SUMMARY_LENGTH: usize = 10;

/// Working links out of candidate links for one record
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct UrlEvidence {
    pub candidates: usize,
    pub working: usize,
}

impl UrlEvidence {
    pub fn new(candidates: usize, working: usize) -> Self {
        Self {
            candidates,
            working,
        }
    }

    pub fn rate(&self) -> f64 {
        working_url_rate(self.working, self.candidates)
    }
}

/// Share of working links; 0 when there are no candidates
pub fn working_url_rate(working: usize, candidates: usize) -> f64 {
    if candidates == 0 {
        0.0
    } else {
        working as f64 / candidates as f64
    }
}

/// Whether the project shows neither working links nor meaningful text
pub fn looks_unmaintained(evidence: &UrlEvidence, description_len: usize, summary_len: usize) -> bool {
    has_little_text(description_len, summary_len) && has_few_working_urls(evidence)
}

fn has_little_text(description_len: usize, summary_len: usize) -> bool {
    description_len < MIN_DESCRIPTION_LENGTH && summary_len < MIN_SUMMARY_LENGTH
}

fn has_few_working_urls(evidence: &UrlEvidence) -> bool {
    evidence.rate() < MIN_WORKING_URL_RATE || evidence.working < MIN_WORKING_URLS
}

/// Whole days between two instants, truncated toward zero
pub fn age_in_days(last_upload: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    (now - last_upload).num_days()
}

/// Classification result with the evidence behind it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LivenessReport {
    pub name: String,
    pub verdict: Liveness,
    pub fetch_status: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_upload: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age_days: Option<i64>,
    pub description_length: usize,
    pub summary_length: usize,
    /// Absent when probing was not needed to reach the verdict
    #[serde(skip_serializing_if = "Option::is_none")]
    pub urls: Option<UrlEvidence>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub working_url_rate: Option<f64>,
    /// Absent when no contact check was needed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub has_valid_contact: Option<bool>,
}

/// Evaluates dead / seems-dead / should-be-terminated for registry records
pub struct LivenessClassifier {
    url_probe: Arc<dyn UrlProbe>,
    email_probe: Arc<dyn EmailProbe>,
    clock: Arc<dyn Clock>,
}

impl LivenessClassifier {
    pub fn new(
        url_probe: Arc<dyn UrlProbe>,
        email_probe: Arc<dyn EmailProbe>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            url_probe,
            email_probe,
            clock,
        }
    }

    /// Registry refused the package, it is yanked, or it has no artifacts
    pub fn is_dead(&self, record: &RegistryRecord) -> bool {
        !record.is_fetch_ok()
            || record.metadata.is_none()
            || record.is_yanked()
            || record.most_recent_release().is_none()
    }

    /// Whether the most recent upload is more than a year old
    fn is_stale(&self, record: &RegistryRecord) -> bool {
        record
            .last_upload()
            .is_some_and(|uploaded| age_in_days(uploaded, self.clock.now()) > STALE_AFTER_DAYS)
    }

    /// Probe every candidate URL, duplicates included
    pub async fn probe_urls(&self, record: &RegistryRecord, user_agent: &str) -> UrlEvidence {
        let candidates = record.candidate_urls();
        let verdicts = join_all(
            candidates
                .iter()
                .map(|url| self.url_probe.probe(url, user_agent)),
        )
        .await;
        let working = verdicts.iter().filter(|verdict| verdict.valid).count();
        debug!(
            "{}: {}/{} candidate URLs work",
            record.name,
            working,
            candidates.len()
        );
        UrlEvidence::new(candidates.len(), working)
    }

    /// Run the text and age gates, probing only if both pass
    async fn unmaintained_evidence(
        &self,
        record: &RegistryRecord,
        user_agent: &str,
    ) -> (bool, Option<UrlEvidence>) {
        if self.is_dead(record)
            || !has_little_text(record.description_length(), record.summary_length())
            || !self.is_stale(record)
        {
            return (false, None);
        }

        let evidence = self.probe_urls(record, user_agent).await;
        (has_few_working_urls(&evidence), Some(evidence))
    }

    /// Live package showing no signs of maintenance for over a year
    pub async fn seems_dead(&self, record: &RegistryRecord, user_agent: &str) -> bool {
        self.unmaintained_evidence(record, user_agent).await.0
    }

    /// Whether the author or maintainer address validates
    pub async fn has_valid_contact(&self, record: &RegistryRecord, user_agent: &str) -> bool {
        let Some(info) = &record.metadata else {
            return false;
        };
        for email in info.contact_emails() {
            if self.email_probe.validate(email, user_agent).await {
                return true;
            }
        }
        false
    }

    /// Dead, or seemingly dead with nobody to contact
    pub async fn should_be_terminated(&self, record: &RegistryRecord, user_agent: &str) -> bool {
        if self.is_dead(record) {
            return true;
        }
        self.seems_dead(record, user_agent).await
            && !self.has_valid_contact(record, user_agent).await
    }

    /// Full verdict with supporting evidence
    #[instrument(skip(self, record, user_agent), fields(package = %record.name))]
    pub async fn classify(&self, record: &RegistryRecord, user_agent: &str) -> LivenessReport {
        let last_upload = record.last_upload();
        let mut report = LivenessReport {
            name: record.name.clone(),
            verdict: Liveness::Dead,
            fetch_status: record.fetch_status,
            last_upload,
            age_days: last_upload.map(|uploaded| age_in_days(uploaded, self.clock.now())),
            description_length: record.description_length(),
            summary_length: record.summary_length(),
            urls: None,
            working_url_rate: None,
            has_valid_contact: None,
        };

        if self.is_dead(record) {
            return report;
        }

        let (seems_dead, evidence) = self.unmaintained_evidence(record, user_agent).await;
        report.urls = evidence;
        report.working_url_rate = evidence.map(|e| e.rate());

        report.verdict = if !seems_dead {
            Liveness::Alive
        } else {
            let contact = self.has_valid_contact(record, user_agent).await;
            report.has_valid_contact = Some(contact);
            if contact {
                Liveness::SeemsDead
            } else {
                Liveness::ShouldBeTerminated
            }
        };
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::{MockEmailProbe, MockUrlProbe, UrlVerdict};
    use chrono::{Duration, TimeZone};
    use package_rot_store::ManualClock;
    use serde_json::{json, Map, Value};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    fn artifact(uploaded: DateTime<Utc>) -> Value {
        json!({
            "filename": "demo-1.0.tar.gz",
            "size": 1024,
            "md5_digest": "d41d8cd98f00b204e9800998ecf8427e",
            "packagetype": "sdist",
            "upload_time": uploaded.format("%Y-%m-%dT%H:%M:%S").to_string(),
            "upload_time_iso_8601": uploaded.to_rfc3339(),
            "yanked": false
        })
    }

    struct RecordFixture<'a> {
        description: String,
        summary: String,
        urls: &'a [&'a str],
        uploaded: Option<DateTime<Utc>>,
        author_email: Option<&'a str>,
        maintainer_email: Option<&'a str>,
    }

    impl Default for RecordFixture<'_> {
        fn default() -> Self {
            Self {
                description: "x".repeat(50),
                summary: "tiny".to_string(),
                urls: &[],
                uploaded: Some(now() - Duration::days(400)),
                author_email: None,
                maintainer_email: None,
            }
        }
    }

    fn record(fixture: RecordFixture<'_>) -> RegistryRecord {
        let project_urls: Map<String, Value> = fixture
            .urls
            .iter()
            .enumerate()
            .map(|(i, url)| (format!("link{}", i), Value::from(*url)))
            .collect();
        let releases = match fixture.uploaded {
            Some(uploaded) => json!({ "1.0": [artifact(uploaded)] }),
            None => json!({}),
        };
        let document = json!({
            "project_name": "demo",
            "status": 200,
            "info": {
                "name": "demo",
                "version": "1.0",
                "yanked": false,
                "summary": fixture.summary,
                "description": fixture.description,
                "author_email": fixture.author_email,
                "maintainer_email": fixture.maintainer_email,
                "project_urls": project_urls
            },
            "releases": releases
        });
        RegistryRecord::from_document(&document).unwrap()
    }

    fn probe_accepting(working: &'static [&'static str]) -> MockUrlProbe {
        let mut probe = MockUrlProbe::new();
        probe.expect_probe().returning(move |url, _| {
            if working.iter().any(|w| *w == url) {
                UrlVerdict::answered(200)
            } else {
                UrlVerdict::answered(404)
            }
        });
        probe
    }

    fn unused_url_probe() -> MockUrlProbe {
        let mut probe = MockUrlProbe::new();
        probe.expect_probe().never();
        probe
    }

    fn email_probe(valid: bool) -> MockEmailProbe {
        let mut probe = MockEmailProbe::new();
        probe.expect_validate().returning(move |_, _| valid);
        probe
    }

    fn classifier(url_probe: MockUrlProbe, email_probe: MockEmailProbe) -> LivenessClassifier {
        LivenessClassifier::new(
            Arc::new(url_probe),
            Arc::new(email_probe),
            Arc::new(ManualClock::new(now())),
        )
    }

    const FIVE_URLS: &[&str] = &[
        "https://a.example/",
        "https://b.example/",
        "https://c.example/",
        "https://d.example/",
        "https://e.example/",
    ];

    #[test]
    fn test_working_url_rate_zero_candidates() {
        assert_eq!(working_url_rate(0, 0), 0.0);
        assert_eq!(working_url_rate(1, 4), 0.25);
        assert_eq!(UrlEvidence::default().rate(), 0.0);
    }

    #[test]
    fn test_looks_unmaintained_requires_little_text() {
        let poor = UrlEvidence::new(5, 1);
        assert!(looks_unmaintained(&poor, 50, 5));
        assert!(!looks_unmaintained(&poor, 100, 5));
        assert!(!looks_unmaintained(&poor, 50, 10));

        let healthy = UrlEvidence::new(4, 3);
        assert!(!looks_unmaintained(&healthy, 0, 0));

        // one working link is too few even at a 100% rate
        assert!(looks_unmaintained(&UrlEvidence::new(1, 1), 0, 0));
    }

    #[test]
    fn test_age_in_days_truncates() {
        let last = now() - Duration::days(365) - Duration::hours(23);
        assert_eq!(age_in_days(last, now()), 365);
    }

    #[test]
    fn test_non_200_is_dead() {
        let classifier = classifier(unused_url_probe(), email_probe(true));
        assert!(classifier.is_dead(&RegistryRecord::unavailable("gone", 404)));
    }

    #[test]
    fn test_yanked_is_dead() {
        let mut yanked = record(RecordFixture::default());
        if let Some(info) = yanked.metadata.as_mut() {
            info.yanked = true;
        }
        let classifier = classifier(unused_url_probe(), email_probe(true));
        assert!(classifier.is_dead(&yanked));
    }

    #[test]
    fn test_empty_release_history_is_dead() {
        let empty = record(RecordFixture {
            uploaded: None,
            ..Default::default()
        });
        let classifier = classifier(unused_url_probe(), email_probe(true));
        assert!(classifier.is_dead(&empty));
    }

    #[tokio::test]
    async fn test_old_quiet_project_seems_dead() {
        let record = record(RecordFixture {
            urls: FIVE_URLS,
            ..Default::default()
        });
        let classifier = classifier(probe_accepting(&["https://a.example/"]), email_probe(true));

        assert!(!classifier.is_dead(&record));
        assert!(classifier.seems_dead(&record, "ua").await);
    }

    #[tokio::test]
    async fn test_recent_release_is_not_seemingly_dead() {
        let record = record(RecordFixture {
            urls: FIVE_URLS,
            uploaded: Some(now() - Duration::days(30)),
            ..Default::default()
        });
        let classifier = classifier(unused_url_probe(), email_probe(true));
        assert!(!classifier.seems_dead(&record, "ua").await);
    }

    #[tokio::test]
    async fn test_exactly_one_year_is_not_stale() {
        let record = record(RecordFixture {
            uploaded: Some(now() - Duration::days(365)),
            ..Default::default()
        });
        let classifier = classifier(unused_url_probe(), email_probe(true));
        assert!(!classifier.seems_dead(&record, "ua").await);
    }

    #[tokio::test]
    async fn test_long_description_skips_probing() {
        let record = record(RecordFixture {
            description: "d".repeat(150),
            urls: FIVE_URLS,
            ..Default::default()
        });
        let classifier = classifier(unused_url_probe(), email_probe(true));
        assert!(!classifier.seems_dead(&record, "ua").await);
    }

    #[tokio::test]
    async fn test_working_links_keep_project_alive() {
        let record = record(RecordFixture {
            urls: FIVE_URLS,
            ..Default::default()
        });
        let working: &'static [&'static str] =
            &["https://a.example/", "https://b.example/", "https://c.example/"];
        let classifier = classifier(probe_accepting(working), email_probe(false));

        assert!(!classifier.seems_dead(&record, "ua").await);
        assert!(!classifier.should_be_terminated(&record, "ua").await);
    }

    #[tokio::test]
    async fn test_no_candidate_urls_counts_as_unmaintained() {
        let record = record(RecordFixture::default());
        let classifier = classifier(unused_url_probe(), email_probe(true));
        assert!(classifier.seems_dead(&record, "ua").await);
    }

    #[tokio::test]
    async fn test_valid_author_email_prevents_termination() {
        let record = record(RecordFixture {
            urls: FIVE_URLS,
            author_email: Some("jane@example.org"),
            ..Default::default()
        });
        let classifier = classifier(probe_accepting(&[]), email_probe(true));

        assert!(classifier.seems_dead(&record, "ua").await);
        assert!(!classifier.should_be_terminated(&record, "ua").await);
    }

    #[tokio::test]
    async fn test_unreachable_maintainer_means_terminate() {
        let record = record(RecordFixture {
            urls: FIVE_URLS,
            author_email: Some("jane@nowhere.invalid"),
            ..Default::default()
        });
        let classifier = classifier(probe_accepting(&[]), email_probe(false));
        assert!(classifier.should_be_terminated(&record, "ua").await);
    }

    fn email_probe_accepting(valid: &'static str) -> MockEmailProbe {
        let mut probe = MockEmailProbe::new();
        probe
            .expect_validate()
            .returning(move |email, _| email == valid);
        probe
    }

    #[tokio::test]
    async fn test_valid_maintainer_email_prevents_termination() {
        let build = |emails| classifier(probe_accepting(&[]), emails);

        let bounced_author = record(RecordFixture {
            urls: FIVE_URLS,
            author_email: Some("jane@nowhere.invalid"),
            maintainer_email: Some("ops@example.org"),
            ..Default::default()
        });
        let checker = build(email_probe_accepting("ops@example.org"));
        assert!(checker.seems_dead(&bounced_author, "ua").await);
        assert!(!checker.should_be_terminated(&bounced_author, "ua").await);

        let no_author = record(RecordFixture {
            urls: FIVE_URLS,
            maintainer_email: Some("ops@example.org"),
            ..Default::default()
        });
        let checker = build(email_probe_accepting("ops@example.org"));
        assert!(checker.has_valid_contact(&no_author, "ua").await);
        assert!(!checker.should_be_terminated(&no_author, "ua").await);

        let checker = build(email_probe_accepting("someone@else.org"));
        assert!(checker.should_be_terminated(&no_author, "ua").await);
    }

    #[tokio::test]
    async fn test_dead_record_is_terminated_without_probing() {
        let mut emails = MockEmailProbe::new();
        emails.expect_validate().never();
        let classifier = classifier(unused_url_probe(), emails);

        assert!(
            classifier
                .should_be_terminated(&RegistryRecord::unavailable("gone", 404), "ua")
                .await
        );
    }

    #[tokio::test]
    async fn test_duplicate_urls_are_each_probed() {
        let record = record(RecordFixture {
            urls: &["https://a.example/", "https://a.example/"],
            ..Default::default()
        });
        let mut probe = MockUrlProbe::new();
        probe
            .expect_probe()
            .times(2)
            .returning(|_, _| UrlVerdict::answered(200));
        let classifier = classifier(probe, email_probe(true));

        let evidence = classifier.probe_urls(&record, "ua").await;
        assert_eq!(evidence, UrlEvidence::new(2, 2));
    }

    #[tokio::test]
    async fn test_classify_reports_evidence() {
        let record = record(RecordFixture {
            urls: FIVE_URLS,
            author_email: Some("jane@example.org"),
            ..Default::default()
        });
        let classifier = classifier(probe_accepting(&["https://a.example/"]), email_probe(true));

        let report = classifier.classify(&record, "ua").await;
        assert_eq!(report.verdict, Liveness::SeemsDead);
        assert_eq!(report.urls, Some(UrlEvidence::new(5, 1)));
        assert_eq!(report.working_url_rate, Some(0.2));
        assert_eq!(report.age_days, Some(400));
        assert_eq!(report.has_valid_contact, Some(true));
    }

    #[tokio::test]
    async fn test_classify_verdicts() {
        let classifier = classifier(probe_accepting(&[]), email_probe(false));

        let gone = classifier
            .classify(&RegistryRecord::unavailable("gone", 404), "ua")
            .await;
        assert_eq!(gone.verdict, Liveness::Dead);
        assert_eq!(gone.urls, None);

        let fresh = record(RecordFixture {
            uploaded: Some(now() - Duration::days(3)),
            ..Default::default()
        });
        let report = classifier.classify(&fresh, "ua").await;
        assert_eq!(report.verdict, Liveness::Alive);
        assert_eq!(report.urls, None);

        let abandoned = record(RecordFixture::default());
        let report = classifier.classify(&abandoned, "ua").await;
        assert_eq!(report.verdict, Liveness::ShouldBeTerminated);
        assert_eq!(report.has_valid_contact, Some(false));
    }
}
