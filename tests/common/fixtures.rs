//! Test fixtures
//!
//! Registry documents shaped like the public JSON API returns them,
//! including the fields the parser ignores.

use chrono::{DateTime, Duration, Utc};
use serde_json::{json, Map, Value};

/// Knobs for [`project_document`]
#[derive(Debug, Clone)]
pub struct ProjectFixture {
    pub summary: String,
    pub description: String,
    pub author_email: Option<String>,
    pub maintainer_email: Option<String>,
    pub home_page: Option<String>,
    pub project_urls: Vec<(String, String)>,
    /// One release per entry: version and upload time
    pub releases: Vec<(String, DateTime<Utc>)>,
    pub yanked: bool,
}

impl ProjectFixture {
    /// A healthy-looking project released `age_days` ago
    pub fn released_days_ago(now: DateTime<Utc>, age_days: i64) -> Self {
        Self {
            summary: "A small library".to_string(),
            description: "Short readme".to_string(),
            author_email: Some("jane@example.org".to_string()),
            maintainer_email: None,
            home_page: None,
            project_urls: Vec::new(),
            releases: vec![("1.0.0".to_string(), now - Duration::days(age_days))],
            yanked: false,
        }
    }

    pub fn with_urls<I, S>(mut self, urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.project_urls = urls
            .into_iter()
            .enumerate()
            .map(|(i, url)| (format!("Link {}", i), url.into()))
            .collect();
        self
    }

    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = summary.into();
        self
    }

    pub fn with_author_email(mut self, email: Option<&str>) -> Self {
        self.author_email = email.map(str::to_string);
        self
    }
}

/// One artifact as listed under `releases`
pub fn artifact_document(name: &str, version: &str, uploaded: DateTime<Utc>) -> Value {
    json!({
        "comment_text": "",
        "digests": {"md5": "d41d8cd98f00b204e9800998ecf8427e"},
        "downloads": -1,
        "filename": format!("{}-{}.tar.gz", name, version),
        "has_sig": false,
        "md5_digest": "d41d8cd98f00b204e9800998ecf8427e",
        "packagetype": "sdist",
        "python_version": "source",
        "requires_python": ">=3.8",
        "size": 2048,
        "upload_time": uploaded.format("%Y-%m-%dT%H:%M:%S").to_string(),
        "upload_time_iso_8601": uploaded.to_rfc3339(),
        "url": format!("https://files.example/{}-{}.tar.gz", name, version),
        "yanked": false,
        "yanked_reason": null
    })
}

/// Body of `GET /pypi/{name}/json`, before the client injects its fields
pub fn project_document(name: &str, fixture: &ProjectFixture) -> Value {
    let project_urls: Map<String, Value> = fixture
        .project_urls
        .iter()
        .map(|(label, url)| (label.clone(), Value::from(url.as_str())))
        .collect();

    let releases: Map<String, Value> = fixture
        .releases
        .iter()
        .map(|(version, uploaded)| {
            (
                version.clone(),
                json!([artifact_document(name, version, *uploaded)]),
            )
        })
        .collect();

    let version = fixture
        .releases
        .last()
        .map(|(version, _)| version.clone())
        .unwrap_or_else(|| "0.0.0".to_string());

    json!({
        "info": {
            "author": "Jane Doe",
            "author_email": fixture.author_email,
            "bugtrack_url": null,
            "classifiers": ["Programming Language :: Python :: 3"],
            "description": fixture.description,
            "description_content_type": "text/markdown",
            "docs_url": null,
            "download_url": "",
            "dynamic": null,
            "home_page": fixture.home_page,
            "keywords": "",
            "license": "MIT",
            "maintainer": null,
            "maintainer_email": fixture.maintainer_email,
            "name": name,
            "package_url": format!("https://pypi.org/project/{}/", name),
            "platform": null,
            "project_url": null,
            "project_urls": project_urls,
            "provides_extra": null,
            "release_url": null,
            "requires_dist": null,
            "requires_python": ">=3.8",
            "summary": fixture.summary,
            "version": version,
            "yanked": fixture.yanked,
            "yanked_reason": null
        },
        "last_serial": 1,
        "releases": releases,
        "urls": [],
        "vulnerabilities": []
    })
}

/// Body of `GET /simple/` in its JSON form
pub fn simple_index_document(names: &[&str]) -> Value {
    let projects: Vec<Value> = names
        .iter()
        .map(|name| json!({"name": name, "_last-serial": 1}))
        .collect();
    json!({
        "meta": {"api-version": "1.1", "_last-serial": 1},
        "projects": projects
    })
}
