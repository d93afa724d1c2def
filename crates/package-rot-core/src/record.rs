//! The registry record: one immutable snapshot of a package per fetch

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use serde_json::{json, Value};
use url::Url;

use crate::document::Fields;
use crate::error::{RecordError, Result};
use crate::info::Info;
use crate::release::{ReleaseArtifact, Releases};

/// HTTP status of a successful catalog fetch
pub const STATUS_OK: u16 = 200;

static URL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"https?://[^\s<>"'`()\[\]{}|\\^]+"#).expect("URL pattern is valid")
});

/// A package snapshot as returned by the registry.
///
/// Serializing a record reproduces the catalog wire shape
/// (`project_name`, `status`, `info`, `releases`), so a serialized record can
/// always be fed back through [`RegistryRecord::from_document`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegistryRecord {
    #[serde(rename = "project_name")]
    pub name: String,

    #[serde(rename = "status")]
    pub fetch_status: u16,

    #[serde(rename = "info", skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Info>,

    #[serde(rename = "releases")]
    pub release_history: Releases,
}

impl RegistryRecord {
    /// Validate and parse a catalog document.
    ///
    /// An `info` block accompanying a non-200 status is ignored, so a record
    /// never carries metadata unless the fetch succeeded.
    pub fn from_document(document: &Value) -> Result<Self> {
        let fields = Fields::of(document, "")?;

        let raw_status = fields.required_u64("status")?;
        let fetch_status = u16::try_from(raw_status).map_err(|_| {
            RecordError::mismatch("status", "HTTP status code", raw_status.to_string())
        })?;
        let name = fields.required_str("project_name")?;

        let metadata = match fields.get("info") {
            Some(info) if fetch_status == STATUS_OK => Some(Info::from_document(info, "info")?),
            _ => None,
        };

        let release_history = if fetch_status == STATUS_OK {
            Releases::from_document(fields.get("releases"), "releases")?
        } else {
            Releases::new()
        };

        Ok(Self {
            name,
            fetch_status,
            metadata,
            release_history,
        })
    }

    /// Parse a record from raw JSON bytes
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let document: Value = serde_json::from_slice(bytes)?;
        Self::from_document(&document)
    }

    /// Record for a fetch that ended with a non-200 status
    pub fn unavailable(name: impl Into<String>, status: u16) -> Self {
        Self {
            name: name.into(),
            fetch_status: status,
            metadata: None,
            release_history: Releases::new(),
        }
    }

    /// Catalog document for a non-200 fetch
    pub fn status_document(name: &str, status: u16) -> Value {
        json!({ "status": status, "project_name": name })
    }

    /// Wire-shape JSON document of this record
    pub fn to_document(&self) -> serde_json::Result<Value> {
        serde_json::to_value(self)
    }

    pub fn is_fetch_ok(&self) -> bool {
        self.fetch_status == STATUS_OK
    }

    /// Whether the project itself is marked as yanked
    pub fn is_yanked(&self) -> bool {
        self.metadata.as_ref().is_some_and(|info| info.yanked)
    }

    /// Artifact with the latest upload timestamp across all versions
    pub fn most_recent_release(&self) -> Option<&ReleaseArtifact> {
        self.release_history.most_recent()
    }

    /// Upload time of the most recent artifact
    pub fn last_upload(&self) -> Option<DateTime<Utc>> {
        self.most_recent_release().map(|artifact| artifact.uploaded_at)
    }

    pub fn artifact_count(&self) -> usize {
        self.release_history.artifacts().count()
    }

    /// Release versions in document order
    pub fn versions(&self) -> impl Iterator<Item = &str> {
        self.release_history.versions()
    }

    /// URLs worth probing: singular URL fields, then named project URLs, then
    /// links found in the description.
    ///
    /// Duplicates are kept; a link listed twice weighs twice in the
    /// working-URL rate.
    pub fn candidate_urls(&self) -> Vec<String> {
        let Some(info) = &self.metadata else {
            return Vec::new();
        };

        let mut urls: Vec<String> = info.singular_urls().map(str::to_string).collect();
        urls.extend(info.project_urls.iter().map(|(_, url)| url.clone()));
        if let Some(description) = &info.description {
            urls.extend(extract_urls(description));
        }
        urls
    }

    /// Character count of the summary, 0 when absent
    pub fn summary_length(&self) -> usize {
        self.metadata
            .as_ref()
            .and_then(|info| info.summary.as_deref())
            .map_or(0, |summary| summary.chars().count())
    }

    /// Character count of the description, 0 when absent
    pub fn description_length(&self) -> usize {
        self.metadata
            .as_ref()
            .and_then(|info| info.description.as_deref())
            .map_or(0, |description| description.chars().count())
    }
}

/// Pull http(s) links out of free text, in order of appearance
pub fn extract_urls(text: &str) -> Vec<String> {
    URL_PATTERN
        .find_iter(text)
        .map(|m| {
            m.as_str()
                .trim_end_matches(|c: char| matches!(c, '.' | ',' | ';' | ':' | '!' | '?' | '*' | '_'))
                .to_string()
        })
        .filter(|link| has_host(link))
        .collect()
}

fn has_host(link: &str) -> bool {
    Url::parse(link)
        .ok()
        .and_then(|parsed| parsed.host_str().map(|host| !host.is_empty()))
        .unwrap_or(false)
}
