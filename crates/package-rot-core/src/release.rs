//! Release history: versions and their uploaded artifacts

use chrono::{DateTime, Utc};
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use serde_json::Value;

use crate::document::{kind_of, Fields};
use crate::error::{RecordError, Result};

/// One uploaded distribution file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReleaseArtifact {
    /// File name as uploaded
    pub filename: String,

    /// Download URL
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Size in bytes
    pub size: u64,

    /// MD5 digest of the file
    pub md5_digest: String,

    /// Distribution type (`sdist`, `bdist_wheel`, ...)
    pub packagetype: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub python_version: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub requires_python: Option<String>,

    /// Legacy upload time string, kept verbatim
    pub upload_time: String,

    /// ISO-8601 upload time, kept verbatim
    pub upload_time_iso_8601: String,

    /// Parsed form of `upload_time_iso_8601`
    #[serde(skip)]
    pub uploaded_at: DateTime<Utc>,

    pub yanked: bool,

    pub yanked_reason: Option<String>,
}

impl ReleaseArtifact {
    /// Build an artifact from its catalog document
    pub fn from_document(value: &Value, path: impl Into<String>) -> Result<Self> {
        let fields = Fields::of(value, path)?;

        let upload_time_iso_8601 = fields.required_str("upload_time_iso_8601")?;
        let uploaded_at = parse_timestamp(&upload_time_iso_8601).ok_or_else(|| {
            RecordError::mismatch(
                fields.child("upload_time_iso_8601"),
                "ISO-8601 timestamp",
                format!("{:?}", upload_time_iso_8601),
            )
        })?;

        Ok(Self {
            filename: fields.required_str("filename")?,
            url: fields.optional_str("url")?,
            size: fields.required_u64("size")?,
            md5_digest: fields.required_str("md5_digest")?,
            packagetype: fields.required_str("packagetype")?,
            python_version: fields.optional_str("python_version")?,
            requires_python: fields.optional_str("requires_python")?,
            upload_time: fields.required_str("upload_time")?,
            upload_time_iso_8601,
            uploaded_at,
            yanked: fields.required_bool("yanked")?,
            yanked_reason: fields.optional_str("yanked_reason")?,
        })
    }
}

/// Parse an ISO-8601 / RFC 3339 timestamp into UTC
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|ts| ts.with_timezone(&Utc))
}

/// A single version and its artifacts, in the order the registry sent them
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Release {
    pub version: String,
    pub artifacts: Vec<ReleaseArtifact>,
}

/// Mapping of version strings to artifact lists, in document order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Releases {
    versions: Vec<Release>,
}

impl Releases {
    /// Create an empty release history
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse the optional `releases` object of a catalog document
    pub fn from_document(value: Option<&Value>, path: &str) -> Result<Self> {
        let Some(value) = value else {
            return Ok(Self::new());
        };
        let fields = Fields::of(value, path)?;

        let mut versions = Vec::new();
        for (version, files) in fields.entries() {
            let version_path = fields.child(version);
            let files = files.as_array().ok_or_else(|| {
                RecordError::mismatch(version_path.clone(), "array", kind_of(files))
            })?;

            let artifacts = files
                .iter()
                .enumerate()
                .map(|(idx, file)| {
                    ReleaseArtifact::from_document(file, format!("{}[{}]", version_path, idx))
                })
                .collect::<Result<Vec<_>>>()?;

            versions.push(Release {
                version: version.clone(),
                artifacts,
            });
        }

        Ok(Self { versions })
    }

    /// Append a version; a repeated version replaces the earlier entry in place
    pub fn insert(&mut self, version: impl Into<String>, artifacts: Vec<ReleaseArtifact>) {
        let version = version.into();
        match self.versions.iter_mut().find(|r| r.version == version) {
            Some(existing) => existing.artifacts = artifacts,
            None => self.versions.push(Release { version, artifacts }),
        }
    }

    /// Artifacts uploaded for a version
    pub fn get(&self, version: &str) -> Option<&[ReleaseArtifact]> {
        self.versions
            .iter()
            .find(|r| r.version == version)
            .map(|r| r.artifacts.as_slice())
    }

    /// Versions in document order
    pub fn versions(&self) -> impl Iterator<Item = &str> {
        self.versions.iter().map(|r| r.version.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Release> {
        self.versions.iter()
    }

    /// Every artifact across all versions, version order first
    pub fn artifacts(&self) -> impl Iterator<Item = &ReleaseArtifact> {
        self.versions.iter().flat_map(|r| r.artifacts.iter())
    }

    pub fn len(&self) -> usize {
        self.versions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }

    /// Artifact with the latest upload time.
    ///
    /// Equal timestamps keep the first artifact in document order.
    pub fn most_recent(&self) -> Option<&ReleaseArtifact> {
        self.artifacts().fold(None, |best, candidate| match best {
            Some(current) if candidate.uploaded_at <= current.uploaded_at => Some(current),
            _ => Some(candidate),
        })
    }
}

impl Serialize for Releases {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.versions.len()))?;
        for release in &self.versions {
            map.serialize_entry(&release.version, &release.artifacts)?;
        }
        map.end()
    }
}
