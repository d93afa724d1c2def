//! Descriptive project metadata (`info` block of a catalog document)

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use serde_json::Value;

use crate::document::Fields;
use crate::error::Result;

/// Project metadata as published by the registry.
///
/// Nothing here is checked for truthfulness; a home page may be dead and an
/// email address may bounce. Validity is decided later by the classifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Info {
    pub name: String,
    pub version: String,

    pub author: Option<String>,
    pub author_email: Option<String>,
    pub maintainer: Option<String>,
    pub maintainer_email: Option<String>,

    pub summary: Option<String>,
    pub description: Option<String>,
    pub description_content_type: Option<String>,
    pub license: Option<String>,
    pub keywords: Option<String>,
    pub platform: Option<String>,
    pub requires_python: Option<String>,

    pub classifiers: Vec<String>,

    pub requires_dist: Vec<String>,

    pub yanked: bool,
    pub yanked_reason: Option<String>,

    /// Named links such as "Homepage" or "Source", in document order
    #[serde(serialize_with = "serialize_pairs")]
    pub project_urls: Vec<(String, String)>,

    pub home_page: Option<String>,
    pub docs_url: Option<String>,
    pub download_url: Option<String>,
    pub bugtrack_url: Option<String>,
    pub release_url: Option<String>,
    pub project_url: Option<String>,
    pub package_url: Option<String>,
}

impl Info {
    /// Build from the `info` object of a catalog document
    pub fn from_document(value: &Value, path: impl Into<String>) -> Result<Self> {
        let fields = Fields::of(value, path)?;

        Ok(Self {
            name: fields.required_str("name")?,
            version: fields.required_str("version")?,
            author: fields.optional_str("author")?,
            author_email: fields.optional_str("author_email")?,
            maintainer: fields.optional_str("maintainer")?,
            maintainer_email: fields.optional_str("maintainer_email")?,
            summary: fields.optional_str("summary")?,
            description: fields.optional_str("description")?,
            description_content_type: fields.optional_str("description_content_type")?,
            license: fields.optional_str("license")?,
            keywords: fields.optional_str("keywords")?,
            platform: fields.optional_str("platform")?,
            requires_python: fields.optional_str("requires_python")?,
            classifiers: fields.string_list("classifiers")?,
            requires_dist: fields.string_list("requires_dist")?,
            yanked: fields.required_bool("yanked")?,
            yanked_reason: fields.optional_str("yanked_reason")?,
            project_urls: fields.string_pairs("project_urls")?,
            home_page: fields.optional_str("home_page")?,
            docs_url: fields.optional_str("docs_url")?,
            download_url: fields.optional_str("download_url")?,
            bugtrack_url: fields.optional_str("bugtrack_url")?,
            release_url: fields.optional_str("release_url")?,
            project_url: fields.optional_str("project_url")?,
            package_url: fields.optional_str("package_url")?,
        })
    }

    /// Singular URL fields that carry a value, in a fixed order
    pub fn singular_urls(&self) -> impl Iterator<Item = &str> {
        [
            &self.home_page,
            &self.docs_url,
            &self.download_url,
            &self.bugtrack_url,
            &self.release_url,
            &self.project_url,
        ]
        .into_iter()
        .filter_map(|url| url.as_deref())
        .filter(|url| !url.trim().is_empty())
    }

    /// Look up a named project URL
    pub fn project_url_named(&self, name: &str) -> Option<&str> {
        self.project_urls
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, url)| url.as_str())
    }

    /// Author and maintainer addresses that are present
    pub fn contact_emails(&self) -> impl Iterator<Item = &str> {
        [&self.author_email, &self.maintainer_email]
            .into_iter()
            .filter_map(|email| email.as_deref())
    }
}

fn serialize_pairs<S: Serializer>(
    pairs: &[(String, String)],
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    let mut map = serializer.serialize_map(Some(pairs.len()))?;
    for (key, value) in pairs {
        map.serialize_entry(key, value)?;
    }
    map.end()
}
