//! Upstream version discovery.
//!
//! Tags that do not parse as a semantic version after the prefix is stripped
//! (e.g. "beta" or nightly tags) are skipped, never fatal.

use std::collections::BTreeSet;

use semver::Version;
use serde::Deserialize;
use tracing::debug;

use crate::client::HttpClient;
use crate::error::FetchResult;
use crate::types::RetrievalConfig;

/// Page size requested from the tag listing.
const TAGS_PER_PAGE: usize = 100;

/// One entry of the upstream tag listing.
#[derive(Debug, Clone, Deserialize)]
pub struct TagEntry {
    pub name: String,
}

/// Lists the versions published upstream.
#[derive(Debug, Clone)]
pub struct VersionCatalog {
    http: HttpClient,
    tags_url: String,
    tag_prefix: String,
    max_pages: u32,
}

impl VersionCatalog {
    pub fn new(http: HttpClient, config: &RetrievalConfig) -> Self {
        Self {
            http,
            tags_url: config.tags_url.clone(),
            tag_prefix: config.tag_prefix.clone(),
            max_pages: config.max_tag_pages.max(1),
        }
    }

    /// All parseable versions, ascending and deduplicated.
    ///
    /// Fails only if a listing page cannot be retrieved or decoded.
    pub async fn list_versions(&self) -> FetchResult<Vec<Version>> {
        let mut versions = BTreeSet::new();

        for page in 1..=self.max_pages {
            let url = self.page_url(page);
            let tags: Vec<TagEntry> = self.http.get_json(&url).await?;
            let count = tags.len();
            debug!(url = %url, tags = count, "fetched tag page");

            versions.extend(versions_from_tags(&tags, &self.tag_prefix));

            if count < TAGS_PER_PAGE {
                break;
            }
        }

        Ok(versions.into_iter().collect())
    }

    fn page_url(&self, page: u32) -> String {
        let sep = if self.tags_url.contains('?') { '&' } else { '?' };
        format!("{}{sep}per_page={TAGS_PER_PAGE}&page={page}", self.tags_url)
    }
}

/// Parse a tag name into a version after stripping `prefix`.
pub fn parse_tag(name: &str, prefix: &str) -> Option<Version> {
    let raw = name.strip_prefix(prefix)?;
    match Version::parse(raw) {
        Ok(version) => Some(version),
        Err(e) => {
            debug!(tag = %name, error = %e, "skipping unparseable tag");
            None
        }
    }
}

/// Parse every tag, dropping the ones that are not versions.
pub fn versions_from_tags(tags: &[TagEntry], prefix: &str) -> Vec<Version> {
    tags.iter()
        .filter_map(|tag| parse_tag(&tag.name, prefix))
        .collect()
}
