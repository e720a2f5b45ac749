//! Configuration and output record types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Dependency metadata record consumed by the downstream build pipeline.
///
/// Records are only produced by the synthesizer and cannot be mutated
/// afterwards. `source_sha256` is always the digest of the exact bytes served
/// at `source`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataRecord {
    version: String,
    id: String,
    name: String,
    source: String,
    source_sha256: String,
    licenses: Vec<String>,
    purl: String,
    cpe: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    deprecation_date: Option<DateTime<Utc>>,
}

/// Field values for a new [`MetadataRecord`].
#[derive(Debug, Clone)]
pub(crate) struct RecordFields {
    pub version: String,
    pub id: String,
    pub name: String,
    pub source: String,
    pub source_sha256: String,
    pub licenses: Vec<String>,
    pub purl: String,
    pub cpe: String,
    pub deprecation_date: Option<DateTime<Utc>>,
}

impl MetadataRecord {
    pub(crate) fn new(fields: RecordFields) -> Self {
        Self {
            version: fields.version,
            id: fields.id,
            name: fields.name,
            source: fields.source,
            source_sha256: fields.source_sha256,
            licenses: fields.licenses,
            purl: fields.purl,
            cpe: fields.cpe,
            deprecation_date: fields.deprecation_date,
        }
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn source_sha256(&self) -> &str {
        &self.source_sha256
    }

    pub fn licenses(&self) -> &[String] {
        &self.licenses
    }

    pub fn purl(&self) -> &str {
        &self.purl
    }

    pub fn cpe(&self) -> &str {
        &self.cpe
    }

    pub fn deprecation_date(&self) -> Option<DateTime<Utc>> {
        self.deprecation_date
    }
}

/// A record emitted for one build target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetedRecord {
    #[serde(flatten)]
    pub record: MetadataRecord,

    /// Build target name (e.g., "jammy").
    pub target: String,
}

/// Static description of the tracked dependency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyInfo {
    /// Stable dependency identifier, also the tarball prefix (e.g., "nginx").
    pub id: String,

    /// Human name (e.g., "NGINX").
    pub name: String,

    /// CPE vendor field.
    pub cpe_vendor: String,

    /// CPE product field.
    pub cpe_product: String,
}

impl Default for DependencyInfo {
    fn default() -> Self {
        Self {
            id: "nginx".to_string(),
            name: "NGINX".to_string(),
            cpe_vendor: "nginx".to_string(),
            cpe_product: "nginx".to_string(),
        }
    }
}

/// Retrieval configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// The tracked dependency.
    #[serde(default)]
    pub dependency: DependencyInfo,

    /// Upstream tag listing endpoint (JSON array of `{"name": ...}`).
    #[serde(default = "default_tags_url")]
    pub tags_url: String,

    /// Literal prefix stripped from tag names before version parsing.
    #[serde(default = "default_tag_prefix")]
    pub tag_prefix: String,

    /// Maximum number of tag listing pages to follow.
    #[serde(default = "default_max_tag_pages")]
    pub max_tag_pages: u32,

    /// Distribution host serving `/download/<id>-<version>.tar.gz`.
    #[serde(default = "default_download_host")]
    pub download_host: String,

    /// Armored public key URLs, in check order.
    #[serde(default = "default_key_urls")]
    pub key_urls: Vec<String>,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Maximum retries for transient failures.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

fn default_tags_url() -> String {
    "https://api.github.com/repos/nginx/nginx/tags".to_string()
}

fn default_tag_prefix() -> String {
    "release-".to_string()
}

fn default_max_tag_pages() -> u32 {
    10
}

fn default_download_host() -> String {
    "https://nginx.org".to_string()
}

fn default_key_urls() -> Vec<String> {
    // https://nginx.org/en/pgp_keys.html
    ["mdounin", "maxim", "sb", "thresh"]
        .iter()
        .map(|name| format!("https://nginx.org/keys/{name}.key"))
        .collect()
}

fn default_timeout() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    3
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            dependency: DependencyInfo::default(),
            tags_url: default_tags_url(),
            tag_prefix: default_tag_prefix(),
            max_tag_pages: default_max_tag_pages(),
            download_host: default_download_host(),
            key_urls: default_key_urls(),
            timeout_secs: default_timeout(),
            max_retries: default_max_retries(),
        }
    }
}

impl RetrievalConfig {
    /// Create config from environment variables.
    ///
    /// | Variable | Description |
    /// |----------|-------------|
    /// | `DEPMETA_TAGS_URL` | Tag listing endpoint |
    /// | `DEPMETA_DOWNLOAD_HOST` | Distribution host |
    /// | `DEPMETA_KEY_URLS` | Comma-separated key URLs |
    /// | `DEPMETA_TIMEOUT` | Request timeout in seconds (default: 30) |
    /// | `DEPMETA_MAX_RETRIES` | Max retries for transient failures (default: 3) |
    pub fn from_env() -> Self {
        Self {
            dependency: DependencyInfo::default(),
            tags_url: std::env::var("DEPMETA_TAGS_URL").unwrap_or_else(|_| default_tags_url()),
            tag_prefix: default_tag_prefix(),
            max_tag_pages: default_max_tag_pages(),
            download_host: std::env::var("DEPMETA_DOWNLOAD_HOST")
                .unwrap_or_else(|_| default_download_host()),
            key_urls: std::env::var("DEPMETA_KEY_URLS")
                .ok()
                .map(|v| {
                    v.split(',')
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(String::from)
                        .collect::<Vec<_>>()
                })
                .filter(|urls| !urls.is_empty())
                .unwrap_or_else(default_key_urls),
            timeout_secs: std::env::var("DEPMETA_TIMEOUT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or_else(default_timeout),
            max_retries: std::env::var("DEPMETA_MAX_RETRIES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or_else(default_max_retries),
        }
    }

    /// Set the tag listing endpoint.
    pub fn with_tags_url(mut self, url: impl Into<String>) -> Self {
        self.tags_url = url.into();
        self
    }

    /// Set the distribution host.
    pub fn with_download_host(mut self, host: impl Into<String>) -> Self {
        self.download_host = host.into();
        self
    }

    /// Replace the trusted key URLs.
    pub fn with_key_urls<I, S>(mut self, urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.key_urls = urls.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn record(deprecation_date: Option<DateTime<Utc>>) -> MetadataRecord {
        MetadataRecord::new(RecordFields {
            version: "1.2.3".to_string(),
            id: "nginx".to_string(),
            name: "NGINX".to_string(),
            source: "https://nginx.org/download/nginx-1.2.3.tar.gz".to_string(),
            source_sha256: "ab".repeat(32),
            licenses: vec!["BSD-2-Clause".to_string()],
            purl: "pkg:generic/nginx@1.2.3".to_string(),
            cpe: "cpe:2.3:a:nginx:nginx:1.2.3:*:*:*:*:*:*:*".to_string(),
            deprecation_date,
        })
    }

    #[test]
    fn record_wire_names() {
        let json = serde_json::to_value(record(None)).unwrap();
        let obj = json.as_object().unwrap();
        let mut keys: Vec<_> = obj.keys().map(String::as_str).collect();
        keys.sort_unstable();
        assert_eq!(
            keys,
            ["cpe", "id", "licenses", "name", "purl", "source", "source_sha256", "version"]
        );
    }

    #[test]
    fn record_keeps_deprecation_date_when_set() {
        let date = DateTime::parse_from_rfc3339("2030-01-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let json = serde_json::to_value(record(Some(date))).unwrap();
        assert_eq!(json["deprecation_date"], "2030-01-01T00:00:00Z");
    }

    #[test]
    fn targeted_record_is_flat() {
        let targeted = TargetedRecord {
            record: record(None),
            target: "jammy".to_string(),
        };
        let json = serde_json::to_value(&targeted).unwrap();
        assert_eq!(json["target"], "jammy");
        assert_eq!(json["version"], "1.2.3");

        let back: TargetedRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back, targeted);
    }

    #[test]
    #[serial]
    fn config_from_env_defaults() {
        std::env::remove_var("DEPMETA_TAGS_URL");
        std::env::remove_var("DEPMETA_KEY_URLS");
        std::env::remove_var("DEPMETA_TIMEOUT");

        let config = RetrievalConfig::from_env();
        assert_eq!(
            config.tags_url,
            "https://api.github.com/repos/nginx/nginx/tags"
        );
        assert_eq!(config.key_urls.len(), 4);
        assert_eq!(config.key_urls[0], "https://nginx.org/keys/mdounin.key");
        assert_eq!(config.timeout_secs, 30);
    }

    #[test]
    #[serial]
    fn config_from_env_key_urls() {
        std::env::set_var(
            "DEPMETA_KEY_URLS",
            "https://keys.example/a.key, https://keys.example/b.key,",
        );
        let config = RetrievalConfig::from_env();
        std::env::remove_var("DEPMETA_KEY_URLS");

        assert_eq!(
            config.key_urls,
            vec!["https://keys.example/a.key", "https://keys.example/b.key"]
        );
    }

    #[test]
    fn config_builder() {
        let config = RetrievalConfig::default()
            .with_tags_url("http://127.0.0.1:1/tags")
            .with_download_host("http://127.0.0.1:1")
            .with_key_urls(["http://127.0.0.1:1/k.key"])
            .with_max_retries(0);

        assert_eq!(config.tags_url, "http://127.0.0.1:1/tags");
        assert_eq!(config.download_host, "http://127.0.0.1:1");
        assert_eq!(config.key_urls, vec!["http://127.0.0.1:1/k.key"]);
        assert_eq!(config.max_retries, 0);
    }
}
