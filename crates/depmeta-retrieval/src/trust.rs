//! Trusted signing keys.
//!
//! The key set is loaded fresh on every run. A single failed key fetch fails
//! the whole load so verification never runs against a narrowed trust set.

use std::path::Path;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::client::HttpClient;
use crate::error::{FetchResult, IoError};

/// An armored OpenPGP public key (or key ring) and where it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SigningKey {
    source: String,
    armored: String,
}

impl SigningKey {
    pub fn new(source: impl Into<String>, armored: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            armored: armored.into(),
        }
    }

    /// Read a pinned key from a local file.
    pub fn from_file(path: &Path) -> Result<Self, IoError> {
        let armored =
            std::fs::read_to_string(path).map_err(|e| IoError::new(path, "read key file", e))?;
        Ok(Self::new(path.display().to_string(), armored))
    }

    /// URL or path the key was loaded from.
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn armored(&self) -> &str {
        &self.armored
    }
}

/// Source of the trusted key set.
#[async_trait]
pub trait KeySource: Send + Sync {
    /// The complete trusted key set, in check order.
    async fn load_trusted_keys(&self) -> FetchResult<Vec<SigningKey>>;
}

/// Fetches the trusted keys from a fixed list of URLs.
#[derive(Debug, Clone)]
pub struct KeyStore {
    http: HttpClient,
    key_urls: Vec<String>,
}

impl KeyStore {
    pub fn new(http: HttpClient, key_urls: Vec<String>) -> Self {
        Self { http, key_urls }
    }

    pub fn key_urls(&self) -> &[String] {
        &self.key_urls
    }
}

#[async_trait]
impl KeySource for KeyStore {
    async fn load_trusted_keys(&self) -> FetchResult<Vec<SigningKey>> {
        let mut keys = Vec::with_capacity(self.key_urls.len());
        for url in &self.key_urls {
            let armored = self.http.get_text(url).await?;
            debug!(url = %url, bytes = armored.len(), "fetched signing key");
            keys.push(SigningKey::new(url.clone(), armored));
        }
        info!(count = keys.len(), "loaded trusted keys");
        Ok(keys)
    }
}

/// Keys pinned locally instead of fetched.
#[derive(Debug, Clone, Default)]
pub struct PinnedKeys {
    keys: Vec<SigningKey>,
}

impl PinnedKeys {
    pub fn new(keys: Vec<SigningKey>) -> Self {
        Self { keys }
    }

    /// Load every file in `paths` as a pinned key.
    pub fn from_files<P: AsRef<Path>>(paths: &[P]) -> Result<Self, IoError> {
        let keys = paths
            .iter()
            .map(|p| SigningKey::from_file(p.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { keys })
    }
}

#[async_trait]
impl KeySource for PinnedKeys {
    async fn load_trusted_keys(&self) -> FetchResult<Vec<SigningKey>> {
        Ok(self.keys.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FetchError;
    use crate::types::RetrievalConfig;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn store(uri: &str, names: &[&str]) -> KeyStore {
        let config = RetrievalConfig::default().with_max_retries(0);
        let urls = names
            .iter()
            .map(|n| format!("{uri}/keys/{n}.key"))
            .collect();
        KeyStore::new(HttpClient::new(&config).unwrap(), urls)
    }

    #[tokio::test]
    async fn test_load_keeps_configured_order() {
        let mock_server = MockServer::start().await;

        for name in ["mdounin", "maxim", "sb", "thresh"] {
            Mock::given(method("GET"))
                .and(path(format!("/keys/{name}.key")))
                .respond_with(ResponseTemplate::new(200).set_body_string(format!("key-{name}")))
                .mount(&mock_server)
                .await;
        }

        let keys = store(&mock_server.uri(), &["mdounin", "maxim", "sb", "thresh"])
            .load_trusted_keys()
            .await
            .expect("load failed");

        let armored: Vec<_> = keys.iter().map(SigningKey::armored).collect();
        assert_eq!(armored, ["key-mdounin", "key-maxim", "key-sb", "key-thresh"]);
        assert!(keys[2].source().ends_with("/keys/sb.key"));
    }

    #[tokio::test]
    async fn test_single_failure_aborts_load() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/keys/mdounin.key"))
            .respond_with(ResponseTemplate::new(200).set_body_string("key"))
            .mount(&mock_server)
            .await;

        Mock::given(method("GET"))
            .and(path("/keys/maxim.key"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&mock_server)
            .await;

        let err = store(&mock_server.uri(), &["mdounin", "maxim"])
            .load_trusted_keys()
            .await
            .unwrap_err();

        match err {
            FetchError::Status { url, status } => {
                assert_eq!(status, 404);
                assert!(url.ends_with("/keys/maxim.key"));
            }
            other => panic!("expected Status, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_pinned_keys_from_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("signer.asc");
        std::fs::write(&path, "-----BEGIN PGP PUBLIC KEY BLOCK-----").unwrap();

        let pinned = PinnedKeys::from_files(&[&path]).unwrap();
        let keys = pinned.load_trusted_keys().await.unwrap();
        assert_eq!(keys.len(), 1);
        assert_eq!(keys[0].source(), path.display().to_string());

        let missing = PinnedKeys::from_files(&[dir.path().join("missing.asc")]);
        assert!(missing.is_err());
    }
}
