//! Release artifact download.
//!
//! Every fetch gets its own scratch directory. The directory lives exactly as
//! long as the returned [`FetchedArtifact`].

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use semver::Version;
use tempfile::TempDir;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::client::HttpClient;
use crate::error::{ErrorKind, FetchError, IoError};
use crate::types::RetrievalConfig;

/// A downloaded tarball and its detached signature.
#[derive(Debug)]
pub struct FetchedArtifact {
    url: String,
    path: PathBuf,
    signature: String,
    scratch: TempDir,
}

impl FetchedArtifact {
    /// `path` must live inside `scratch`.
    pub fn new(url: String, scratch: TempDir, path: PathBuf, signature: String) -> Self {
        Self {
            url,
            path,
            signature,
            scratch,
        }
    }

    /// URL the artifact bytes were downloaded from.
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Armored detached signature text.
    pub fn signature(&self) -> &str {
        &self.signature
    }

    pub fn scratch_dir(&self) -> &Path {
        self.scratch.path()
    }

    /// Retain the scratch directory on disk (for debugging) and return it.
    pub fn keep(self) -> PathBuf {
        self.scratch.keep()
    }
}

/// Source of release artifacts.
#[async_trait]
pub trait ArtifactSource: Send + Sync {
    /// Canonical download URL of `version`'s tarball.
    fn artifact_url(&self, version: &Version) -> String;

    async fn fetch(&self, version: &Version) -> Result<FetchedArtifact, ErrorKind>;
}

/// Downloads `<host>/download/<id>-<version>.tar.gz` and its `.asc`.
#[derive(Debug, Clone)]
pub struct ArtifactFetcher {
    http: HttpClient,
    download_host: String,
    dependency_id: String,
}

impl ArtifactFetcher {
    pub fn new(http: HttpClient, config: &RetrievalConfig) -> Self {
        Self {
            http,
            download_host: config.download_host.trim_end_matches('/').to_string(),
            dependency_id: config.dependency.id.clone(),
        }
    }

    fn file_name(&self, version: &Version) -> String {
        format!("{}-{version}.tar.gz", self.dependency_id)
    }

    async fn download(&self, url: &str, dest: &Path) -> Result<u64, ErrorKind> {
        let mut response = self.http.get(url).await?;

        let mut file = tokio::fs::File::create(dest)
            .await
            .map_err(|e| IoError::new(dest, "create", e))?;

        let mut written = 0_u64;
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| FetchError::from_reqwest(url, e))?
        {
            file.write_all(&chunk)
                .await
                .map_err(|e| IoError::new(dest, "write", e))?;
            written += chunk.len() as u64;
        }

        file.flush()
            .await
            .map_err(|e| IoError::new(dest, "flush", e))?;

        Ok(written)
    }
}

#[async_trait]
impl ArtifactSource for ArtifactFetcher {
    fn artifact_url(&self, version: &Version) -> String {
        format!("{}/download/{}", self.download_host, self.file_name(version))
    }

    async fn fetch(&self, version: &Version) -> Result<FetchedArtifact, ErrorKind> {
        let url = self.artifact_url(version);

        let scratch = tempfile::Builder::new()
            .prefix(&format!("{}-", self.dependency_id))
            .tempdir()
            .map_err(|e| IoError::new(std::env::temp_dir(), "create scratch directory in", e))?;
        let path = scratch.path().join(self.file_name(version));

        let bytes = self.download(&url, &path).await?;
        debug!(url = %url, path = %path.display(), bytes, "downloaded artifact");

        let signature_url = format!("{url}.asc");
        let signature = self.http.get_text(&signature_url).await?;
        debug!(url = %signature_url, "downloaded detached signature");

        Ok(FetchedArtifact::new(url, scratch, path, signature))
    }
}
