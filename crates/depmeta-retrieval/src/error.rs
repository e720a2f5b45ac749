//! Error types for the retrieval pipeline.
//!
//! Three closed kinds: remote failures ([`FetchError`]), trust failures
//! ([`VerificationError`]) and local filesystem failures ([`IoError`]).
//! [`PipelineError`] ties one of them to the version and URL being processed.

use std::path::{Path, PathBuf};

/// Any failure talking to a remote endpoint.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// Connection, TLS or body transfer failure.
    #[error("request to {url} failed: {message}")]
    Request { url: String, message: String },

    /// Non-2xx response.
    #[error("request to {url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    /// The bounded request timeout elapsed.
    #[error("request to {url} timed out")]
    Timeout { url: String },

    /// The response envelope could not be decoded.
    #[error("failed to decode response from {url}: {message}")]
    Decode { url: String, message: String },

    /// HTTP client construction failed.
    #[error("failed to create HTTP client: {message}")]
    Client { message: String },
}

impl FetchError {
    pub(crate) fn from_reqwest(url: &str, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout {
                url: url.to_string(),
            }
        } else if err.is_decode() {
            Self::Decode {
                url: url.to_string(),
                message: err.to_string(),
            }
        } else {
            Self::Request {
                url: url.to_string(),
                message: err.to_string(),
            }
        }
    }

    /// URL of the failed request, if the failure belongs to one.
    pub fn url(&self) -> Option<&str> {
        match self {
            Self::Request { url, .. }
            | Self::Status { url, .. }
            | Self::Timeout { url }
            | Self::Decode { url, .. } => Some(url),
            Self::Client { .. } => None,
        }
    }

    /// Whether the error is transient and the request may be retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Request { .. } | Self::Timeout { .. } => true,
            Self::Status { status, .. } => *status == 429 || *status >= 500,
            Self::Decode { .. } | Self::Client { .. } => false,
        }
    }
}

/// The artifact could not be proven authentic.
#[derive(Debug, thiserror::Error)]
pub enum VerificationError {
    /// Verification was attempted with an empty trust set.
    #[error("no trusted keys provided")]
    NoKeys,

    /// A trusted key could not be parsed as an armored key ring.
    #[error("could not read armored key ring from {source_url}: {message}")]
    InvalidKey { source_url: String, message: String },

    /// The detached signature could not be parsed.
    #[error("could not read armored detached signature: {message}")]
    InvalidSignature { message: String },

    /// Every trusted key was tried and none validated the signature.
    #[error("no valid key found for {}", artifact.display())]
    NoValidKey { artifact: PathBuf },
}

/// Local filesystem failure.
#[derive(Debug, thiserror::Error)]
#[error("failed to {operation} {}: {source}", path.display())]
pub struct IoError {
    pub path: PathBuf,
    pub operation: &'static str,
    #[source]
    pub source: std::io::Error,
}

impl IoError {
    pub fn new(path: impl AsRef<Path>, operation: &'static str, source: std::io::Error) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            operation,
            source,
        }
    }
}

/// One of the three failure kinds of a synthesis step.
#[derive(Debug, thiserror::Error)]
pub enum ErrorKind {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Verification(#[from] VerificationError),

    #[error(transparent)]
    Io(#[from] IoError),
}

/// Failure to produce the record of one version.
///
/// Always carries the version and the artifact URL so operators can tell an
/// unreachable upstream from a forged or corrupted artifact.
#[derive(Debug, thiserror::Error)]
#[error("{version} ({url}): {kind}")]
pub struct PipelineError {
    pub version: String,
    pub url: String,
    pub kind: ErrorKind,
}

impl PipelineError {
    pub fn new(
        version: impl Into<String>,
        url: impl Into<String>,
        kind: impl Into<ErrorKind>,
    ) -> Self {
        Self {
            version: version.into(),
            url: url.into(),
            kind: kind.into(),
        }
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    pub fn is_verification_failure(&self) -> bool {
        matches!(self.kind, ErrorKind::Verification(_))
    }

    pub fn is_fetch_failure(&self) -> bool {
        matches!(self.kind, ErrorKind::Fetch(_))
    }

    /// Exit code for CLI.
    pub fn exit_code(&self) -> i32 {
        match self.kind {
            ErrorKind::Verification(_) => 3,
            ErrorKind::Fetch(_) | ErrorKind::Io(_) => 1,
        }
    }
}

/// Result type for fetch operations.
pub type FetchResult<T> = Result<T, FetchError>;
