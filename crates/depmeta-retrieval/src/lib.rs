//! Upstream dependency retrieval and metadata synthesis.
//!
//! This crate discovers upstream release versions, downloads release tarballs,
//! verifies their detached OpenPGP signatures against a trusted key set and
//! produces one [`MetadataRecord`] per version:
//!
//! - Version discovery from the upstream tag listing
//! - Trusted key loading (all-or-nothing)
//! - Any-of-N detached signature verification
//! - SHA-256 checksums, package-URL and CPE identifiers
//! - License detection from the verified tarball
//! - Bounded-concurrency batch driver with per-version failure isolation
//!
//! # Quick Start
//!
//! ```no_run
//! use depmeta_retrieval::{HttpClient, RetrievalConfig, Synthesizer};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = RetrievalConfig::from_env();
//! let synthesizer = Synthesizer::new(HttpClient::new(&config)?, &config);
//!
//! let record = synthesizer.synthesize(&semver::Version::new(1, 25, 3)).await?;
//! println!("{} {}", record.source(), record.source_sha256());
//! # Ok(())
//! # }
//! ```
//!
//! # Configuration
//!
//! | Environment Variable | Description |
//! |---------------------|-------------|
//! | `DEPMETA_TAGS_URL` | Tag listing endpoint (default: GitHub `nginx/nginx` tags) |
//! | `DEPMETA_DOWNLOAD_HOST` | Distribution host (default: `https://nginx.org`) |
//! | `DEPMETA_KEY_URLS` | Comma-separated trusted key URLs |
//! | `DEPMETA_TIMEOUT` | Request timeout in seconds (default: 30) |
//! | `DEPMETA_MAX_RETRIES` | Max retries for transient failures (default: 3) |

pub mod catalog;
pub mod client;
pub mod digest;
pub mod error;
pub mod fetch;
pub mod identifiers;
pub mod license;
pub mod pipeline;
pub mod synthesize;
pub mod trust;
pub mod types;
pub mod verify;

// Re-export main types
pub use catalog::{parse_tag, versions_from_tags, TagEntry, VersionCatalog};
pub use client::{HttpClient, USER_AGENT_VALUE};
pub use digest::{Checksummer, Sha256Checksummer};
pub use error::{ErrorKind, FetchError, FetchResult, IoError, PipelineError, VerificationError};
pub use fetch::{ArtifactFetcher, ArtifactSource, FetchedArtifact};
pub use license::{LicenseScanner, TarballLicenseScanner};
pub use pipeline::{
    known_versions, load_known_entries, load_known_versions, select_versions, write_output,
    Pipeline, PipelineOptions, PipelineReport, DEFAULT_CONCURRENCY,
};
pub use synthesize::Synthesizer;
pub use trust::{KeySource, KeyStore, PinnedKeys, SigningKey};
pub use types::{DependencyInfo, MetadataRecord, RetrievalConfig, TargetedRecord};
pub use verify::{verify_detached, PgpVerifier, SignatureCheck};
