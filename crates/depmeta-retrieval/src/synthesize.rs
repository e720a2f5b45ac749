//! Metadata synthesis for one version.
//!
//! # Steps
//!
//! 1. Load trusted keys
//! 2. Fetch artifact and detached signature
//! 3. Verify the signature (abort on failure)
//! 4. Compute the checksum
//! 5. Derive PURL, CPE and licenses
//!
//! Steps 4 and 5 only ever see artifacts that passed step 3. No partial
//! record is returned.

use std::path::Path;
use std::sync::Arc;

use semver::Version;
use tokio::task::JoinError;
use tracing::{debug, info};

use crate::client::HttpClient;
use crate::digest::{Checksummer, Sha256Checksummer};
use crate::error::{ErrorKind, FetchResult, IoError, PipelineError};
use crate::fetch::{ArtifactFetcher, ArtifactSource};
use crate::identifiers;
use crate::license::{LicenseScanner, TarballLicenseScanner};
use crate::trust::{KeySource, KeyStore, SigningKey};
use crate::types::{DependencyInfo, MetadataRecord, RecordFields, RetrievalConfig};
use crate::verify::{PgpVerifier, SignatureCheck};

/// Produces [`MetadataRecord`]s from upstream artifacts.
///
/// Every collaborator sits behind a trait object so tests can swap in fakes.
#[derive(Clone)]
pub struct Synthesizer {
    dependency: DependencyInfo,
    keys: Arc<dyn KeySource>,
    artifacts: Arc<dyn ArtifactSource>,
    verifier: Arc<dyn SignatureCheck>,
    checksummer: Arc<dyn Checksummer>,
    licenses: Arc<dyn LicenseScanner>,
}

impl std::fmt::Debug for Synthesizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Synthesizer")
            .field("dependency", &self.dependency)
            .finish_non_exhaustive()
    }
}

impl Synthesizer {
    /// Synthesizer wired to the real upstream endpoints of `config`.
    pub fn new(http: HttpClient, config: &RetrievalConfig) -> Self {
        Self {
            dependency: config.dependency.clone(),
            keys: Arc::new(KeyStore::new(http.clone(), config.key_urls.clone())),
            artifacts: Arc::new(ArtifactFetcher::new(http, config)),
            verifier: Arc::new(PgpVerifier),
            checksummer: Arc::new(Sha256Checksummer),
            licenses: Arc::new(TarballLicenseScanner::default()),
        }
    }

    pub fn with_key_source(mut self, keys: impl KeySource + 'static) -> Self {
        self.keys = Arc::new(keys);
        self
    }

    pub fn with_artifact_source(mut self, artifacts: impl ArtifactSource + 'static) -> Self {
        self.artifacts = Arc::new(artifacts);
        self
    }

    pub fn with_verifier(mut self, verifier: impl SignatureCheck + 'static) -> Self {
        self.verifier = Arc::new(verifier);
        self
    }

    pub fn with_checksummer(mut self, checksummer: impl Checksummer + 'static) -> Self {
        self.checksummer = Arc::new(checksummer);
        self
    }

    pub fn with_license_scanner(mut self, licenses: impl LicenseScanner + 'static) -> Self {
        self.licenses = Arc::new(licenses);
        self
    }

    pub fn dependency(&self) -> &DependencyInfo {
        &self.dependency
    }

    /// Download URL the record of `version` would point at.
    pub fn artifact_url(&self, version: &Version) -> String {
        self.artifacts.artifact_url(version)
    }

    /// Load the trusted key set once for sharing across syntheses.
    pub async fn load_keys(&self) -> FetchResult<Arc<[SigningKey]>> {
        Ok(self.keys.load_trusted_keys().await?.into())
    }

    /// Build the record of `version`, loading the trusted keys first.
    pub async fn synthesize(&self, version: &Version) -> Result<MetadataRecord, PipelineError> {
        let keys = self
            .load_keys()
            .await
            .map_err(|e| self.error(version, e.into()))?;
        self.synthesize_with_keys(version, &keys).await
    }

    /// Build the record of `version` against an already loaded key set.
    pub async fn synthesize_with_keys(
        &self,
        version: &Version,
        keys: &Arc<[SigningKey]>,
    ) -> Result<MetadataRecord, PipelineError> {
        let artifact = self
            .artifacts
            .fetch(version)
            .await
            .map_err(|e| self.error(version, e))?;
        let source = artifact.url().to_string();

        let verifier = Arc::clone(&self.verifier);
        let checksummer = Arc::clone(&self.checksummer);
        let scanner = Arc::clone(&self.licenses);
        let keys = Arc::clone(keys);
        let artifact_path = artifact.path().to_path_buf();

        // The artifact (and its scratch directory) is dropped inside the task.
        let task = tokio::task::spawn_blocking(move || -> Result<_, ErrorKind> {
            verifier.verify(artifact.signature(), artifact.path(), &keys)?;
            debug!(path = %artifact.path().display(), "signature verified");

            let checksum = checksummer.sum(artifact.path())?;
            let licenses = scanner.scan(artifact.path())?;
            Ok((checksum, licenses))
        });
        let (checksum, licenses) = joined(task.await, &artifact_path)
            .map_err(|e| PipelineError::new(version.to_string(), &source, e))?;

        let version = version.to_string();
        let record = MetadataRecord::new(RecordFields {
            purl: identifiers::purl(&self.dependency.id, &version, &checksum, &source),
            cpe: identifiers::cpe(&self.dependency, &version),
            id: self.dependency.id.clone(),
            name: self.dependency.name.clone(),
            source,
            source_sha256: checksum,
            licenses,
            deprecation_date: None,
            version,
        });

        info!(
            version = %record.version(),
            sha256 = %record.source_sha256(),
            "synthesized metadata"
        );
        Ok(record)
    }

    fn error(&self, version: &Version, kind: ErrorKind) -> PipelineError {
        PipelineError::new(version.to_string(), self.artifact_url(version), kind)
    }
}

/// Result of a blocking task. Panics are resumed; cancellation (runtime
/// shutdown) becomes an interrupted I/O error on `path`.
fn joined<T>(
    result: Result<Result<T, ErrorKind>, JoinError>,
    path: &Path,
) -> Result<T, ErrorKind> {
    match result {
        Ok(outcome) => outcome,
        Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
        Err(e) => Err(IoError::new(
            path,
            "process",
            std::io::Error::new(std::io::ErrorKind::Interrupted, e),
        )
        .into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{FetchError, IoError, VerificationError};
    use crate::fetch::FetchedArtifact;
    use crate::trust::PinnedKeys;
    use async_trait::async_trait;
    use std::path::{Path, PathBuf};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    const FIXTURES: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures");
    const SHA_1_2_3: &str = "2b437cdf4663fbd5779ebf3916d9b8ab3f92d29a9ef187494827d4b214de0930";

    /// Serves fixture tarballs from fresh temp dirs and remembers them.
    #[derive(Default)]
    struct FixtureArtifacts {
        scratch_dirs: Arc<Mutex<Vec<PathBuf>>>,
        fetches: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl ArtifactSource for FixtureArtifacts {
        fn artifact_url(&self, version: &Version) -> String {
            format!("https://nginx.test/download/nginx-{version}.tar.gz")
        }

        async fn fetch(&self, version: &Version) -> Result<FetchedArtifact, ErrorKind> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            let name = format!("nginx-{version}.tar.gz");
            let scratch = tempfile::tempdir().unwrap();
            let path = scratch.path().join(&name);
            std::fs::copy(Path::new(FIXTURES).join(&name), &path).unwrap();
            let signature =
                std::fs::read_to_string(Path::new(FIXTURES).join(format!("{name}.asc"))).unwrap();
            self.scratch_dirs
                .lock()
                .unwrap()
                .push(scratch.path().to_path_buf());
            Ok(FetchedArtifact::new(
                self.artifact_url(version),
                scratch,
                path,
                signature,
            ))
        }
    }

    struct RejectingVerifier;

    impl SignatureCheck for RejectingVerifier {
        fn verify(&self, _: &str, artifact: &Path, _: &[SigningKey]) -> Result<(), ErrorKind> {
            Err(VerificationError::NoValidKey {
                artifact: artifact.to_path_buf(),
            }
            .into())
        }
    }

    #[derive(Clone, Default)]
    struct SpyChecksummer {
        calls: Arc<AtomicUsize>,
    }

    impl Checksummer for SpyChecksummer {
        fn sum(&self, path: &Path) -> Result<String, IoError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Sha256Checksummer.sum(path)
        }
    }

    #[derive(Clone, Default)]
    struct SpyScanner {
        calls: Arc<AtomicUsize>,
    }

    impl LicenseScanner for SpyScanner {
        fn scan(&self, _: &Path) -> Result<Vec<String>, IoError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec!["BSD-2-Clause".to_string()])
        }
    }

    struct UnreachableKeys;

    #[async_trait]
    impl KeySource for UnreachableKeys {
        async fn load_trusted_keys(&self) -> FetchResult<Vec<SigningKey>> {
            Err(FetchError::Status {
                url: "https://nginx.test/keys/sb.key".to_string(),
                status: 503,
            })
        }
    }

    fn signer_keys() -> PinnedKeys {
        PinnedKeys::from_files(&[Path::new(FIXTURES).join("keys/signer.asc")]).unwrap()
    }

    fn synthesizer() -> Synthesizer {
        let config = RetrievalConfig::default();
        Synthesizer::new(HttpClient::new(&config).unwrap(), &config)
            .with_key_source(signer_keys())
            .with_artifact_source(FixtureArtifacts::default())
    }

    #[tokio::test]
    async fn test_synthesize_verified_artifact() {
        let record = synthesizer()
            .synthesize(&Version::new(1, 2, 3))
            .await
            .expect("synthesis failed");

        assert_eq!(record.version(), "1.2.3");
        assert_eq!(record.id(), "nginx");
        assert_eq!(record.name(), "NGINX");
        assert_eq!(
            record.source(),
            "https://nginx.test/download/nginx-1.2.3.tar.gz"
        );
        assert_eq!(record.source_sha256(), SHA_1_2_3);
        assert_eq!(record.licenses(), ["BSD-2-Clause"]);
        assert_eq!(
            record.purl(),
            format!(
                "pkg:generic/nginx@1.2.3?checksum={SHA_1_2_3}&download_url=https://nginx.test/download/nginx-1.2.3.tar.gz"
            )
        );
        assert_eq!(record.cpe(), "cpe:2.3:a:nginx:nginx:1.2.3:*:*:*:*:*:*:*");
        assert_eq!(record.deprecation_date(), None);
    }

    #[tokio::test]
    async fn test_no_checksum_or_license_after_verification_failure() {
        let checksummer = SpyChecksummer::default();
        let scanner = SpyScanner::default();

        let err = synthesizer()
            .with_verifier(RejectingVerifier)
            .with_checksummer(checksummer.clone())
            .with_license_scanner(scanner.clone())
            .synthesize(&Version::new(1, 2, 3))
            .await
            .unwrap_err();

        assert!(err.is_verification_failure(), "got {err}");
        assert_eq!(err.version, "1.2.3");
        assert_eq!(err.url, "https://nginx.test/download/nginx-1.2.3.tar.gz");
        assert_eq!(checksummer.calls.load(Ordering::SeqCst), 0);
        assert_eq!(scanner.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_checksum_and_license_run_after_successful_verification() {
        let checksummer = SpyChecksummer::default();
        let scanner = SpyScanner::default();

        synthesizer()
            .with_checksummer(checksummer.clone())
            .with_license_scanner(scanner.clone())
            .synthesize(&Version::new(1, 2, 4))
            .await
            .expect("synthesis failed");

        assert_eq!(checksummer.calls.load(Ordering::SeqCst), 1);
        assert_eq!(scanner.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_empty_trust_set_fails_verification() {
        let checksummer = SpyChecksummer::default();

        let err = synthesizer()
            .with_key_source(PinnedKeys::default())
            .with_checksummer(checksummer.clone())
            .synthesize(&Version::new(1, 2, 3))
            .await
            .unwrap_err();

        assert!(matches!(
            err.kind(),
            ErrorKind::Verification(VerificationError::NoKeys)
        ));
        assert_eq!(checksummer.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_key_load_failure_skips_fetch() {
        let artifacts = FixtureArtifacts::default();
        let fetches = Arc::clone(&artifacts.fetches);

        let err = synthesizer()
            .with_artifact_source(artifacts)
            .with_key_source(UnreachableKeys)
            .synthesize(&Version::new(1, 2, 3))
            .await
            .unwrap_err();

        assert!(err.is_fetch_failure());
        assert_eq!(err.url, "https://nginx.test/download/nginx-1.2.3.tar.gz");
        assert_eq!(fetches.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_scratch_removed_on_success_and_failure() {
        let artifacts = FixtureArtifacts::default();
        let dirs = Arc::clone(&artifacts.scratch_dirs);
        let synth = synthesizer().with_artifact_source(artifacts);

        synth.synthesize(&Version::new(1, 2, 3)).await.unwrap();
        synth
            .clone()
            .with_verifier(RejectingVerifier)
            .synthesize(&Version::new(1, 2, 4))
            .await
            .unwrap_err();

        let dirs = dirs.lock().unwrap();
        assert_eq!(dirs.len(), 2);
        for dir in dirs.iter() {
            assert!(!dir.exists(), "{} should be removed", dir.display());
        }
    }

    #[tokio::test]
    async fn test_cancelled_blocking_work_is_io_error() {
        let handle = tokio::spawn(std::future::pending::<Result<(), ErrorKind>>());
        handle.abort();
        let result = handle.await;
        assert!(result.as_ref().is_err_and(|e| e.is_cancelled()));

        let err = joined(result, Path::new("/tmp/nginx-1.2.3.tar.gz")).unwrap_err();
        match err {
            ErrorKind::Io(io) => {
                assert_eq!(io.operation, "process");
                assert_eq!(io.source.kind(), std::io::ErrorKind::Interrupted);
            }
            other => panic!("expected Io, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_blocking_outcome_passes_through() {
        let ok = tokio::task::spawn_blocking(|| Ok::<_, ErrorKind>(7)).await;
        assert_eq!(joined(ok, Path::new("/tmp/x")).unwrap(), 7);

        let failed = tokio::task::spawn_blocking(|| -> Result<(), ErrorKind> {
            Err(VerificationError::NoKeys.into())
        })
        .await;
        assert!(matches!(
            joined(failed, Path::new("/tmp/x")),
            Err(ErrorKind::Verification(VerificationError::NoKeys))
        ));
    }
}
