//! Batch driver: catalog → filter → bounded parallel synthesis.
//!
//! A failed version is reported and never blocks the others. Only a catalog
//! or trust-set failure aborts the whole batch.

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use semver::{Version, VersionReq};
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::catalog::VersionCatalog;
use crate::error::{FetchResult, IoError, PipelineError};
use crate::synthesize::Synthesizer;
use crate::types::{MetadataRecord, TargetedRecord};

/// Default number of syntheses in flight.
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Version selection and scheduling options.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Versions whose metadata already exists downstream.
    pub known_versions: BTreeSet<Version>,

    /// Only versions matching this requirement are synthesized.
    pub constraint: Option<VersionReq>,

    /// Keep only the newest N candidates.
    pub newest: Option<usize>,

    /// Maximum syntheses in flight.
    pub concurrency: usize,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            known_versions: BTreeSet::new(),
            constraint: None,
            newest: None,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }
}

/// Outcome of one batch.
#[derive(Debug, Default)]
pub struct PipelineReport {
    /// Records in ascending version order.
    pub records: Vec<MetadataRecord>,

    /// Per-version failures in ascending version order.
    pub failures: Vec<PipelineError>,
}

impl PipelineReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    /// One entry per (record, target) pair, in record order.
    pub fn targeted(&self, targets: &[String]) -> Vec<TargetedRecord> {
        self.records
            .iter()
            .flat_map(|record| {
                targets.iter().map(move |target| TargetedRecord {
                    record: record.clone(),
                    target: target.clone(),
                })
            })
            .collect()
    }
}

/// Drives metadata generation for every new upstream version.
#[derive(Debug, Clone)]
pub struct Pipeline {
    catalog: VersionCatalog,
    synthesizer: Synthesizer,
}

impl Pipeline {
    pub fn new(catalog: VersionCatalog, synthesizer: Synthesizer) -> Self {
        Self {
            catalog,
            synthesizer,
        }
    }

    pub async fn run(&self, options: &PipelineOptions) -> FetchResult<PipelineReport> {
        let available = self.catalog.list_versions().await?;
        let selected = select_versions(available, options);
        info!(count = selected.len(), "versions selected for synthesis");

        if selected.is_empty() {
            return Ok(PipelineReport::default());
        }

        let keys = self.synthesizer.load_keys().await?;
        Ok(self
            .synthesize_all(selected, &keys, options.concurrency)
            .await)
    }

    async fn synthesize_all(
        &self,
        versions: Vec<Version>,
        keys: &Arc<[crate::trust::SigningKey]>,
        concurrency: usize,
    ) -> PipelineReport {
        let synthesizer = &self.synthesizer;

        let mut outcomes: Vec<(Version, Result<MetadataRecord, PipelineError>)> =
            stream::iter(versions)
                .map(|version| async move {
                    let outcome = synthesizer.synthesize_with_keys(&version, keys).await;
                    (version, outcome)
                })
                .buffer_unordered(concurrency.max(1))
                .collect()
                .await;
        outcomes.sort_by(|a, b| a.0.cmp(&b.0));

        let mut report = PipelineReport::default();
        for (_, outcome) in outcomes {
            match outcome {
                Ok(record) => report.records.push(record),
                Err(e) => {
                    warn!(version = %e.version, url = %e.url, error = %e.kind, "synthesis failed");
                    report.failures.push(e);
                }
            }
        }
        report
    }
}

/// Apply known-version, constraint and newest-N filters. Ascending order.
pub fn select_versions(available: Vec<Version>, options: &PipelineOptions) -> Vec<Version> {
    let mut selected: Vec<Version> = available
        .into_iter()
        .filter(|v| !options.known_versions.contains(v))
        .filter(|v| options.constraint.as_ref().map_or(true, |req| req.matches(v)))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    if let Some(n) = options.newest {
        let skip = selected.len().saturating_sub(n);
        selected.drain(..skip);
    }
    selected
}

/// Entries of a previous metadata output: any JSON array of objects.
pub fn load_known_entries(path: &Path) -> Result<Vec<Value>, IoError> {
    let text = std::fs::read_to_string(path).map_err(|e| IoError::new(path, "read", e))?;
    serde_json::from_str(&text).map_err(|e| {
        IoError::new(
            path,
            "parse",
            std::io::Error::new(std::io::ErrorKind::InvalidData, e),
        )
    })
}

/// Versions named by the `version` field of `entries`. Entries without a
/// parsable version are ignored.
pub fn known_versions(entries: &[Value]) -> BTreeSet<Version> {
    entries
        .iter()
        .filter_map(|entry| entry.get("version")?.as_str())
        .filter_map(|version| Version::parse(version).ok())
        .collect()
}

/// Versions listed in a previous metadata output.
pub fn load_known_versions(path: &Path) -> Result<BTreeSet<Version>, IoError> {
    Ok(known_versions(&load_known_entries(path)?))
}

/// Write entries as pretty JSON.
pub fn write_output<T: Serialize>(path: &Path, entries: &[T]) -> Result<(), IoError> {
    let json = serde_json::to_string_pretty(entries).map_err(|e| {
        IoError::new(
            path,
            "serialize",
            std::io::Error::new(std::io::ErrorKind::InvalidData, e),
        )
    })?;
    std::fs::write(path, json).map_err(|e| IoError::new(path, "write", e))
}
