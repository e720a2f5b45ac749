//! License discovery inside verified source tarballs.
//!
//! Upstream archives wrap everything in a single `<id>-<version>/` directory,
//! so extraction strips one leading path component before scanning.

use std::collections::BTreeSet;
use std::fs::File;
use std::path::{Component, Path, PathBuf};

use flate2::read::GzDecoder;
use tracing::debug;

use crate::error::IoError;

/// File name prefixes that mark a license file (compared case-insensitively).
const LICENSE_FILE_PREFIXES: &[&str] = &["license", "licence", "copying", "copyright"];

/// Derives license identifiers from an artifact.
pub trait LicenseScanner: Send + Sync {
    fn scan(&self, archive: &Path) -> Result<Vec<String>, IoError>;
}

/// Extracts a `.tar.gz` and classifies its top-level license files.
#[derive(Debug, Clone, Copy)]
pub struct TarballLicenseScanner {
    strip_components: usize,
}

impl Default for TarballLicenseScanner {
    fn default() -> Self {
        Self {
            strip_components: 1,
        }
    }
}

impl LicenseScanner for TarballLicenseScanner {
    fn scan(&self, archive: &Path) -> Result<Vec<String>, IoError> {
        let dest = tempfile::Builder::new()
            .prefix("license-scan-")
            .tempdir()
            .map_err(|e| IoError::new(std::env::temp_dir(), "create scratch directory in", e))?;

        decompress(archive, dest.path(), self.strip_components)?;
        let licenses = scan_directory(dest.path())?;
        debug!(archive = %archive.display(), licenses = ?licenses, "scanned licenses");
        Ok(licenses)
    }
}

/// Extract a gzip'd tar into `dest`, dropping `strip` leading path components.
///
/// Only directories and regular files are extracted. Entries whose remaining
/// path would leave `dest` are skipped.
pub fn decompress(archive: &Path, dest: &Path, strip: usize) -> Result<(), IoError> {
    let file = File::open(archive).map_err(|e| IoError::new(archive, "open", e))?;
    let mut tar = tar::Archive::new(GzDecoder::new(file));

    let entries = tar
        .entries()
        .map_err(|e| IoError::new(archive, "decompress", e))?;

    for entry in entries {
        let mut entry = entry.map_err(|e| IoError::new(archive, "decompress", e))?;
        let raw = entry
            .path()
            .map_err(|e| IoError::new(archive, "decompress", e))?
            .into_owned();

        let Some(relative) = stripped_path(&raw, strip) else {
            continue;
        };
        let target = dest.join(&relative);

        let kind = entry.header().entry_type();
        if kind.is_dir() {
            std::fs::create_dir_all(&target).map_err(|e| IoError::new(&target, "create", e))?;
        } else if kind.is_file() {
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| IoError::new(parent, "create", e))?;
            }
            entry
                .unpack(&target)
                .map_err(|e| IoError::new(&target, "extract", e))?;
        } else {
            debug!(path = %raw.display(), "skipping non-regular archive entry");
        }
    }

    Ok(())
}

fn stripped_path(path: &Path, strip: usize) -> Option<PathBuf> {
    let mut out = PathBuf::new();
    for component in path.components().skip(strip) {
        match component {
            Component::Normal(part) => out.push(part),
            Component::CurDir => {}
            _ => return None,
        }
    }
    if out.as_os_str().is_empty() {
        None
    } else {
        Some(out)
    }
}

/// Classify every license file at the top of `dir`. Sorted, deduplicated.
pub fn scan_directory(dir: &Path) -> Result<Vec<String>, IoError> {
    let mut found = BTreeSet::new();

    let read_dir = std::fs::read_dir(dir).map_err(|e| IoError::new(dir, "list", e))?;
    for entry in read_dir {
        let entry = entry.map_err(|e| IoError::new(dir, "list", e))?;
        let path = entry.path();
        if !path.is_file() || !is_license_file(&entry.file_name().to_string_lossy()) {
            continue;
        }

        let bytes = std::fs::read(&path).map_err(|e| IoError::new(&path, "read", e))?;
        let text = String::from_utf8_lossy(&bytes);
        found.extend(detect_licenses(&text));
    }

    Ok(found.into_iter().map(String::from).collect())
}

fn is_license_file(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    LICENSE_FILE_PREFIXES
        .iter()
        .any(|prefix| lower.starts_with(prefix))
}

/// SPDX identifiers recognized in a license text.
pub fn detect_licenses(text: &str) -> Vec<&'static str> {
    let text = normalize(text);
    let has = |needle: &str| text.contains(needle);
    let mut ids = Vec::new();

    if has("apache license") && has("version 2 0") {
        ids.push("Apache-2.0");
    }
    if has("mozilla public license") && has("2 0") {
        ids.push("MPL-2.0");
    }
    if has("gnu general public license") && !has("lesser general public license") {
        if has("version 3") {
            ids.push("GPL-3.0");
        } else if has("version 2") {
            ids.push("GPL-2.0");
        }
    }
    if has("permission is hereby granted free of charge") {
        ids.push("MIT");
    }
    if has("permission to use copy modify and or distribute this software for any purpose") {
        ids.push("ISC");
    }
    if has("redistribution and use in source and binary forms") {
        if has("neither the name") || has("endorse or promote products") {
            ids.push("BSD-3-Clause");
        } else {
            ids.push("BSD-2-Clause");
        }
    }

    ids
}

/// Lowercase, punctuation and comment markers collapsed to single spaces.
fn normalize(text: &str) -> String {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}
