//! Content checksums.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use sha2::{Digest, Sha256};

use crate::error::IoError;

/// Computes the checksum of a local file.
pub trait Checksummer: Send + Sync {
    /// Lowercase hex SHA-256 of the file's bytes.
    fn sum(&self, path: &Path) -> Result<String, IoError>;
}

/// SHA-256 over the full file content.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sha256Checksummer;

impl Checksummer for Sha256Checksummer {
    fn sum(&self, path: &Path) -> Result<String, IoError> {
        let file = File::open(path).map_err(|e| IoError::new(path, "open", e))?;
        sha256_hex_reader(file).map_err(|e| IoError::new(path, "read", e))
    }
}

pub(crate) fn sha256_hex_reader<R: Read>(mut reader: R) -> std::io::Result<String> {
    let mut hasher = Sha256::new();
    let mut buf = [0_u8; 8192];

    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }

    Ok(hex::encode(hasher.finalize()))
}

#[cfg(test)]
pub(crate) fn sha256_hex_bytes(bytes: &[u8]) -> String {
    sha256_hex_reader(std::io::Cursor::new(bytes)).unwrap()
}
