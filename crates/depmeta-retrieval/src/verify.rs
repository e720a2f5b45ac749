//! Detached OpenPGP signature verification.
//!
//! Any-of-N trust model: the artifact is authentic if at least one trusted key
//! validates the signature. A key that parses but does not validate is logged
//! and skipped; a key that does not parse is a configuration error and fails
//! the whole verification.

use std::io::Cursor;
use std::path::Path;

use pgp::composed::{Deserializable, SignedPublicKey, StandaloneSignature};
use tracing::{debug, info, warn};

use crate::error::{ErrorKind, IoError, VerificationError};
use crate::trust::SigningKey;

/// Checks a detached signature over an artifact file.
pub trait SignatureCheck: Send + Sync {
    fn verify(&self, signature: &str, artifact: &Path, keys: &[SigningKey])
        -> Result<(), ErrorKind>;
}

/// OpenPGP verifier backed by rPGP.
#[derive(Debug, Clone, Copy, Default)]
pub struct PgpVerifier;

impl SignatureCheck for PgpVerifier {
    fn verify(
        &self,
        signature: &str,
        artifact: &Path,
        keys: &[SigningKey],
    ) -> Result<(), ErrorKind> {
        if keys.is_empty() {
            return Err(VerificationError::NoKeys.into());
        }

        let data = std::fs::read(artifact).map_err(|e| IoError::new(artifact, "read", e))?;

        match verify_detached(signature, &data, keys)? {
            Some(source) => {
                info!(artifact = %artifact.display(), key = %source, "found valid pgp key");
                Ok(())
            }
            None => Err(VerificationError::NoValidKey {
                artifact: artifact.to_path_buf(),
            }
            .into()),
        }
    }
}

/// Verify `signature` over `data` against `keys` in order.
///
/// Returns the source of the first key that validates, or `None` when every
/// key was tried without success.
pub fn verify_detached<'k>(
    signature: &str,
    data: &[u8],
    keys: &'k [SigningKey],
) -> Result<Option<&'k str>, VerificationError> {
    if keys.is_empty() {
        return Err(VerificationError::NoKeys);
    }

    let (signature, _) = StandaloneSignature::from_string(signature).map_err(|e| {
        VerificationError::InvalidSignature {
            message: e.to_string(),
        }
    })?;

    for key in keys {
        let ring = parse_key_ring(key)?;

        match check_ring(&signature, &ring, data) {
            Ok(()) => return Ok(Some(key.source())),
            Err(reason) => {
                warn!(key = %key.source(), reason = %reason, "failed to check signature");
            }
        }
    }

    Ok(None)
}

/// Parse an armored block holding one or more public keys.
fn parse_key_ring(key: &SigningKey) -> Result<Vec<SignedPublicKey>, VerificationError> {
    let invalid = |message: String| VerificationError::InvalidKey {
        source_url: key.source().to_string(),
        message,
    };

    let (keys, _) = SignedPublicKey::from_armor_many(Cursor::new(key.armored().as_bytes()))
        .map_err(|e| invalid(e.to_string()))?;
    let ring = keys
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| invalid(e.to_string()))?;

    if ring.is_empty() {
        return Err(invalid("armored block contains no public keys".to_string()));
    }
    Ok(ring)
}

/// Try the primary key and every subkey of every key in the ring.
fn check_ring(
    signature: &StandaloneSignature,
    ring: &[SignedPublicKey],
    data: &[u8],
) -> Result<(), String> {
    let mut last_error = String::from("no usable key material");

    for public_key in ring {
        match signature.verify(public_key, data) {
            Ok(()) => return Ok(()),
            Err(e) => last_error = e.to_string(),
        }

        for subkey in &public_key.public_subkeys {
            match signature.verify(subkey, data) {
                Ok(()) => {
                    debug!("signature validated by subkey");
                    return Ok(());
                }
                Err(e) => last_error = e.to_string(),
            }
        }
    }

    Err(last_error)
}
