//! Content hashing for dataset fingerprints
//!
//! A reload of byte-identical tree data is detected by comparing fingerprints,
//! so the full digest is kept. Log lines use the short form.

use sha2::{Digest, Sha256};

/// Hex encoded SHA-256 of `content`.
pub fn content_hash(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    hex::encode(hasher.finalize())
}

/// First 8 hex characters of a fingerprint, for display.
pub fn short(fingerprint: &str) -> &str {
    fingerprint.get(..8).unwrap_or(fingerprint)
}
