//! Schema fingerprints.
//!
//! A fingerprint is a short, stable label for a schema snapshot, used in
//! logs and metrics so two versions can be told apart at a glance. Change
//! detection itself compares the full snapshot bytes.

use sha2::{Digest, Sha256};

/// Hex-encoded first 8 bytes of the SHA-256 of `snapshot`.
pub fn compute_fingerprint(snapshot: &[u8]) -> String {
    let digest = Sha256::digest(snapshot);
    hex::encode(&digest[..8])
}

/// First 8 hex chars of the fingerprint, for display.
pub fn compute_short_fingerprint(snapshot: &[u8]) -> String {
    let full = compute_fingerprint(snapshot);
    full.chars().take(8).collect()
}
