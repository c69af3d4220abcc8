//! Content hashes for change detection.

use serde_json::Value;
use sha2::{Digest, Sha256};

/// Hex SHA-256 of raw bytes.
pub fn checksum(bytes: impl AsRef<[u8]>) -> String {
    hex::encode(Sha256::digest(bytes.as_ref()))
}

/// Hex SHA-256 of a JSON value's canonical form.
///
/// Object keys serialize in sorted order, so two payloads differing only in
/// key order hash the same.
pub fn canonical_checksum(value: &Value) -> String {
    checksum(value.to_string())
}
