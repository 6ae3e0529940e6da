//! Content Digests
//!
//! SHA-512 over the canonical JSON form of arbitrary data. Strings are
//! hashed as their raw bytes rather than as a quoted JSON string.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha512};

use crate::canonical::{canonical_string, to_value};
use crate::error::Result;

/// Hex SHA-512 of any serializable value
pub fn digest<T: Serialize + ?Sized>(data: &T) -> Result<String> {
    Ok(digest_value(&to_value(data)?))
}

/// Hex SHA-512 of a JSON tree
pub fn digest_value(value: &Value) -> String {
    match value {
        Value::String(s) => sha512_hex(s.as_bytes()),
        other => sha512_hex(canonical_string(other).as_bytes()),
    }
}

fn sha512_hex(data: &[u8]) -> String {
    let mut hasher = Sha512::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Result of comparing data against an expected digest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DigestCheck {
    pub is_valid: bool,
    pub current_digest: String,
    pub expected_digest: String,
}

/// Recompute the digest of `data` and compare it exactly with `expected_digest`.
/// A mismatch is a normal result, not an error.
pub fn verify<T: Serialize + ?Sized>(data: &T, expected_digest: &str) -> Result<DigestCheck> {
    let current_digest = digest(data)?;
    Ok(DigestCheck {
        is_valid: current_digest == expected_digest,
        current_digest,
        expected_digest: expected_digest.to_string(),
    })
}
