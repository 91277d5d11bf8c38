// crates/autobuildr-core/src/core/hashing.rs
// ============================================================================
// Module: AutoBuildr Content Hashing
// Description: SHA-256 content hashing and RFC 8785 JSON canonicalization.
// Purpose: Provide deterministic hashes for artifact content and payloads.
// Dependencies: serde, serde_jcs, sha2
// ============================================================================

//! ## Overview
//! Artifact content is addressed by the SHA-256 of its raw bytes, rendered as
//! a 64-character lowercase hex string. Structured payloads are hashed via
//! RFC 8785 (JCS) canonical JSON so digests stay stable across serializer
//! field-order differences.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use sha2::Digest;
use sha2::Sha256;
use thiserror::Error;

// ============================================================================
// SECTION: Content Hash
// ============================================================================

/// SHA-256 content hash in lowercase hex form.
///
/// # Invariants
/// - Always exactly 64 lowercase hex characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentHash(String);

impl ContentHash {
    /// Computes the hash of raw bytes.
    #[must_use]
    pub fn of_bytes(bytes: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        Self(hex_encode(&hasher.finalize()))
    }

    /// Wraps an already-computed lowercase hex digest.
    ///
    /// # Errors
    ///
    /// Returns [`HashError::MalformedDigest`] when the value is not
    /// 64 lowercase hex characters.
    pub fn from_hex(value: impl Into<String>) -> Result<Self, HashError> {
        let value = value.into();
        let well_formed =
            value.len() == 64 && value.bytes().all(|b| b.is_ascii_hexdigit() && !b.is_ascii_uppercase());
        if well_formed {
            Ok(Self(value))
        } else {
            Err(HashError::MalformedDigest(value))
        }
    }

    /// Returns the digest as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised by hashing helpers.
#[derive(Debug, Error)]
pub enum HashError {
    /// JSON canonicalization failed.
    #[error("failed to canonicalize json: {0}")]
    Canonicalization(String),
    /// A stored digest did not parse as 64 lowercase hex characters.
    #[error("malformed sha-256 digest: {0}")]
    MalformedDigest(String),
}

// ============================================================================
// SECTION: Hashing Helpers
// ============================================================================

/// Returns canonical JSON bytes for a serializable value using RFC 8785.
///
/// # Errors
///
/// Returns [`HashError::Canonicalization`] when serialization fails.
pub fn canonical_json_bytes<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, HashError> {
    serde_jcs::to_vec(value).map_err(|err| HashError::Canonicalization(err.to_string()))
}

/// Hashes a serializable value over its canonical JSON form.
///
/// # Errors
///
/// Returns [`HashError::Canonicalization`] when serialization fails.
pub fn hash_canonical_json<T: Serialize + ?Sized>(value: &T) -> Result<ContentHash, HashError> {
    let bytes = canonical_json_bytes(value)?;
    Ok(ContentHash::of_bytes(&bytes))
}

/// Encodes bytes as a lowercase hex string.
fn hex_encode(bytes: &[u8]) -> String {
    const HEX: &[u8; 16] = b"0123456789abcdef";
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        out.push(HEX[(byte >> 4) as usize] as char);
        out.push(HEX[(byte & 0x0f) as usize] as char);
    }
    out
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(
        clippy::unwrap_used,
        clippy::missing_docs_in_private_items,
        reason = "Test-only assertions and helpers are permitted."
    )]

    use super::*;

    #[test]
    fn empty_content_hashes_to_known_digest() {
        let hash = ContentHash::of_bytes(b"");
        assert_eq!(
            hash.as_str(),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn canonical_json_is_field_order_independent() {
        let a = serde_json::json!({"b": 1, "a": 2});
        let b = serde_json::json!({"a": 2, "b": 1});
        assert_eq!(hash_canonical_json(&a).unwrap(), hash_canonical_json(&b).unwrap());
    }

    #[test]
    fn from_hex_rejects_malformed_digests() {
        assert!(ContentHash::from_hex("abc").is_err());
        assert!(ContentHash::from_hex("G".repeat(64)).is_err());
        let valid = ContentHash::of_bytes(b"x");
        assert!(ContentHash::from_hex(valid.as_str()).is_ok());
    }
}
