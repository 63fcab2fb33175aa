//! Declaration: a signed, hash-linked assertion setting one dimension
//!
//! Canonical encoding (big-endian, fixed order, version 1):
//!
//! | field                      | bytes    |
//! |----------------------------|----------|
//! | encoding version (`0x01`)  | 1        |
//! | index (u32)                | 4        |
//! | value × 10000 (u64)        | 8        |
//! | timestamp, unix secs (i64) | 8        |
//! | previous_hash              | 32       |
//! | content length (u32)       | 4        |
//! | content (UTF-8)            | variable |
//!
//! The declaration hash is SHA-256 of these bytes. The signature covers the
//! same bytes and is not itself hashed.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::{ENCODING_VERSION, VALUE_SCALE};

/// Size of the fixed-width prefix of the canonical encoding
pub const CANONICAL_HEADER_LEN: usize = 1 + 4 + 8 + 8 + 32 + 4;

/// Immutable declaration. Built by `core::chain::create_declaration`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Declaration {
    index: usize,
    /// Value in fixed point (× `VALUE_SCALE`)
    value: u64,
    timestamp: i64,
    #[serde(with = "hex::serde")]
    previous_hash: [u8; 32],
    #[serde(with = "hex::serde")]
    signature: [u8; 64],
    content: String,
}

impl Declaration {
    pub(crate) fn new(
        index: usize,
        value: u64,
        timestamp: i64,
        previous_hash: [u8; 32],
        content: String,
        signature: [u8; 64],
    ) -> Self {
        Self {
            index,
            value,
            timestamp,
            previous_hash,
            signature,
            content,
        }
    }

    /// Canonical bytes for an unsigned declaration
    pub fn encode(
        index: usize,
        value: u64,
        timestamp: i64,
        previous_hash: &[u8; 32],
        content: &str,
    ) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(CANONICAL_HEADER_LEN + content.len());
        bytes.push(ENCODING_VERSION);
        bytes.extend_from_slice(&(index as u32).to_be_bytes());
        bytes.extend_from_slice(&value.to_be_bytes());
        bytes.extend_from_slice(&timestamp.to_be_bytes());
        bytes.extend_from_slice(previous_hash);
        bytes.extend_from_slice(&(content.len() as u32).to_be_bytes());
        bytes.extend_from_slice(content.as_bytes());
        bytes
    }

    /// Canonical bytes (what is hashed and signed)
    pub fn canonical_bytes(&self) -> Vec<u8> {
        Self::encode(
            self.index,
            self.value,
            self.timestamp,
            &self.previous_hash,
            &self.content,
        )
    }

    /// SHA-256 of the canonical bytes
    pub fn hash(&self) -> [u8; 32] {
        sha256(&self.canonical_bytes())
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// Value in [0, 1]
    pub fn value(&self) -> f64 {
        self.value as f64 / VALUE_SCALE as f64
    }

    /// Value in fixed point
    pub fn value_scaled(&self) -> u64 {
        self.value
    }

    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    pub fn previous_hash(&self) -> &[u8; 32] {
        &self.previous_hash
    }

    pub fn signature(&self) -> &[u8; 64] {
        &self.signature
    }

    pub fn content(&self) -> &str {
        &self.content
    }
}

/// [0, 1] → fixed point
pub fn to_fixed_point(value: f64) -> u64 {
    (value * VALUE_SCALE as f64).round() as u64
}

/// SHA-256 helper
pub(crate) fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample() -> Declaration {
        Declaration::new(2, 7500, 1_700_000_000, [9u8; 32], "I finish what I start".to_string(), [1u8; 64])
    }

    #[test]
    fn test_encoding_layout() {
        let d = sample();
        let bytes = d.canonical_bytes();
        assert_eq!(bytes.len(), CANONICAL_HEADER_LEN + d.content().len());
        assert_eq!(bytes[0], ENCODING_VERSION);
        assert_eq!(&bytes[1..5], &2u32.to_be_bytes());
        assert_eq!(&bytes[5..13], &7500u64.to_be_bytes());
        assert_eq!(&bytes[13..21], &1_700_000_000i64.to_be_bytes());
        assert_eq!(&bytes[21..53], &[9u8; 32]);
        assert_eq!(&bytes[53..57], &(d.content().len() as u32).to_be_bytes());
        assert_eq!(&bytes[57..], d.content().as_bytes());
    }

    #[test]
    fn test_hash_ignores_signature() {
        let a = sample();
        let b = Declaration::new(2, 7500, 1_700_000_000, [9u8; 32], "I finish what I start".to_string(), [2u8; 64]);
        assert_eq!(a.hash(), b.hash());
    }

    #[test]
    fn test_hash_covers_content() {
        let a = sample();
        let b = Declaration::new(2, 7500, 1_700_000_000, [9u8; 32], "I finish what I start!".to_string(), [1u8; 64]);
        assert_ne!(a.hash(), b.hash());
    }

    #[test]
    fn test_fixed_point() {
        assert_eq!(to_fixed_point(0.5), 5000);
        assert_eq!(to_fixed_point(1.0), VALUE_SCALE);
        assert_eq!(to_fixed_point(0.12344), 1234);
        assert!((sample().value() - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_json_uses_hex() {
        let json = serde_json::to_string(&sample()).unwrap();
        assert!(json.contains(&"09".repeat(32)));
        let restored: Declaration = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, sample());
    }
}
