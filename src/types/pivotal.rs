//! Pivotal experiences: hashes of formative moments, kept off the state

use serde::{Deserialize, Serialize};

/// One recorded pivotal experience. Only the hash is kept; the experience
/// itself lives wherever the caller stores it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PivotalExperience {
    #[serde(with = "hex::serde")]
    pub experience_hash: [u8; 32],
    /// Caller-defined impact magnitude
    pub impact: u64,
    /// Unix seconds
    pub timestamp: i64,
}

impl PivotalExperience {
    /// Size of one entry in the seal encoding
    pub const ENCODED_LEN: usize = 32 + 8 + 8;

    /// `experience_hash || impact || timestamp`, big-endian
    pub fn encode(&self) -> [u8; Self::ENCODED_LEN] {
        let mut bytes = [0u8; Self::ENCODED_LEN];
        bytes[..32].copy_from_slice(&self.experience_hash);
        bytes[32..40].copy_from_slice(&self.impact.to_be_bytes());
        bytes[40..].copy_from_slice(&self.timestamp.to_be_bytes());
        bytes
    }
}

// =============================================================================
// TESTS
// =============================================================================
