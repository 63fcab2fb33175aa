//! Continuity proof types
//!
//! A proof is a plain snapshot derived from a declaration chain and a state.
//! It serializes to JSON (hex hashes) or to a fixed 158-byte record for
//! publication to an external ledger.

use serde::{Deserialize, Serialize};

use crate::types::declaration::to_fixed_point;

/// Proof record layout version
pub const PROOF_VERSION: u16 = 1;

/// Continuity proof over a chain and a state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContinuityProof {
    /// Layout version
    pub version: u16,
    /// Hash of declarations[0] (zeros for an empty chain)
    #[serde(with = "hex::serde")]
    pub genesis_hash: [u8; 32],
    /// Hash of the last declaration (zeros for an empty chain)
    #[serde(with = "hex::serde")]
    pub current_hash: [u8; 32],
    /// Root of the binary Merkle tree over declaration hashes
    #[serde(with = "hex::serde")]
    pub merkle_root: [u8; 32],
    /// `Trajectory::digest` of the history the continuity score came from
    #[serde(with = "hex::serde")]
    pub trajectory_digest: [u8; 32],
    /// Number of declarations covered
    pub chain_length: u32,
    /// exp(−Σ drift), in (0, 1]
    pub continuity_score: f64,
    /// ‖state − fixed point‖
    pub stability_score: f64,
    /// ‖w − m‖
    pub coherence_score: f64,
}

impl ContinuityProof {
    /// Record size in bytes
    pub const SIZE: usize = 2 + 32 + 32 + 32 + 32 + 4 + 8 + 8 + 8;

    /// Serialize to a fixed 158-byte record. Scores are fixed point (× 10000).
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut bytes = [0u8; Self::SIZE];
        let mut offset = 0;

        // version (2 bytes)
        bytes[offset..offset + 2].copy_from_slice(&self.version.to_be_bytes());
        offset += 2;

        for hash in [
            &self.genesis_hash,
            &self.current_hash,
            &self.merkle_root,
            &self.trajectory_digest,
        ] {
            bytes[offset..offset + 32].copy_from_slice(hash);
            offset += 32;
        }

        // chain_length (4 bytes)
        bytes[offset..offset + 4].copy_from_slice(&self.chain_length.to_be_bytes());
        offset += 4;

        for score in [self.continuity_score, self.stability_score, self.coherence_score] {
            bytes[offset..offset + 8].copy_from_slice(&to_fixed_point(score).to_be_bytes());
            offset += 8;
        }

        bytes
    }

    /// Hex of the byte record
    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }
}

/// Why a proof was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[allow(non_camel_case_types)]
pub enum ProofReason {
    /// Genesis hash differs
    R201_PROOF_GENESIS_MISMATCH,
    /// Current (head) hash differs
    R202_PROOF_CURRENT_MISMATCH,
    /// Merkle root differs
    R203_PROOF_MERKLE_MISMATCH,
    /// Coherence recomputed from the state differs
    R204_PROOF_COHERENCE_MISMATCH,
    /// Chain length differs
    R205_PROOF_LENGTH_MISMATCH,
    /// Unknown layout version
    R206_PROOF_VERSION_UNSUPPORTED,
    /// Trajectory digest differs
    R207_PROOF_TRAJECTORY_MISMATCH,
    /// Continuity recomputed from the trajectory differs
    R208_PROOF_CONTINUITY_MISMATCH,
    /// Snapshot has history but no proof
    R209_PROOF_MISSING,
    /// Snapshot seal missing or not signed by the identity key
    R210_PROOF_SEAL_INVALID,
}

impl ProofReason {
    /// Get code string
    pub fn code(&self) -> &'static str {
        match self {
            Self::R201_PROOF_GENESIS_MISMATCH => "R201_PROOF_GENESIS_MISMATCH",
            Self::R202_PROOF_CURRENT_MISMATCH => "R202_PROOF_CURRENT_MISMATCH",
            Self::R203_PROOF_MERKLE_MISMATCH => "R203_PROOF_MERKLE_MISMATCH",
            Self::R204_PROOF_COHERENCE_MISMATCH => "R204_PROOF_COHERENCE_MISMATCH",
            Self::R205_PROOF_LENGTH_MISMATCH => "R205_PROOF_LENGTH_MISMATCH",
            Self::R206_PROOF_VERSION_UNSUPPORTED => "R206_PROOF_VERSION_UNSUPPORTED",
            Self::R207_PROOF_TRAJECTORY_MISMATCH => "R207_PROOF_TRAJECTORY_MISMATCH",
            Self::R208_PROOF_CONTINUITY_MISMATCH => "R208_PROOF_CONTINUITY_MISMATCH",
            Self::R209_PROOF_MISSING => "R209_PROOF_MISSING",
            Self::R210_PROOF_SEAL_INVALID => "R210_PROOF_SEAL_INVALID",
        }
    }

    /// Get description
    pub fn description(&self) -> &'static str {
        match self {
            Self::R201_PROOF_GENESIS_MISMATCH => "Genesis hash does not match chain",
            Self::R202_PROOF_CURRENT_MISMATCH => "Current hash does not match chain head",
            Self::R203_PROOF_MERKLE_MISMATCH => "Merkle root does not match chain",
            Self::R204_PROOF_COHERENCE_MISMATCH => "Coherence does not match state",
            Self::R205_PROOF_LENGTH_MISMATCH => "Chain length does not match",
            Self::R206_PROOF_VERSION_UNSUPPORTED => "Unsupported proof version",
            Self::R207_PROOF_TRAJECTORY_MISMATCH => "Trajectory digest does not match history",
            Self::R208_PROOF_CONTINUITY_MISMATCH => "Continuity score does not match history",
            Self::R209_PROOF_MISSING => "Snapshot with history carries no proof",
            Self::R210_PROOF_SEAL_INVALID => "Snapshot seal missing or invalid",
        }
    }
}

impl std::fmt::Display for ProofReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code(), self.description())
    }
}

// =============================================================================
// TESTS
// =============================================================================
