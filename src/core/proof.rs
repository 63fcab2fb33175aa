//! Continuity proof generation and verification
//!
//! Merkle convention:
//! - leaves are declaration hashes in chain order
//! - each level hashes SHA-256(left || right), left to right
//! - an unpaired final node is paired with itself
//! - a single leaf is its own root; an empty chain has an all-zero root

use crate::config::WakeConfig;
use crate::core::engine::StateEngine;
use crate::error::IdentityError;
use crate::types::{sha256, ContinuityProof, Declaration, ProofReason, SelfState, Trajectory, PROOF_VERSION};
use crate::GENESIS_PREVIOUS_HASH;

/// Tolerance when comparing a recorded score with a recomputed one
const SCORE_TOLERANCE: f64 = 1e-9;

/// Root of the binary Merkle tree over `leaves`
pub fn merkle_root(leaves: &[[u8; 32]]) -> [u8; 32] {
    if leaves.is_empty() {
        return GENESIS_PREVIOUS_HASH;
    }

    let mut level = leaves.to_vec();
    while level.len() > 1 {
        level = level
            .chunks(2)
            .map(|pair| {
                let left = &pair[0];
                let right = pair.get(1).unwrap_or(left);
                let mut buf = [0u8; 64];
                buf[..32].copy_from_slice(left);
                buf[32..].copy_from_slice(right);
                sha256(&buf)
            })
            .collect();
    }
    level[0]
}

/// exp(−Σ‖Δ(w, m)‖) over the recorded history
pub fn compute_continuity_score(trajectory: &Trajectory) -> f64 {
    trajectory.continuity_score()
}

/// Builds proofs; needs the engine for the fixed-point distance
#[derive(Debug, Clone)]
pub struct ContinuityProofGenerator<'a> {
    engine: &'a StateEngine,
    config: &'a WakeConfig,
}

impl<'a> ContinuityProofGenerator<'a> {
    pub fn new(engine: &'a StateEngine, config: &'a WakeConfig) -> Self {
        Self { engine, config }
    }

    /// Proof over `declarations`, `state` and the recorded `trajectory`.
    ///
    /// `stability_score` is ‖state − fixed point‖ where the fixed point is
    /// the end of a bounded search from `state`; an unconverged search uses
    /// the last state reached.
    pub fn generate_proof(
        &self,
        state: &SelfState,
        declarations: &[Declaration],
        trajectory: &Trajectory,
    ) -> Result<ContinuityProof, IdentityError> {
        let fixed = self.engine.find_fixed_point(
            state,
            self.config.fixed_point_dt,
            self.config.fixed_point_max_iter,
            self.config.fixed_point_tol,
        )?;
        if !fixed.converged {
            tracing::debug!(iterations = fixed.iterations, "stability score from unconverged search");
        }

        let hashes: Vec<[u8; 32]> = declarations.iter().map(Declaration::hash).collect();

        Ok(ContinuityProof {
            version: PROOF_VERSION,
            genesis_hash: hashes.first().copied().unwrap_or(GENESIS_PREVIOUS_HASH),
            current_hash: hashes.last().copied().unwrap_or(GENESIS_PREVIOUS_HASH),
            merkle_root: merkle_root(&hashes),
            trajectory_digest: trajectory.digest(),
            chain_length: declarations.len() as u32,
            continuity_score: compute_continuity_score(trajectory),
            stability_score: state.distance(&fixed.state),
            coherence_score: state.coherence(),
        })
    }
}

/// Check `proof` against a chain and a state. Returns the first mismatch.
pub fn check_proof(
    proof: &ContinuityProof,
    state: &SelfState,
    declarations: &[Declaration],
) -> Result<(), ProofReason> {
    if proof.version != PROOF_VERSION {
        return Err(ProofReason::R206_PROOF_VERSION_UNSUPPORTED);
    }
    if proof.chain_length as usize != declarations.len() {
        return Err(ProofReason::R205_PROOF_LENGTH_MISMATCH);
    }

    let hashes: Vec<[u8; 32]> = declarations.iter().map(Declaration::hash).collect();

    let genesis = hashes.first().copied().unwrap_or(GENESIS_PREVIOUS_HASH);
    if proof.genesis_hash != genesis {
        return Err(ProofReason::R201_PROOF_GENESIS_MISMATCH);
    }
    let current = hashes.last().copied().unwrap_or(GENESIS_PREVIOUS_HASH);
    if proof.current_hash != current {
        return Err(ProofReason::R202_PROOF_CURRENT_MISMATCH);
    }
    if proof.merkle_root != merkle_root(&hashes) {
        return Err(ProofReason::R203_PROOF_MERKLE_MISMATCH);
    }

    if !scores_match(proof.coherence_score, state.coherence()) {
        return Err(ProofReason::R204_PROOF_COHERENCE_MISMATCH);
    }

    Ok(())
}

/// Check `proof` against the trajectory it claims to summarise: the digest
/// must match and the continuity score must recompute to the recorded one.
pub fn check_trajectory(proof: &ContinuityProof, trajectory: &Trajectory) -> Result<(), ProofReason> {
    if proof.trajectory_digest != trajectory.digest() {
        return Err(ProofReason::R207_PROOF_TRAJECTORY_MISMATCH);
    }
    if !scores_match(proof.continuity_score, compute_continuity_score(trajectory)) {
        return Err(ProofReason::R208_PROOF_CONTINUITY_MISMATCH);
    }
    Ok(())
}

fn scores_match(recorded: f64, recomputed: f64) -> bool {
    let drift = (recorded - recomputed).abs();
    !drift.is_nan() && drift <= SCORE_TOLERANCE
}

/// `check_proof` as a boolean; never panics on a mismatch
pub fn verify_proof(proof: &ContinuityProof, state: &SelfState, declarations: &[Declaration]) -> bool {
    match check_proof(proof, state, declarations) {
        Ok(()) => true,
        Err(reason) => {
            tracing::warn!(code = reason.code(), "continuity proof mismatch");
            false
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
