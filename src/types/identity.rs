//! Persisted identity snapshot, the input to `wake()`

use serde::{Deserialize, Serialize};

use crate::error::IdentityError;
use crate::types::{ContinuityProof, Declaration, Parameters, PivotalExperience, SelfState, Trajectory, Vocabulary};
use crate::MAX_PIVOTAL_EXPERIENCES;

/// Identity-key signature over `StoredIdentity::seal_message`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Seal {
    #[serde(with = "hex::serde")]
    pub signature: [u8; 64],
}

/// Everything needed to reconstruct a live identity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredIdentity {
    pub vocabulary: Vocabulary,
    pub params: Parameters,
    pub state: SelfState,
    pub declarations: Vec<Declaration>,
    #[serde(default)]
    pub trajectory: Trajectory,
    /// Pivotal experience hashes, oldest first
    #[serde(default)]
    pub pivotal: Vec<PivotalExperience>,
    /// Proof generated when the snapshot was taken
    #[serde(default)]
    pub proof: Option<ContinuityProof>,
    /// Signature over the snapshot contents, present whenever `proof` is
    #[serde(default)]
    pub seal: Option<Seal>,
    /// Optimistic concurrency version, bumped by the store on every save
    #[serde(default)]
    pub version: u64,
}

impl StoredIdentity {
    /// New identity: coherent state (all 0.5 unless `initial` is given),
    /// empty chain and trajectory.
    pub fn genesis(
        vocabulary: Vocabulary,
        params: Parameters,
        initial: Option<Vec<f64>>,
    ) -> Result<Self, IdentityError> {
        let n = vocabulary.len();
        params.validate(n)?;

        let state = match initial {
            Some(weights) => SelfState::from_weights(weights)?,
            None => SelfState::genesis(n),
        };
        state.validate(n)?;

        tracing::info!(
            dimensions = n,
            vocabulary = %hex::encode(vocabulary.digest()),
            "identity genesis"
        );

        Ok(Self {
            vocabulary,
            params,
            state,
            declarations: Vec::new(),
            trajectory: Trajectory::new(),
            pivotal: Vec::new(),
            proof: None,
            seal: None,
            version: 0,
        })
    }

    /// Structural checks: state and parameters match the vocabulary, the
    /// pivotal log is within bounds
    pub fn validate(&self) -> Result<(), IdentityError> {
        let n = self.vocabulary.len();
        self.params.validate(n)?;
        self.state.validate(n)?;
        if self.pivotal.len() > MAX_PIVOTAL_EXPERIENCES {
            return Err(IdentityError::TooManyPivotalExperiences {
                max: MAX_PIVOTAL_EXPERIENCES,
            });
        }
        Ok(())
    }

    /// A snapshot with any history must carry a sealed proof
    pub fn has_history(&self) -> bool {
        !self.declarations.is_empty() || !self.trajectory.is_empty() || !self.pivotal.is_empty()
    }

    /// Bytes covered by the seal, big-endian:
    /// vocabulary digest, parameters, state, proof record, pivotal log.
    /// `version` and the seal itself are excluded.
    pub fn seal_message(&self) -> Vec<u8> {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&self.vocabulary.digest());

        let p = &self.params;
        for scalar in [
            p.diffusion,
            p.homeostasis,
            p.self_model_rate,
            p.coherence_weight,
            p.bistability,
            p.filter_sharpness,
            p.filter_gain,
        ] {
            push_f64(&mut bytes, scalar);
        }
        for &t in &p.target {
            push_f64(&mut bytes, t);
        }

        for &x in self.state.w.iter().chain(&self.state.m) {
            push_f64(&mut bytes, x);
        }
        push_f64(&mut bytes, self.state.time);

        if let Some(proof) = &self.proof {
            bytes.extend_from_slice(&proof.to_bytes());
        }
        bytes.extend_from_slice(&(self.pivotal.len() as u32).to_be_bytes());
        for entry in &self.pivotal {
            bytes.extend_from_slice(&entry.encode());
        }
        bytes
    }
}

fn push_f64(bytes: &mut Vec<u8>, x: f64) {
    bytes.extend_from_slice(&x.to_bits().to_be_bytes());
}

// =============================================================================
// TESTS
// =============================================================================
