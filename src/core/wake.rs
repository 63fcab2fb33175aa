//! Wake Reconstructor: stored snapshot → live `ActiveSelf`
//!
//! Check order (first failure wins):
//! 1. declarations fit the vocabulary, chain links and signatures verify
//! 2. stored proof matches chain, state and trajectory, and the seal verifies
//!    under the identity key; required once the snapshot has any history
//! 3. continuity score ≥ threshold (skipped by `reanchor`)
//! 4. ‖w − m‖ ≤ coherence threshold
//! 5. Gershgorin stability estimate; failure is a warning, not an error

use std::sync::Arc;

use crate::config::WakeConfig;
use crate::core::chain::{apply_declaration, check_vocabulary, create_declaration, DeclarationChain};
use crate::core::engine::StateEngine;
use crate::core::filter::{derive_filter, InterpretiveFilter};
use crate::core::proof::{check_proof, check_trajectory, ContinuityProofGenerator};
use crate::core::signing::{Ed25519Signer, Ed25519Verifier, SignatureVerifier, Signer};
use crate::error::{IdentityError, WakeError};
use crate::types::{
    ChangeKind, ContinuityProof, Declaration, NumericDivergence, Parameters, PivotalExperience, ProofReason,
    Seal, SelfState, StabilityEstimate, StabilityWarning, StoredIdentity, Trajectory, Vocabulary,
};
use crate::{MAX_EVOLVE_STEPS, MAX_PIVOTAL_EXPERIENCES};

/// Signing capability handed to `wake`
#[derive(Clone)]
pub struct WakeContext {
    pub signer: Arc<dyn Signer>,
    pub verifier: Arc<dyn SignatureVerifier>,
    pub public_key: [u8; 32],
}

impl WakeContext {
    pub fn new(
        signer: impl Signer + 'static,
        verifier: impl SignatureVerifier + 'static,
        public_key: [u8; 32],
    ) -> Self {
        Self {
            signer: Arc::new(signer),
            verifier: Arc::new(verifier),
            public_key,
        }
    }

    /// Ed25519 signer and strict verifier from a 32-byte seed
    pub fn ed25519(seed: &[u8; 32]) -> Self {
        let signer = Ed25519Signer::from_seed(seed);
        let public_key = signer.public_key();
        Self::new(signer, Ed25519Verifier, public_key)
    }
}

impl std::fmt::Debug for WakeContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WakeContext")
            .field("public_key", &hex::encode(self.public_key))
            .finish_non_exhaustive()
    }
}

/// Verifies snapshots and hands back live identities
#[derive(Debug, Clone, Default)]
pub struct WakeReconstructor {
    config: WakeConfig,
}

impl WakeReconstructor {
    pub fn new(config: WakeConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &WakeConfig {
        &self.config
    }

    /// Run every check and return a live identity
    pub fn wake(&self, stored: &StoredIdentity, context: &WakeContext) -> Result<ActiveSelf, WakeError> {
        let result = self.reconstruct(stored, context, true);
        match &result {
            Ok(active) => tracing::info!(
                declarations = active.chain.len(),
                continuity = active.continuity_score(),
                warnings = active.warnings.len(),
                "identity awake"
            ),
            Err(e) => tracing::warn!(code = e.code(), error = %e, "wake failed"),
        }
        result
    }

    /// Wake without the continuity check, then start a fresh trajectory.
    ///
    /// Explicit override for an identity that drifted past the threshold;
    /// chain, proof and coherence checks still apply.
    pub fn reanchor(&self, stored: &StoredIdentity, context: &WakeContext) -> Result<ActiveSelf, WakeError> {
        let mut active = self.reconstruct(stored, context, false).inspect_err(|e| {
            tracing::warn!(code = e.code(), error = %e, "re-anchor failed");
        })?;
        tracing::warn!(
            discarded_drift = active.trajectory.total_drift(),
            "identity re-anchored; continuity reset"
        );
        active.trajectory.clear();
        Ok(active)
    }

    fn reconstruct(
        &self,
        stored: &StoredIdentity,
        context: &WakeContext,
        enforce_continuity: bool,
    ) -> Result<ActiveSelf, WakeError> {
        stored.validate()?;
        let engine = StateEngine::new(&stored.vocabulary, stored.params.clone())?;
        let n = stored.vocabulary.len();

        check_vocabulary(&stored.declarations, n).map_err(WakeError::ChainIntegrity)?;
        let chain = DeclarationChain::from_declarations(stored.declarations.clone());
        chain
            .verify(context.verifier.as_ref(), &context.public_key)
            .map_err(WakeError::ChainIntegrity)?;

        if let Err(reason) = check_stored_proof(stored, context) {
            tracing::warn!(code = reason.code(), "stored proof rejected");
            return Err(WakeError::ProofMismatch);
        }

        let score = stored.trajectory.continuity_score();
        if enforce_continuity && score < self.config.continuity_threshold {
            return Err(WakeError::ContinuityViolation {
                score,
                threshold: self.config.continuity_threshold,
            });
        }

        let coherence = stored.state.coherence();
        if coherence > self.config.coherence_threshold {
            return Err(WakeError::CoherenceViolation {
                coherence,
                threshold: self.config.coherence_threshold,
            });
        }

        let mut warnings = Vec::new();
        let estimate = engine.estimate_stability(&stored.state);
        if !estimate.is_stable() {
            let dimension = stored
                .vocabulary
                .names()
                .get(estimate.critical_dimension)
                .cloned()
                .unwrap_or_default();
            let warning = StabilityWarning { estimate, dimension };
            tracing::warn!(%warning, "stability not certified");
            warnings.push(warning);
        }

        Ok(ActiveSelf {
            vocabulary: stored.vocabulary.clone(),
            engine,
            state: stored.state.clone(),
            chain,
            trajectory: stored.trajectory.clone(),
            pivotal: stored.pivotal.clone(),
            context: context.clone(),
            config: self.config.clone(),
            warnings,
            version: stored.version,
        })
    }
}

/// Proof, trajectory and seal checks for a snapshot whose chain already verified
fn check_stored_proof(stored: &StoredIdentity, context: &WakeContext) -> Result<(), ProofReason> {
    let Some(proof) = &stored.proof else {
        return if stored.has_history() {
            Err(ProofReason::R209_PROOF_MISSING)
        } else {
            Ok(())
        };
    };

    check_proof(proof, &stored.state, &stored.declarations)?;
    check_trajectory(proof, &stored.trajectory)?;

    let seal = stored.seal.as_ref().ok_or(ProofReason::R210_PROOF_SEAL_INVALID)?;
    if !context
        .verifier
        .verify(&stored.seal_message(), &seal.signature, &context.public_key)
    {
        return Err(ProofReason::R210_PROOF_SEAL_INVALID);
    }
    Ok(())
}

/// Live identity handle. Owns its state exclusively.
#[derive(Debug, Clone)]
pub struct ActiveSelf {
    vocabulary: Vocabulary,
    engine: StateEngine,
    state: SelfState,
    chain: DeclarationChain,
    trajectory: Trajectory,
    pivotal: Vec<PivotalExperience>,
    context: WakeContext,
    config: WakeConfig,
    warnings: Vec<StabilityWarning>,
    version: u64,
}

impl ActiveSelf {
    pub fn state(&self) -> &SelfState {
        &self.state
    }

    pub fn params(&self) -> &Parameters {
        self.engine.params()
    }

    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocabulary
    }

    pub fn declarations(&self) -> &[Declaration] {
        self.chain.as_slice()
    }

    pub fn trajectory(&self) -> &Trajectory {
        &self.trajectory
    }

    /// Pivotal experiences, oldest first
    pub fn pivotal(&self) -> &[PivotalExperience] {
        &self.pivotal
    }

    /// Warnings raised at wake
    pub fn warnings(&self) -> &[StabilityWarning] {
        &self.warnings
    }

    /// Store version this handle was woken from
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn public_key(&self) -> &[u8; 32] {
        &self.context.public_key
    }

    /// Filter for the current self-model, derived fresh on every call
    pub fn filter(&self) -> InterpretiveFilter {
        let p = self.engine.params();
        derive_filter(&self.state.m, p.filter_sharpness, p.filter_gain)
    }

    /// F_m(e) for the current self-model
    pub fn interpret(&self, experience: &[f64]) -> Result<Vec<f64>, IdentityError> {
        self.filter().apply(experience)
    }

    /// Advance one Euler step and record its drift
    pub fn evolve(&mut self, experience: &[f64], dt: f64) -> Result<Option<NumericDivergence>, IdentityError> {
        let outcome = self.engine.step(&self.state, experience, dt)?;
        self.trajectory
            .record(ChangeKind::Step, self.state.distance(&outcome.state));
        self.state = outcome.state;
        Ok(outcome.divergence)
    }

    /// `steps` Euler steps of the same experience. Returns the number of
    /// clamped coordinates across all steps. Nothing changes on error.
    pub fn evolve_for(&mut self, experience: &[f64], dt: f64, steps: usize) -> Result<usize, IdentityError> {
        if steps > MAX_EVOLVE_STEPS {
            return Err(IdentityError::TooManySteps {
                steps,
                max: MAX_EVOLVE_STEPS,
            });
        }

        let mut state = self.state.clone();
        let mut drifts = Vec::with_capacity(steps);
        let mut clamped = 0;
        for _ in 0..steps {
            let outcome = self.engine.step(&state, experience, dt)?;
            if let Some(divergence) = &outcome.divergence {
                clamped += divergence.count();
            }
            drifts.push(state.distance(&outcome.state));
            state = outcome.state;
        }

        for drift in drifts {
            self.trajectory.record(ChangeKind::Step, drift);
        }
        self.state = state;
        Ok(clamped)
    }

    /// Sign, append and apply a declaration. Nothing changes on error.
    pub fn declare(&mut self, index: usize, value: f64, content: &str) -> Result<&Declaration, IdentityError> {
        let now = chrono::Utc::now().timestamp();
        let interval = self.config.declaration_interval_secs;
        if let Some(last) = self.chain.last() {
            let earliest = last.timestamp().saturating_add(interval);
            if interval > 0 && now < earliest {
                return Err(IdentityError::RateLimitExceeded {
                    retry_after_secs: earliest - now,
                });
            }
        }

        let declaration = create_declaration(
            self.vocabulary.len(),
            index,
            value,
            content,
            self.chain.head_hash(),
            now,
            self.context.signer.as_ref(),
        )?;
        let next = apply_declaration(&self.state, &declaration)?;
        self.chain.append(declaration)?;

        self.trajectory
            .record(ChangeKind::Declaration, self.state.distance(&next));
        self.state = next;

        let position = self.chain.len() - 1;
        tracing::info!(
            position,
            dimension = %self.vocabulary.names()[index],
            value,
            "declaration recorded"
        );
        Ok(&self.chain.as_slice()[position])
    }

    /// Append a pivotal experience hash. The state is untouched.
    pub fn record_pivotal(
        &mut self,
        experience_hash: [u8; 32],
        impact: u64,
    ) -> Result<&PivotalExperience, IdentityError> {
        if self.pivotal.len() >= MAX_PIVOTAL_EXPERIENCES {
            return Err(IdentityError::TooManyPivotalExperiences {
                max: MAX_PIVOTAL_EXPERIENCES,
            });
        }
        self.pivotal.push(PivotalExperience {
            experience_hash,
            impact,
            timestamp: chrono::Utc::now().timestamp(),
        });
        tracing::info!(
            count = self.pivotal.len(),
            impact,
            hash = %hex::encode(experience_hash),
            "pivotal experience recorded"
        );
        Ok(&self.pivotal[self.pivotal.len() - 1])
    }

    /// Overwrite w and realign m = w
    pub fn set_weights(&mut self, weights: Vec<f64>) -> Result<(), IdentityError> {
        let mut next = SelfState::from_weights(weights)?;
        next.validate(self.vocabulary.len())?;
        next.time = self.state.time;

        self.trajectory
            .record(ChangeKind::Realign, self.state.distance(&next));
        self.state = next;
        tracing::info!(dimensions = self.vocabulary.len(), "weights set");
        Ok(())
    }

    /// Re-run the fatal wake checks against the live state
    pub fn verify(&self) -> Result<(), WakeError> {
        check_vocabulary(self.chain.as_slice(), self.vocabulary.len()).map_err(WakeError::ChainIntegrity)?;
        self.chain
            .verify(self.context.verifier.as_ref(), &self.context.public_key)
            .map_err(WakeError::ChainIntegrity)?;

        let score = self.continuity_score();
        if score < self.config.continuity_threshold {
            return Err(WakeError::ContinuityViolation {
                score,
                threshold: self.config.continuity_threshold,
            });
        }
        let coherence = self.state.coherence();
        if coherence > self.config.coherence_threshold {
            return Err(WakeError::CoherenceViolation {
                coherence,
                threshold: self.config.coherence_threshold,
            });
        }
        Ok(())
    }

    pub fn continuity_score(&self) -> f64 {
        self.trajectory.continuity_score()
    }

    pub fn coherence(&self) -> f64 {
        self.state.coherence()
    }

    pub fn energy(&self) -> f64 {
        self.engine.compute_energy(&self.state)
    }

    pub fn stability(&self) -> StabilityEstimate {
        self.engine.estimate_stability(&self.state)
    }

    /// Continuity proof over the live chain and state
    pub fn proof(&self) -> Result<ContinuityProof, IdentityError> {
        ContinuityProofGenerator::new(&self.engine, &self.config).generate_proof(
            &self.state,
            self.chain.as_slice(),
            &self.trajectory,
        )
    }

    /// Persistable snapshot with a fresh proof, sealed with the identity
    /// key. `version` is the one this handle was woken from; the store bumps
    /// it on save.
    pub fn snapshot(&self) -> Result<StoredIdentity, IdentityError> {
        let mut stored = StoredIdentity {
            vocabulary: self.vocabulary.clone(),
            params: self.engine.params().clone(),
            state: self.state.clone(),
            declarations: self.chain.as_slice().to_vec(),
            trajectory: self.trajectory.clone(),
            pivotal: self.pivotal.clone(),
            proof: Some(self.proof()?),
            seal: None,
            version: self.version,
        };
        stored.seal = Some(Seal {
            signature: self.context.signer.sign(&stored.seal_message()),
        });
        Ok(stored)
    }

    /// Record that the snapshot was saved under `version`
    pub fn mark_saved(&mut self, version: u64) {
        self.version = version;
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ChainFault, DeclarationFault};
    use crate::types::Relationship;

    fn stored() -> StoredIdentity {
        let vocabulary = Vocabulary::define(
            ["curiosity", "precision", "persistence", "empathy"],
            vec![Relationship::new(0, 1), Relationship::new(2, 3)],
        )
        .unwrap();
        StoredIdentity::genesis(vocabulary, Parameters::default_for(4), None).unwrap()
    }

    fn context() -> WakeContext {
        WakeContext::ed25519(&[42u8; 32])
    }

    #[test]
    fn test_genesis_wakes_clean() {
        let active = WakeReconstructor::default().wake(&stored(), &context()).unwrap();
        assert!(active.warnings().is_empty());
        assert_eq!(active.continuity_score(), 1.0);
        assert!(active.verify().is_ok());
    }

    #[test]
    fn test_declare_refreshes_filter() {
        let mut active = WakeReconstructor::default().wake(&stored(), &context()).unwrap();
        let before = active.filter();
        active.declare(1, 0.9, "precision matters").unwrap();

        assert_eq!(active.state().w[1], 0.9);
        assert_eq!(active.state().m[1], 0.9);
        assert_ne!(active.filter(), before);
        assert!(active.filter().gains()[1] > before.gains()[1]);
        assert!(active.continuity_score() < 1.0);
        assert!(active.verify().is_ok());
    }

    #[test]
    fn test_failed_declare_changes_nothing() {
        let mut active = WakeReconstructor::default().wake(&stored(), &context()).unwrap();
        let state = active.state().clone();
        let err = active.declare(4, 0.5, "nope").unwrap_err();
        assert_eq!(
            err,
            IdentityError::InvalidDeclaration(DeclarationFault::IndexOutOfRange { index: 4, dimensions: 4 })
        );
        assert!(active.declare(0, 1.5, "nope").is_err());
        assert_eq!(active.state(), &state);
        assert!(active.declarations().is_empty());
        assert!(active.trajectory().is_empty());
    }

    #[test]
    fn test_evolve_records_step() {
        let mut active = WakeReconstructor::default().wake(&stored(), &context()).unwrap();
        active.evolve(&[0.5, 0.0, 0.0, 0.0], 0.1).unwrap();
        assert_eq!(active.trajectory().len(), 1);
        assert!(active.trajectory().drift_of(ChangeKind::Step) > 0.0);
        assert!(active.state().w[0] > 0.5);
    }

    #[test]
    fn test_set_weights_realigns() {
        let mut active = WakeReconstructor::default().wake(&stored(), &context()).unwrap();
        active.evolve(&[1.0, -1.0, 0.5, 0.0], 0.5).unwrap();
        active.set_weights(vec![0.2, 0.4, 0.6, 0.8]).unwrap();
        assert_eq!(active.coherence(), 0.0);
        assert!(active.trajectory().drift_of(ChangeKind::Realign) > 0.0);
        assert!(active.set_weights(vec![0.2, 0.4]).is_err());
        assert!(active.set_weights(vec![0.2, 0.4, 0.6, 1.2]).is_err());
    }

    #[test]
    fn test_snapshot_rewakes() {
        let mut active = WakeReconstructor::default().wake(&stored(), &context()).unwrap();
        active.declare(0, 0.7, "curious").unwrap();
        active.evolve(&[0.0; 4], 0.1).unwrap();
        let snapshot = active.snapshot().unwrap();
        assert!(snapshot.proof.is_some());

        let again = WakeReconstructor::default().wake(&snapshot, &context()).unwrap();
        assert_eq!(again.state(), active.state());
        assert_eq!(again.declarations(), active.declarations());
    }

    #[test]
    fn test_wrong_key_fails_chain() {
        let mut active = WakeReconstructor::default().wake(&stored(), &context()).unwrap();
        active.declare(0, 0.7, "curious").unwrap();
        let snapshot = active.snapshot().unwrap();

        let err = WakeReconstructor::default()
            .wake(&snapshot, &WakeContext::ed25519(&[1u8; 32]))
            .unwrap_err();
        assert!(matches!(err, WakeError::ChainIntegrity(b) if b.index == 0 && b.fault == ChainFault::BadSignature));
    }

    #[test]
    fn test_malformed_snapshot() {
        let mut s = stored();
        s.state.w.pop();
        let err = WakeReconstructor::default().wake(&s, &context()).unwrap_err();
        assert_eq!(err.code(), "R400_WAKE_MALFORMED");
    }
    #[test]
    fn test_evolve_for_is_bounded_and_atomic() {
        let mut active = WakeReconstructor::default().wake(&stored(), &context()).unwrap();
        let err = active.evolve_for(&[0.1; 4], 0.1, MAX_EVOLVE_STEPS + 1).unwrap_err();
        assert_eq!(err, IdentityError::TooManySteps { steps: MAX_EVOLVE_STEPS + 1, max: MAX_EVOLVE_STEPS });
        assert!(active.evolve_for(&[0.1; 3], 0.1, 5).is_err());
        assert!(active.trajectory().is_empty());
        assert_eq!(active.state(), &SelfState::genesis(4));

        let clamped = active.evolve_for(&[0.1, 0.0, 0.0, 0.0], 0.1, 5).unwrap();
        assert_eq!(clamped, 0);
        assert_eq!(active.trajectory().len(), 5);
        assert!((active.state().time - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_declaration_rate_limit() {
        let config = WakeConfig {
            declaration_interval_secs: 3600,
            ..WakeConfig::default()
        };
        let mut active = WakeReconstructor::new(config).wake(&stored(), &context()).unwrap();
        active.declare(0, 0.7, "first").unwrap();
        let err = active.declare(1, 0.3, "too soon").unwrap_err();
        assert!(matches!(err, IdentityError::RateLimitExceeded { retry_after_secs } if retry_after_secs > 0));
        assert_eq!(err.code(), "R522_DECLARATION_RATE_LIMIT");
        assert_eq!(active.declarations().len(), 1);

        // the default config has no limit
        let mut active = WakeReconstructor::default().wake(&stored(), &context()).unwrap();
        active.declare(0, 0.7, "first").unwrap();
        active.declare(1, 0.3, "second").unwrap();
    }

    #[test]
    fn test_record_pivotal_bounded() {
        let mut active = WakeReconstructor::default().wake(&stored(), &context()).unwrap();
        let state = active.state().clone();
        for k in 0..MAX_PIVOTAL_EXPERIENCES {
            let entry = active.record_pivotal([k as u8; 32], 10 * k as u64).unwrap();
            assert_eq!(entry.experience_hash, [k as u8; 32]);
        }
        let err = active.record_pivotal([0xff; 32], 1).unwrap_err();
        assert_eq!(err, IdentityError::TooManyPivotalExperiences { max: MAX_PIVOTAL_EXPERIENCES });
        assert_eq!(active.pivotal().len(), MAX_PIVOTAL_EXPERIENCES);
        assert_eq!(active.state(), &state);

        let again = WakeReconstructor::default().wake(&active.snapshot().unwrap(), &context()).unwrap();
        assert_eq!(again.pivotal(), active.pivotal());
    }

    #[test]
    fn test_seal_binds_snapshot() {
        let mut active = WakeReconstructor::default().wake(&stored(), &context()).unwrap();
        active.declare(2, 0.4, "steady").unwrap();
        active.record_pivotal([3u8; 32], 9).unwrap();
        let snapshot = active.snapshot().unwrap();

        // coherence-preserving shift that the proof alone cannot see
        let mut shifted = snapshot.clone();
        shifted.state.w[0] = 0.55;
        shifted.state.m[0] = 0.55;
        assert_eq!(WakeReconstructor::default().wake(&shifted, &context()).unwrap_err(), WakeError::ProofMismatch);

        let mut forgotten = snapshot.clone();
        forgotten.pivotal.clear();
        assert_eq!(WakeReconstructor::default().wake(&forgotten, &context()).unwrap_err(), WakeError::ProofMismatch);

        let mut unsealed = snapshot;
        unsealed.seal = None;
        assert_eq!(WakeReconstructor::default().wake(&unsealed, &context()).unwrap_err(), WakeError::ProofMismatch);
    }
}
