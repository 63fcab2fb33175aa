//! Trajectory: the history of state changes used for continuity

use serde::{Deserialize, Serialize};

use crate::types::sha256;
use crate::GENESIS_PREVIOUS_HASH;

/// What produced a state change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    /// Continuous `evolve` step
    Step,
    /// Declaration applied
    Declaration,
    /// Weights overwritten with m = w
    Realign,
}

impl ChangeKind {
    fn tag(self) -> u8 {
        match self {
            Self::Step => 0,
            Self::Declaration => 1,
            Self::Realign => 2,
        }
    }
}

/// One recorded change: ‖Δ(w, m)‖ of a single mutation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrajectoryEvent {
    pub kind: ChangeKind,
    pub drift: f64,
}

/// Ordered history of drift since genesis (or the last re-anchor)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Trajectory {
    events: Vec<TrajectoryEvent>,
}

impl Trajectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a change. Non-finite or negative drift is stored as zero.
    pub fn record(&mut self, kind: ChangeKind, drift: f64) {
        let drift = if drift.is_finite() && drift > 0.0 { drift } else { 0.0 };
        self.events.push(TrajectoryEvent { kind, drift });
    }

    pub fn events(&self) -> &[TrajectoryEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Σ drift over events of one kind
    pub fn drift_of(&self, kind: ChangeKind) -> f64 {
        self.events
            .iter()
            .filter(|e| e.kind == kind)
            .map(|e| e.drift)
            .sum()
    }

    /// Σ drift over all events
    pub fn total_drift(&self) -> f64 {
        self.events.iter().map(|e| e.drift).sum()
    }

    /// exp(−Σ‖Δ‖), in (0, 1]. Exactly 1.0 only for zero total drift;
    /// floored at `f64::MIN_POSITIVE` where the exponential underflows.
    pub fn continuity_score(&self) -> f64 {
        (-self.total_drift()).exp().max(f64::MIN_POSITIVE)
    }

    /// SHA-256 over `(kind, drift)` of every event in order, drift as
    /// big-endian f64 bits. All zeros for an empty trajectory.
    pub fn digest(&self) -> [u8; 32] {
        if self.events.is_empty() {
            return GENESIS_PREVIOUS_HASH;
        }
        let mut bytes = Vec::with_capacity(self.events.len() * 9);
        for event in &self.events {
            bytes.push(event.kind.tag());
            bytes.extend_from_slice(&event.drift.to_bits().to_be_bytes());
        }
        sha256(&bytes)
    }

    /// Drop history (re-anchor)
    pub fn clear(&mut self) {
        self.events.clear();
    }
}

// =============================================================================
// TESTS
// =============================================================================
