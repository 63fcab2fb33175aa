//! Dynamics parameters, fixed at genesis

use serde::{Deserialize, Serialize};

use crate::error::IdentityError;
use crate::{
    DEFAULT_BISTABILITY, DEFAULT_COHERENCE_WEIGHT, DEFAULT_DIFFUSION, DEFAULT_FILTER_GAIN,
    DEFAULT_FILTER_SHARPNESS, DEFAULT_HOMEOSTASIS, DEFAULT_SELF_MODEL_RATE, DEFAULT_WEIGHT,
};

/// `{ D, λ, μ, κ, a, β, γ, w* }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameters {
    /// D: diffusion along the relationship graph
    pub diffusion: f64,
    /// λ: pull toward `target`
    pub homeostasis: f64,
    /// μ: rate at which the self-model tracks the weights
    pub self_model_rate: f64,
    /// κ: weight of the coherence gap in the energy
    pub coherence_weight: f64,
    /// a: bistable threshold of the reaction term
    pub bistability: f64,
    /// β: interpretive filter sharpness
    pub filter_sharpness: f64,
    /// γ: interpretive filter gain
    pub filter_gain: f64,
    /// w*: target identity
    pub target: Vec<f64>,
}

impl Parameters {
    /// Defaults for an n-dimensional vocabulary
    pub fn default_for(n: usize) -> Self {
        Self {
            diffusion: DEFAULT_DIFFUSION,
            homeostasis: DEFAULT_HOMEOSTASIS,
            self_model_rate: DEFAULT_SELF_MODEL_RATE,
            coherence_weight: DEFAULT_COHERENCE_WEIGHT,
            bistability: DEFAULT_BISTABILITY,
            filter_sharpness: DEFAULT_FILTER_SHARPNESS,
            filter_gain: DEFAULT_FILTER_GAIN,
            target: vec![DEFAULT_WEIGHT; n],
        }
    }

    /// Replace λ
    pub fn with_homeostasis(mut self, homeostasis: f64) -> Self {
        self.homeostasis = homeostasis;
        self
    }

    /// Replace w*
    pub fn with_target(mut self, target: Vec<f64>) -> Self {
        self.target = target;
        self
    }

    /// λ − a(1 − a). Positive means homogeneous equilibria at u = a are
    /// locally asymptotically stable (for a = 0.5 this is λ > 0.25).
    pub fn homogeneous_stability_margin(&self) -> f64 {
        let a = self.bistability;
        self.homeostasis - a * (1.0 - a)
    }

    /// μ > κ/2: the energy is non-increasing under zero input
    pub fn energy_descends(&self) -> bool {
        self.self_model_rate > self.coherence_weight / 2.0
    }

    /// Check the scalars, then `target` against the vocabulary size and [0, 1]
    pub fn validate(&self, n: usize) -> Result<(), IdentityError> {
        let non_negative = [
            ("diffusion", self.diffusion),
            ("homeostasis", self.homeostasis),
            ("self_model_rate", self.self_model_rate),
            ("coherence_weight", self.coherence_weight),
            ("filter_sharpness", self.filter_sharpness),
            ("filter_gain", self.filter_gain),
        ];
        for (name, value) in non_negative {
            if !value.is_finite() || value < 0.0 {
                return Err(IdentityError::InvalidParameter {
                    name,
                    value,
                    requirement: "non-negative",
                });
            }
        }
        if !(0.0..=1.0).contains(&self.bistability) {
            return Err(IdentityError::InvalidParameter {
                name: "bistability",
                value: self.bistability,
                requirement: "in [0, 1]",
            });
        }

        if self.target.len() != n {
            return Err(IdentityError::DimensionMismatch {
                expected: n,
                actual: self.target.len(),
            });
        }
        if let Some((index, &value)) = self
            .target
            .iter()
            .enumerate()
            .find(|(_, v)| !(0.0..=1.0).contains(*v))
        {
            return Err(IdentityError::ValueOutOfRange { index, value });
        }
        Ok(())
    }
}

// =============================================================================
// TESTS
// =============================================================================
