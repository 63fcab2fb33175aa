//! Interpretive filter: how the self-model reweights incoming experience
//!
//! g_i = γ / (1 + exp(−β (m_i − ½)))
//! F_m(e)_i = g_i · e_i
//!
//! Dimensions the agent believes strongly in amplify experience along them;
//! dimensions it disbelieves damp it. Pure function of `m`: never cache it
//! across a change of the self-model.

use serde::{Deserialize, Serialize};

use crate::error::IdentityError;

/// Per-dimension gains derived from a self-model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterpretiveFilter {
    gains: Vec<f64>,
}

/// Derive the filter for self-model `m`
pub fn derive_filter(m: &[f64], sharpness: f64, gain: f64) -> InterpretiveFilter {
    let gains = m
        .iter()
        .map(|&mi| gain / (1.0 + (-sharpness * (mi - 0.5)).exp()))
        .collect();
    InterpretiveFilter { gains }
}

impl InterpretiveFilter {
    pub fn gains(&self) -> &[f64] {
        &self.gains
    }

    pub fn dimension(&self) -> usize {
        self.gains.len()
    }

    /// F_m(e)
    pub fn apply(&self, experience: &[f64]) -> Result<Vec<f64>, IdentityError> {
        if experience.len() != self.gains.len() {
            return Err(IdentityError::DimensionMismatch {
                expected: self.gains.len(),
                actual: experience.len(),
            });
        }
        Ok(self
            .gains
            .iter()
            .zip(experience)
            .map(|(g, e)| g * e)
            .collect())
    }
}

// =============================================================================
// TESTS
// =============================================================================
