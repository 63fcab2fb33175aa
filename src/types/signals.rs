//! Non-fatal diagnostics attached to engine and wake results

use serde::{Deserialize, Serialize};

/// Coordinates an Euler step pushed outside [0, 1] before clamping
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NumericDivergence {
    /// Indices into w that were clamped
    pub w: Vec<usize>,
    /// Indices into m that were clamped
    pub m: Vec<usize>,
    /// Largest distance outside [0, 1] before clamping
    pub max_excess: f64,
}

impl NumericDivergence {
    pub fn is_empty(&self) -> bool {
        self.w.is_empty() && self.m.is_empty()
    }

    /// Number of clamped coordinates
    pub fn count(&self) -> usize {
        self.w.len() + self.m.len()
    }
}

/// Gershgorin bound on the Jacobian spectrum at a state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StabilityEstimate {
    /// Upper bound on the largest real part of any eigenvalue
    pub spectral_bound: f64,
    /// Dimension whose disc attains the bound
    pub critical_dimension: usize,
}

impl StabilityEstimate {
    /// Bound strictly negative: the state is locally asymptotically stable
    pub fn is_stable(&self) -> bool {
        self.spectral_bound < 0.0
    }
}

/// Surfaced by wake when stability cannot be certified; wake still succeeds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StabilityWarning {
    pub estimate: StabilityEstimate,
    /// Name of the critical dimension
    pub dimension: String,
}

impl StabilityWarning {
    /// Get code string
    pub fn code(&self) -> &'static str {
        "R410_WAKE_STABILITY_WARNING"
    }
}

impl std::fmt::Display for StabilityWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}: spectral bound {:.4} at '{}'",
            self.code(),
            self.estimate.spectral_bound,
            self.dimension
        )
    }
}
