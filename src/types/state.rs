//! Self-state: actual weights `w` and self-model `m`

use serde::{Deserialize, Serialize};

use crate::error::IdentityError;
use crate::DEFAULT_WEIGHT;

/// `(w, m)` over n dimensions plus logical time.
///
/// Both vectors stay in [0, 1]^n at every observable boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelfState {
    /// Actual identity weights
    pub w: Vec<f64>,
    /// Self-model
    pub m: Vec<f64>,
    /// Accumulated integration time
    pub time: f64,
}

impl SelfState {
    /// Coherent state with every coordinate at `value`
    pub fn uniform(n: usize, value: f64) -> Self {
        Self {
            w: vec![value; n],
            m: vec![value; n],
            time: 0.0,
        }
    }

    /// Genesis default: all 0.5, m = w
    pub fn genesis(n: usize) -> Self {
        Self::uniform(n, DEFAULT_WEIGHT)
    }

    /// Coherent state m = w from explicit weights
    pub fn from_weights(w: Vec<f64>) -> Result<Self, IdentityError> {
        Self::new(w.clone(), w)
    }

    /// Explicit `(w, m)`, validated
    pub fn new(w: Vec<f64>, m: Vec<f64>) -> Result<Self, IdentityError> {
        let state = Self { w, m, time: 0.0 };
        state.validate(state.w.len())?;
        Ok(state)
    }

    /// Number of dimensions
    pub fn dimension(&self) -> usize {
        self.w.len()
    }

    /// Check dimensions and that both vectors lie in [0, 1]
    pub fn validate(&self, n: usize) -> Result<(), IdentityError> {
        for v in [&self.w, &self.m] {
            if v.len() != n {
                return Err(IdentityError::DimensionMismatch {
                    expected: n,
                    actual: v.len(),
                });
            }
        }
        for v in [&self.w, &self.m] {
            if let Some((index, &value)) = v
                .iter()
                .enumerate()
                .find(|(_, x)| !(0.0..=1.0).contains(*x))
            {
                return Err(IdentityError::ValueOutOfRange { index, value });
            }
        }
        Ok(())
    }

    /// ‖w − m‖ (Euclidean)
    pub fn coherence(&self) -> f64 {
        euclidean(&self.w, &self.m)
    }

    /// Euclidean distance between the concatenated (w, m) vectors
    pub fn distance(&self, other: &SelfState) -> f64 {
        let dw = euclidean(&self.w, &other.w);
        let dm = euclidean(&self.m, &other.m);
        (dw * dw + dm * dm).sqrt()
    }

    /// Max |Δ| over every coordinate of w and m
    pub fn max_abs_change(&self, other: &SelfState) -> f64 {
        self.w
            .iter()
            .zip(&other.w)
            .chain(self.m.iter().zip(&other.m))
            .map(|(a, b)| (a - b).abs())
            .fold(0.0, f64::max)
    }
}

/// ‖a − b‖₂
pub(crate) fn euclidean(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f64>()
        .sqrt()
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_genesis_is_coherent() {
        let s = SelfState::genesis(4);
        assert_eq!(s.w, vec![0.5; 4]);
        assert_eq!(s.coherence(), 0.0);
        assert_eq!(s.time, 0.0);
    }

    #[test]
    fn test_new_rejects_out_of_range() {
        let err = SelfState::new(vec![0.2, 1.2], vec![0.2, 0.3]).unwrap_err();
        assert_eq!(err, IdentityError::ValueOutOfRange { index: 1, value: 1.2 });

        let err = SelfState::new(vec![0.2, 0.3], vec![0.2]).unwrap_err();
        assert_eq!(err, IdentityError::DimensionMismatch { expected: 2, actual: 1 });
    }

    #[test]
    fn test_norms() {
        let a = SelfState::new(vec![0.0, 0.0], vec![0.3, 0.4]).unwrap();
        assert!((a.coherence() - 0.5).abs() < 1e-12);

        let b = SelfState::new(vec![0.0, 0.0], vec![0.0, 0.0]).unwrap();
        assert!((a.distance(&b) - 0.5).abs() < 1e-12);
        assert!((a.max_abs_change(&b) - 0.4).abs() < 1e-12);
    }
}
