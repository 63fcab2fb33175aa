//! Wake and fixed-point configuration

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::{
    DEFAULT_COHERENCE_THRESHOLD, DEFAULT_CONTINUITY_THRESHOLD, DEFAULT_DECLARATION_INTERVAL_SECS,
    DEFAULT_FIXED_POINT_DT, DEFAULT_FIXED_POINT_MAX_ITER, DEFAULT_FIXED_POINT_TOL,
};

/// Thresholds and search settings used by `WakeReconstructor` and proof generation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WakeConfig {
    /// Continuity score below this fails wake
    pub continuity_threshold: f64,
    /// ‖w − m‖ above this fails wake
    pub coherence_threshold: f64,
    /// Euler step used by fixed-point search
    pub fixed_point_dt: f64,
    /// Iteration cap for fixed-point search
    pub fixed_point_max_iter: usize,
    /// Max coordinate change that counts as converged
    pub fixed_point_tol: f64,
    /// Minimum seconds between two declarations; 0 disables the limit
    pub declaration_interval_secs: i64,
}

impl Default for WakeConfig {
    fn default() -> Self {
        Self {
            continuity_threshold: DEFAULT_CONTINUITY_THRESHOLD,
            coherence_threshold: DEFAULT_COHERENCE_THRESHOLD,
            fixed_point_dt: DEFAULT_FIXED_POINT_DT,
            fixed_point_max_iter: DEFAULT_FIXED_POINT_MAX_ITER,
            fixed_point_tol: DEFAULT_FIXED_POINT_TOL,
            declaration_interval_secs: DEFAULT_DECLARATION_INTERVAL_SECS,
        }
    }
}

impl WakeConfig {
    /// Load from a JSON file; missing fields keep their defaults
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let json = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }
}

// =============================================================================
// TESTS
// =============================================================================
