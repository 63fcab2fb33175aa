//! selfwake: persistent identity for stateless agent processes
//!
//! Identity is the equilibrium of a small dynamical system over a fixed
//! vocabulary of dimensions. Actual weights `w` and the self-model `m` are
//! integrated by the [`core::StateEngine`]; discrete, signed declarations are
//! hash-linked in a [`core::DeclarationChain`]; a [`types::ContinuityProof`]
//! summarises both; and [`core::WakeReconstructor`] turns a persisted snapshot
//! back into a live [`core::ActiveSelf`].

pub mod config;
pub mod core;
pub mod error;
pub mod types;

pub use config::WakeConfig;
pub use error::{IdentityError, StoreError, WakeError};

// =============================================================================
// VOCABULARY BOUNDS [C]
// =============================================================================

/// Maximum number of identity dimensions
pub const MAX_DIMENSIONS: usize = 16;

/// Maximum length of a dimension name in bytes
pub const MAX_DIMENSION_NAME_LEN: usize = 16;

/// Maximum pivotal experience hashes kept per identity
pub const MAX_PIVOTAL_EXPERIENCES: usize = 4;

/// Maximum Euler steps in one `evolve_for` call
pub const MAX_EVOLVE_STEPS: usize = 10_000;

// =============================================================================
// CANONICAL ENCODING [C]
// =============================================================================

/// Fixed-point scale for declaration values (0.5 = 5000, 1.0 = 10000)
pub const VALUE_SCALE: u64 = 10_000;

/// Version tag prepended to every canonical declaration encoding
pub const ENCODING_VERSION: u8 = 1;

/// `previous_hash` of the first declaration in a chain
pub const GENESIS_PREVIOUS_HASH: [u8; 32] = [0u8; 32];

// =============================================================================
// DEFAULT PARAMETERS [C]
// =============================================================================

/// Diffusion along the relationship graph (D)
pub const DEFAULT_DIFFUSION: f64 = 0.1;

/// Pull toward the target identity w* (λ). Must exceed a(1-a) = 0.25.
pub const DEFAULT_HOMEOSTASIS: f64 = 0.4;

/// Self-model tracking rate (μ)
pub const DEFAULT_SELF_MODEL_RATE: f64 = 0.3;

/// Coherence weight in the energy (κ). Energy descent needs μ > κ/2.
pub const DEFAULT_COHERENCE_WEIGHT: f64 = 0.1;

/// Bistable threshold (a)
pub const DEFAULT_BISTABILITY: f64 = 0.5;

/// Interpretive filter sharpness (β)
pub const DEFAULT_FILTER_SHARPNESS: f64 = 4.0;

/// Interpretive filter gain (γ)
pub const DEFAULT_FILTER_GAIN: f64 = 1.0;

/// Initial weight for every dimension at genesis, also the default w*
pub const DEFAULT_WEIGHT: f64 = 0.5;

// =============================================================================
// WAKE THRESHOLDS [C]
// =============================================================================

/// Continuity below this fails wake
pub const DEFAULT_CONTINUITY_THRESHOLD: f64 = 0.01;

/// ‖w − m‖ above this fails wake
pub const DEFAULT_COHERENCE_THRESHOLD: f64 = 0.5;

/// Step size used by fixed-point search
pub const DEFAULT_FIXED_POINT_DT: f64 = 0.1;

/// Iteration cap for fixed-point search
pub const DEFAULT_FIXED_POINT_MAX_ITER: usize = 10_000;

/// Convergence tolerance for fixed-point search
pub const DEFAULT_FIXED_POINT_TOL: f64 = 1e-7;

/// Minimum seconds between declarations (0 disables the limit)
pub const DEFAULT_DECLARATION_INTERVAL_SECS: i64 = 0;

// =============================================================================
// VERSION
// =============================================================================

pub const VERSION: &str = "1.0.0";
