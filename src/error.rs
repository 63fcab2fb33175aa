//! Error types
//!
//! Every variant carries a stable R-code (`code()`) so logs and API payloads
//! can be matched without parsing messages.

use serde::Serialize;
use thiserror::Error;

/// Why a declaration was rejected at creation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Error)]
pub enum DeclarationFault {
    #[error("dimension index {index} out of range (vocabulary has {dimensions})")]
    IndexOutOfRange { index: usize, dimensions: usize },

    #[error("value {value} outside [0, 1]")]
    ValueOutOfRange { value: f64 },
}

/// Errors from vocabulary definition, state handling and declarations
#[derive(Debug, Clone, PartialEq, Error)]
pub enum IdentityError {
    #[error("vocabulary must have at least one dimension")]
    EmptyVocabulary,

    #[error("too many dimensions: {count} (max {max})")]
    TooManyDimensions { count: usize, max: usize },

    #[error("dimension name '{name}' exceeds {max} bytes")]
    NameTooLong { name: String, max: usize },

    #[error("duplicate dimension name '{0}'")]
    DuplicateName(String),

    #[error("invalid relationship {from}-{to}: {reason}")]
    InvalidRelationship { from: usize, to: usize, reason: &'static str },

    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("coordinate {index} = {value} outside [0, 1]")]
    ValueOutOfRange { index: usize, value: f64 },

    #[error("time step must be finite and positive, got {0}")]
    InvalidTimeStep(f64),

    #[error("parameter {name} = {value} must be finite and {requirement}")]
    InvalidParameter { name: &'static str, value: f64, requirement: &'static str },

    #[error("{steps} steps requested (max {max})")]
    TooManySteps { steps: usize, max: usize },

    #[error("invalid declaration: {0}")]
    InvalidDeclaration(DeclarationFault),

    #[error("declaration does not link to chain head (expected {expected}, got {actual})")]
    ChainLinkMismatch { expected: String, actual: String },

    #[error("declaration rate limit: retry in {retry_after_secs}s")]
    RateLimitExceeded { retry_after_secs: i64 },

    #[error("too many pivotal experiences (max {max})")]
    TooManyPivotalExperiences { max: usize },
}

impl IdentityError {
    /// Get code string
    pub fn code(&self) -> &'static str {
        match self {
            Self::EmptyVocabulary => "R501_VOCABULARY_EMPTY",
            Self::TooManyDimensions { .. } => "R502_VOCABULARY_TOO_LARGE",
            Self::NameTooLong { .. } => "R503_VOCABULARY_NAME_TOO_LONG",
            Self::DuplicateName(_) => "R504_VOCABULARY_DUPLICATE_NAME",
            Self::InvalidRelationship { .. } => "R505_VOCABULARY_BAD_RELATIONSHIP",
            Self::DimensionMismatch { .. } => "R510_DIMENSION_MISMATCH",
            Self::ValueOutOfRange { .. } => "R511_VALUE_OUT_OF_RANGE",
            Self::InvalidTimeStep(_) => "R512_INVALID_TIME_STEP",
            Self::InvalidParameter { .. } => "R513_INVALID_PARAMETER",
            Self::TooManySteps { .. } => "R514_TOO_MANY_STEPS",
            Self::InvalidDeclaration(_) => "R520_INVALID_DECLARATION",
            Self::ChainLinkMismatch { .. } => "R521_CHAIN_LINK_MISMATCH",
            Self::RateLimitExceeded { .. } => "R522_DECLARATION_RATE_LIMIT",
            Self::TooManyPivotalExperiences { .. } => "R530_PIVOTAL_LIMIT",
        }
    }
}

/// What failed at a chain position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChainFault {
    /// First entry does not start from the genesis previous hash
    BadGenesisLink,
    /// `previous_hash` differs from the hash of the entry before it
    BrokenLink,
    /// Signature does not verify over the canonical bytes
    BadSignature,
    /// Declaration references a dimension or value the vocabulary cannot hold
    OutOfVocabulary,
}

/// First failing position in a declaration chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Error)]
#[error("chain breaks at index {index}: {fault:?}")]
pub struct ChainBreak {
    pub index: usize,
    pub fault: ChainFault,
}

/// Errors that stop `wake()` from returning an `ActiveSelf`
#[derive(Debug, Clone, PartialEq, Error)]
pub enum WakeError {
    #[error("stored identity is malformed: {0}")]
    Malformed(#[from] IdentityError),

    #[error("declaration chain integrity: {0}")]
    ChainIntegrity(ChainBreak),

    #[error("stored continuity proof does not match chain and state")]
    ProofMismatch,

    #[error("continuity {score:.6} below threshold {threshold}")]
    ContinuityViolation { score: f64, threshold: f64 },

    #[error("coherence ‖w − m‖ = {coherence:.6} exceeds threshold {threshold}")]
    CoherenceViolation { coherence: f64, threshold: f64 },
}

impl WakeError {
    /// Get code string
    pub fn code(&self) -> &'static str {
        match self {
            Self::Malformed(_) => "R400_WAKE_MALFORMED",
            Self::ChainIntegrity(_) => "R401_WAKE_CHAIN_INTEGRITY",
            Self::ProofMismatch => "R402_WAKE_PROOF_MISMATCH",
            Self::ContinuityViolation { .. } => "R403_WAKE_CONTINUITY_VIOLATION",
            Self::CoherenceViolation { .. } => "R404_WAKE_COHERENCE_VIOLATION",
        }
    }
}

/// Persistence boundary errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("key not found: {0}")]
    NotFound(String),

    #[error("version conflict: expected {expected}, found {found}")]
    VersionConflict { expected: u64, found: u64 },

    #[error("invalid key '{0}'")]
    InvalidKey(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    /// Get code string
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "R601_STORE_NOT_FOUND",
            Self::VersionConflict { .. } => "R602_STORE_VERSION_CONFLICT",
            Self::InvalidKey(_) => "R603_STORE_INVALID_KEY",
            Self::Serialization(_) => "R604_STORE_SERIALIZE_ERROR",
            Self::Io(_) => "R605_STORE_IO_ERROR",
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
