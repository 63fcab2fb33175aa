//! Core modules for selfwake

pub mod api;
pub mod chain;
pub mod engine;
pub mod filter;
pub mod proof;
pub mod signing;
pub mod store;
pub mod wake;

pub use api::{create_router, run_server, AppState};
pub use chain::{apply_declaration, check_vocabulary, create_declaration, verify_chain, DeclarationChain};
pub use engine::{FixedPointResult, StateEngine, StepOutcome};
pub use filter::{derive_filter, InterpretiveFilter};
pub use proof::{
    check_proof, check_trajectory, compute_continuity_score, merkle_root, verify_proof, ContinuityProofGenerator,
};
pub use signing::{Ed25519Signer, Ed25519Verifier, SignatureVerifier, Signer};
pub use store::{load_identity, save_identity, FileStore, MemoryStore, SnapshotStore};
pub use wake::{ActiveSelf, WakeContext, WakeReconstructor};
