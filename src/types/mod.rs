//! Core types for selfwake

mod declaration;
mod identity;
mod params;
mod pivotal;
mod proof;
mod signals;
mod state;
mod trajectory;
mod vocabulary;

pub use declaration::{to_fixed_point, Declaration, CANONICAL_HEADER_LEN};
pub(crate) use declaration::sha256;
pub use identity::{Seal, StoredIdentity};
pub use params::Parameters;
pub use pivotal::PivotalExperience;
pub use proof::{ContinuityProof, ProofReason, PROOF_VERSION};
pub use signals::{NumericDivergence, StabilityEstimate, StabilityWarning};
pub use state::SelfState;
pub use trajectory::{ChangeKind, Trajectory, TrajectoryEvent};
pub use vocabulary::{Laplacian, Relationship, Vocabulary};
