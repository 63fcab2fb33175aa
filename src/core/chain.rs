//! Declaration Chain: append-only, hash-linked, signed assertions
//!
//! Each entry's `previous_hash` is the SHA-256 of the canonical bytes of the
//! entry before it; the first entry links to 32 zero bytes. Entries live in a
//! plain vector indexed by position.

use serde::{Deserialize, Serialize};

use crate::core::signing::{SignatureVerifier, Signer};
use crate::error::{ChainBreak, ChainFault, DeclarationFault, IdentityError};
use crate::types::{sha256, to_fixed_point, Declaration, SelfState};
use crate::{GENESIS_PREVIOUS_HASH, VALUE_SCALE};

/// Build and sign a declaration.
///
/// Rejects `index >= dimensions` and values outside [0, 1] (NaN included);
/// nothing is clamped.
pub fn create_declaration<S: Signer + ?Sized>(
    dimensions: usize,
    index: usize,
    value: f64,
    content: &str,
    previous_hash: [u8; 32],
    timestamp: i64,
    signer: &S,
) -> Result<Declaration, IdentityError> {
    if index >= dimensions {
        return Err(IdentityError::InvalidDeclaration(
            DeclarationFault::IndexOutOfRange { index, dimensions },
        ));
    }
    if !(0.0..=1.0).contains(&value) {
        return Err(IdentityError::InvalidDeclaration(
            DeclarationFault::ValueOutOfRange { value },
        ));
    }

    let scaled = to_fixed_point(value);
    let bytes = Declaration::encode(index, scaled, timestamp, &previous_hash, content);
    let signature = signer.sign(&bytes);

    Ok(Declaration::new(
        index,
        scaled,
        timestamp,
        previous_hash,
        content.to_string(),
        signature,
    ))
}

/// Set `w_i = m_i = value` at the declared index; every other coordinate
/// and the time are unchanged.
pub fn apply_declaration(
    state: &SelfState,
    declaration: &Declaration,
) -> Result<SelfState, IdentityError> {
    let index = declaration.index();
    let dimensions = state.dimension();
    if index >= dimensions {
        return Err(IdentityError::InvalidDeclaration(
            DeclarationFault::IndexOutOfRange { index, dimensions },
        ));
    }
    let value = declaration.value();
    if declaration.value_scaled() > VALUE_SCALE {
        return Err(IdentityError::InvalidDeclaration(
            DeclarationFault::ValueOutOfRange { value },
        ));
    }

    let mut next = state.clone();
    next.w[index] = value;
    next.m[index] = value;
    Ok(next)
}

/// Walk the chain once, returning the first failing position.
///
/// Position i fails if its `previous_hash` differs from the hash of entry
/// i − 1 (zeros for i = 0), or if its signature does not verify over its
/// canonical bytes.
pub fn verify_chain<V: SignatureVerifier + ?Sized>(
    declarations: &[Declaration],
    verifier: &V,
    public_key: &[u8; 32],
) -> Result<(), ChainBreak> {
    let mut expected_previous = GENESIS_PREVIOUS_HASH;

    for (index, declaration) in declarations.iter().enumerate() {
        if declaration.previous_hash() != &expected_previous {
            let fault = if index == 0 {
                ChainFault::BadGenesisLink
            } else {
                ChainFault::BrokenLink
            };
            return Err(chain_break(index, fault));
        }

        let bytes = declaration.canonical_bytes();
        if !verifier.verify(&bytes, declaration.signature(), public_key) {
            return Err(chain_break(index, ChainFault::BadSignature));
        }

        expected_previous = sha256(&bytes);
    }

    Ok(())
}

/// Every declaration must fit an n-dimensional vocabulary
pub fn check_vocabulary(declarations: &[Declaration], dimensions: usize) -> Result<(), ChainBreak> {
    match declarations
        .iter()
        .position(|d| d.index() >= dimensions || d.value_scaled() > VALUE_SCALE)
    {
        Some(index) => Err(chain_break(index, ChainFault::OutOfVocabulary)),
        None => Ok(()),
    }
}

fn chain_break(index: usize, fault: ChainFault) -> ChainBreak {
    tracing::warn!(index, ?fault, "declaration chain break");
    ChainBreak { index, fault }
}

/// Owned, append-only declaration log
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeclarationChain {
    entries: Vec<Declaration>,
}

impl DeclarationChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap stored declarations. Links are not checked here; use `verify`.
    pub fn from_declarations(entries: Vec<Declaration>) -> Self {
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn as_slice(&self) -> &[Declaration] {
        &self.entries
    }

    pub fn iter(&self) -> impl Iterator<Item = &Declaration> {
        self.entries.iter()
    }

    pub fn last(&self) -> Option<&Declaration> {
        self.entries.last()
    }

    pub fn into_declarations(self) -> Vec<Declaration> {
        self.entries
    }

    /// Hash the next entry must link to
    pub fn head_hash(&self) -> [u8; 32] {
        self.entries
            .last()
            .map(Declaration::hash)
            .unwrap_or(GENESIS_PREVIOUS_HASH)
    }

    /// Hash of the first entry (zeros when empty)
    pub fn genesis_hash(&self) -> [u8; 32] {
        self.entries
            .first()
            .map(Declaration::hash)
            .unwrap_or(GENESIS_PREVIOUS_HASH)
    }

    /// Append an already-built declaration. It must link to the head.
    pub fn append(&mut self, declaration: Declaration) -> Result<(), IdentityError> {
        let head = self.head_hash();
        if declaration.previous_hash() != &head {
            return Err(IdentityError::ChainLinkMismatch {
                expected: hex::encode(head),
                actual: hex::encode(declaration.previous_hash()),
            });
        }
        self.entries.push(declaration);
        Ok(())
    }

    /// Create, sign and append a declaration stamped with the current time.
    /// On error the chain is left untouched.
    pub fn declare<S: Signer + ?Sized>(
        &mut self,
        dimensions: usize,
        index: usize,
        value: f64,
        content: &str,
        signer: &S,
    ) -> Result<&Declaration, IdentityError> {
        let timestamp = chrono::Utc::now().timestamp();
        let declaration = create_declaration(
            dimensions,
            index,
            value,
            content,
            self.head_hash(),
            timestamp,
            signer,
        )?;
        self.append(declaration)?;

        let position = self.entries.len() - 1;
        tracing::info!(position, index, value, "declaration recorded");
        Ok(&self.entries[position])
    }

    pub fn verify<V: SignatureVerifier + ?Sized>(
        &self,
        verifier: &V,
        public_key: &[u8; 32],
    ) -> Result<(), ChainBreak> {
        verify_chain(&self.entries, verifier, public_key)
    }
}

// =============================================================================
// TESTS
// =============================================================================
