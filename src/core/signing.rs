//! Signing boundary
//!
//! The engine only ever calls `sign(bytes)` and
//! `verify(bytes, signature, public_key)`. Closures of those shapes work
//! directly; `Ed25519Signer` / `Ed25519Verifier` are ready-made adapters.

use ed25519_dalek::{Signature, SigningKey, VerifyingKey};

/// Produces a 64-byte signature over canonical bytes
pub trait Signer: Send + Sync {
    fn sign(&self, message: &[u8]) -> [u8; 64];
}

/// Checks a 64-byte signature against a 32-byte public key
pub trait SignatureVerifier: Send + Sync {
    fn verify(&self, message: &[u8], signature: &[u8; 64], public_key: &[u8; 32]) -> bool;
}

impl<F> Signer for F
where
    F: Fn(&[u8]) -> [u8; 64] + Send + Sync,
{
    fn sign(&self, message: &[u8]) -> [u8; 64] {
        self(message)
    }
}

impl<F> SignatureVerifier for F
where
    F: Fn(&[u8], &[u8; 64], &[u8; 32]) -> bool + Send + Sync,
{
    fn verify(&self, message: &[u8], signature: &[u8; 64], public_key: &[u8; 32]) -> bool {
        self(message, signature, public_key)
    }
}

/// Ed25519 signer from a 32-byte secret seed
pub struct Ed25519Signer {
    key: SigningKey,
}

impl Ed25519Signer {
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        Self {
            key: SigningKey::from_bytes(seed),
        }
    }

    /// Public key matching this signer
    pub fn public_key(&self) -> [u8; 32] {
        self.key.verifying_key().to_bytes()
    }
}

impl std::fmt::Debug for Ed25519Signer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Ed25519Signer({})", hex::encode(self.public_key()))
    }
}

impl Signer for Ed25519Signer {
    fn sign(&self, message: &[u8]) -> [u8; 64] {
        use ed25519_dalek::Signer as _;
        self.key.sign(message).to_bytes()
    }
}

/// Strict Ed25519 verification
#[derive(Debug, Clone, Copy, Default)]
pub struct Ed25519Verifier;

impl SignatureVerifier for Ed25519Verifier {
    fn verify(&self, message: &[u8], signature: &[u8; 64], public_key: &[u8; 32]) -> bool {
        let Ok(key) = VerifyingKey::from_bytes(public_key) else {
            return false;
        };
        let signature = Signature::from_bytes(signature);
        key.verify_strict(message, &signature).is_ok()
    }
}

// =============================================================================
// TESTS
// =============================================================================
