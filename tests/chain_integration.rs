//! Declaration chain and continuity proof integration tests

use pretty_assertions::assert_eq;
use selfwake::config::WakeConfig;
use selfwake::core::{
    apply_declaration, create_declaration, verify_chain, verify_proof, ContinuityProofGenerator,
    DeclarationChain, Ed25519Signer, Ed25519Verifier, StateEngine,
};
use selfwake::error::{ChainFault, DeclarationFault};
use selfwake::types::{ContinuityProof, Declaration, Parameters, SelfState, Trajectory, Vocabulary};
use selfwake::IdentityError;

const SEED: [u8; 32] = [11u8; 32];

fn vocabulary() -> Vocabulary {
    Vocabulary::define(["curiosity", "precision", "persistence", "empathy"], vec![]).unwrap()
}

fn signed_chain(len: usize) -> (DeclarationChain, [u8; 32]) {
    let signer = Ed25519Signer::from_seed(&SEED);
    let mut chain = DeclarationChain::new();
    for k in 0..len {
        let content = format!("I hold dimension {} at level {}", k % 4, k);
        chain.declare(4, k % 4, 0.2 + 0.1 * (k % 6) as f64, &content, &signer).unwrap();
    }
    (chain, signer.public_key())
}

/// Round-trip declarations through JSON, editing entry `at` on the way
fn tamper(chain: &DeclarationChain, at: usize, edit: impl Fn(&mut serde_json::Value)) -> Vec<Declaration> {
    let mut json = serde_json::to_value(chain.as_slice()).unwrap();
    edit(&mut json[at]);
    serde_json::from_value(json).unwrap()
}

#[test]
fn test_canonical_encoding_layout() {
    let prev = [0xabu8; 32];
    let bytes = Declaration::encode(2, 7500, 1_700_000_000, &prev, "hi");

    assert_eq!(bytes.len(), 1 + 4 + 8 + 8 + 32 + 4 + 2);
    assert_eq!(bytes[0], 1);
    assert_eq!(&bytes[1..5], &2u32.to_be_bytes());
    assert_eq!(&bytes[5..13], &7500u64.to_be_bytes());
    assert_eq!(&bytes[13..21], &1_700_000_000i64.to_be_bytes());
    assert_eq!(&bytes[21..53], &prev);
    assert_eq!(&bytes[53..57], &2u32.to_be_bytes());
    assert_eq!(&bytes[57..], b"hi");
}

#[test]
fn test_valid_chain_verifies() {
    let (chain, pk) = signed_chain(6);
    assert_eq!(verify_chain(chain.as_slice(), &Ed25519Verifier, &pk), Ok(()));
}

#[test]
fn test_single_content_byte_change_is_caught() {
    let (chain, pk) = signed_chain(5);
    for at in 0..chain.len() {
        let tampered = tamper(&chain, at, |entry| {
            let mut content = entry["content"].as_str().unwrap().to_string();
            content.replace_range(0..1, "i");
            entry["content"] = serde_json::Value::String(content);
        });
        let err = verify_chain(&tampered, &Ed25519Verifier, &pk).unwrap_err();
        assert!(err.index >= at, "tamper at {at} reported at {}", err.index);
        assert_eq!(err.index, at);
        assert_eq!(err.fault, ChainFault::BadSignature);
    }
}

#[test]
fn test_value_and_link_tampering() {
    let (chain, pk) = signed_chain(4);

    let tampered = tamper(&chain, 2, |entry| entry["value"] = serde_json::json!(9999));
    assert_eq!(verify_chain(&tampered, &Ed25519Verifier, &pk).unwrap_err().index, 2);

    let tampered = tamper(&chain, 3, |entry| {
        entry["previous_hash"] = serde_json::Value::String("00".repeat(32));
    });
    let err = verify_chain(&tampered, &Ed25519Verifier, &pk).unwrap_err();
    assert_eq!((err.index, err.fault), (3, ChainFault::BrokenLink));
}

#[test]
fn test_dropped_entry_breaks_chain() {
    let (chain, pk) = signed_chain(4);
    let mut entries = chain.into_declarations();
    entries.remove(1);
    let err = verify_chain(&entries, &Ed25519Verifier, &pk).unwrap_err();
    assert_eq!((err.index, err.fault), (1, ChainFault::BrokenLink));
}

#[test]
fn test_invalid_declaration_does_not_mutate_chain() {
    let signer = Ed25519Signer::from_seed(&SEED);
    let (mut chain, _) = signed_chain(2);
    let before = chain.clone();

    let err = chain.declare(4, 4, 0.5, "out of range", &signer).unwrap_err();
    assert_eq!(
        err,
        IdentityError::InvalidDeclaration(DeclarationFault::IndexOutOfRange { index: 4, dimensions: 4 })
    );
    let err = chain.declare(4, 0, 1.5, "too large", &signer).unwrap_err();
    assert_eq!(err, IdentityError::InvalidDeclaration(DeclarationFault::ValueOutOfRange { value: 1.5 }));

    assert_eq!(chain, before);
}

#[test]
fn test_declarations_replay_onto_state() {
    let signer = Ed25519Signer::from_seed(&SEED);
    let mut state = SelfState::new(vec![0.3, 0.3, 0.3, 0.3], vec![0.4, 0.2, 0.3, 0.35]).unwrap();
    let mut previous = [0u8; 32];

    for (index, value) in [(0, 0.9), (3, 0.1), (0, 0.6)] {
        let d = create_declaration(4, index, value, "replay", previous, 1_700_000_000, &signer).unwrap();
        let before = state.coherence();
        state = apply_declaration(&state, &d).unwrap();
        assert!(state.coherence() <= before);
        previous = d.hash();
    }
    assert_eq!(state.w, vec![0.6, 0.3, 0.3, 0.1]);
    assert_eq!(state.m, vec![0.6, 0.2, 0.3, 0.1]);
}

#[test]
fn test_proof_round_trip_and_substitution() {
    let engine = StateEngine::new(&vocabulary(), Parameters::default_for(4)).unwrap();
    let config = WakeConfig::default();
    let generator = ContinuityProofGenerator::new(&engine, &config);

    let (chain, _) = signed_chain(5);
    let state = SelfState::new(vec![0.4, 0.6, 0.5, 0.5], vec![0.45, 0.6, 0.5, 0.4]).unwrap();
    let proof = generator.generate_proof(&state, chain.as_slice(), &Trajectory::new()).unwrap();
    assert!(verify_proof(&proof, &state, chain.as_slice()));

    // structurally valid but unrelated chain and state
    let (other_chain, _) = signed_chain(3);
    let other_state = SelfState::from_weights(vec![0.1, 0.2, 0.3, 0.4]).unwrap();
    let other = generator
        .generate_proof(&other_state, other_chain.as_slice(), &Trajectory::new())
        .unwrap();
    assert_ne!(other.current_hash, proof.current_hash);
    assert!(!verify_proof(&proof, &other_state, other_chain.as_slice()));
    assert!(!verify_proof(&other, &state, chain.as_slice()));
}

#[test]
fn test_proof_record_is_fixed_size() {
    let engine = StateEngine::new(&vocabulary(), Parameters::default_for(4)).unwrap();
    let config = WakeConfig::default();
    let (chain, _) = signed_chain(2);
    let proof = ContinuityProofGenerator::new(&engine, &config)
        .generate_proof(&SelfState::genesis(4), chain.as_slice(), &Trajectory::new())
        .unwrap();

    let bytes = proof.to_bytes();
    assert_eq!(bytes.len(), ContinuityProof::SIZE);
    assert_eq!(&bytes[2..34], &chain.genesis_hash());
    assert_eq!(proof.to_hex().len(), 2 * ContinuityProof::SIZE);

    let json = serde_json::to_string(&proof).unwrap();
    let back: ContinuityProof = serde_json::from_str(&json).unwrap();
    assert_eq!(back, proof);
}
