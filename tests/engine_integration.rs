//! Engine integration tests: convergence, energy descent, stability, clamping

use proptest::prelude::*;
use selfwake::core::StateEngine;
use selfwake::types::{Parameters, Relationship, SelfState, Vocabulary};

fn ring_vocabulary() -> Vocabulary {
    Vocabulary::define(
        ["curiosity", "precision", "persistence", "empathy"],
        vec![
            Relationship::new(0, 1),
            Relationship::new(1, 2),
            Relationship::new(2, 3),
            Relationship::new(3, 0),
        ],
    )
    .unwrap()
}

fn default_engine() -> StateEngine {
    StateEngine::new(&ring_vocabulary(), Parameters::default_for(4)).unwrap()
}

#[test]
fn test_fixed_point_from_spread_state() {
    let engine = default_engine();
    let params = engine.params();
    assert!((params.bistability - 0.5).abs() < 1e-12);
    assert!((params.homeostasis - 0.4).abs() < 1e-12);

    let start = SelfState::from_weights(vec![0.1, 0.9, 0.2, 0.8]).unwrap();
    let result = engine.find_fixed_point(&start, 0.1, 10_000, 1e-7).unwrap();

    assert!(result.converged, "stopped after {} iterations", result.iterations);
    assert!(result.iterations < 10_000);
    for i in 0..4 {
        assert!((result.state.w[i] - 0.5).abs() < 1e-4, "w[{i}] = {}", result.state.w[i]);
        assert!((result.state.m[i] - 0.5).abs() < 1e-4, "m[{i}] = {}", result.state.m[i]);
    }
    assert!(engine.estimate_stability(&result.state).is_stable());
}

#[test]
fn test_fixed_point_with_incoherent_start() {
    let engine = default_engine();
    let start = SelfState::new(vec![0.1, 0.9, 0.2, 0.8], vec![0.9, 0.1, 0.7, 0.3]).unwrap();
    let result = engine.find_fixed_point(&start, 0.1, 10_000, 1e-7).unwrap();
    assert!(result.converged);
    assert!(result.state.coherence() < 1e-4);
}

#[test]
fn test_energy_non_increasing_without_input() {
    let engine = default_engine();
    assert!(engine.params().energy_descends());

    let mut state = SelfState::new(vec![0.1, 0.9, 0.2, 0.8], vec![0.6, 0.3, 0.5, 0.4]).unwrap();
    let zero = [0.0; 4];
    let mut energy = engine.compute_energy(&state);

    for step in 0..3000 {
        state = engine.evolve(&state, &zero, 0.01).unwrap();
        let next = engine.compute_energy(&state);
        assert!(next <= energy + 1e-12, "energy rose at step {step}: {energy} -> {next}");
        energy = next;
    }
}

#[test]
fn test_energy_descends_with_heterogeneous_target() {
    let params = Parameters::default_for(4).with_target(vec![0.2, 0.7, 0.4, 0.9]);
    let engine = StateEngine::new(&ring_vocabulary(), params).unwrap();
    let mut state = SelfState::new(vec![0.95, 0.05, 0.5, 0.3], vec![0.5, 0.5, 0.5, 0.5]).unwrap();
    let mut energy = engine.compute_energy(&state);

    for _ in 0..2000 {
        state = engine.evolve(&state, &[0.0; 4], 0.01).unwrap();
        let next = engine.compute_energy(&state);
        assert!(next <= energy + 1e-12);
        energy = next;
    }
}

#[test]
fn test_default_stability_margin() {
    let params = Parameters::default_for(4);
    assert!(params.homeostasis > 0.25);
    assert!(params.homogeneous_stability_margin() > 0.0);

    let engine = default_engine();
    for value in [0.0, 0.25, 0.5, 0.75, 1.0] {
        assert!(engine.estimate_stability(&SelfState::uniform(4, value)).is_stable());
    }
}

#[test]
fn test_weak_homeostasis_is_flagged() {
    let params = Parameters::default_for(4).with_homeostasis(0.1);
    assert!(params.homogeneous_stability_margin() < 0.0);
    let engine = StateEngine::new(&ring_vocabulary(), params).unwrap();
    let estimate = engine.estimate_stability(&SelfState::genesis(4));
    assert!(!estimate.is_stable());
    assert!(estimate.spectral_bound > 0.0);
}

#[test]
fn test_time_accumulates() {
    let engine = default_engine();
    let mut state = SelfState::genesis(4);
    for _ in 0..10 {
        state = engine.evolve(&state, &[0.1, 0.0, 0.0, 0.0], 0.05).unwrap();
    }
    assert!((state.time - 0.5).abs() < 1e-9);
}

proptest! {
    #[test]
    fn prop_step_stays_in_unit_cube(
        w in prop::collection::vec(0.0f64..=1.0, 4),
        m in prop::collection::vec(0.0f64..=1.0, 4),
        experience in prop::collection::vec(-50.0f64..50.0, 4),
        dt in 0.001f64..2.0,
    ) {
        let engine = default_engine();
        let state = SelfState::new(w, m).unwrap();
        let outcome = engine.step(&state, &experience, dt).unwrap();
        prop_assert!(outcome.state.validate(4).is_ok());
        if let Some(divergence) = &outcome.divergence {
            prop_assert!(divergence.count() > 0);
            prop_assert!(divergence.max_excess > 0.0);
        }
    }
}
