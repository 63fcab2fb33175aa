//! Persistence integration tests: file store round trips and versioning

use pretty_assertions::assert_eq;
use selfwake::core::{load_identity, save_identity, FileStore, SnapshotStore, WakeContext, WakeReconstructor};
use selfwake::types::{Parameters, StoredIdentity, Vocabulary};
use selfwake::{StoreError, WakeConfig};

fn genesis() -> StoredIdentity {
    let vocabulary = Vocabulary::define(["curiosity", "precision", "persistence"], vec![]).unwrap();
    StoredIdentity::genesis(vocabulary, Parameters::default_for(3), Some(vec![0.4, 0.6, 0.5])).unwrap()
}

#[test]
fn test_sleep_wake_cycle_through_files() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileStore::new(dir.path());
    let context = WakeContext::ed25519(&[5u8; 32]);
    let reconstructor = WakeReconstructor::default();

    assert_eq!(save_identity(&store, "agent", &genesis()).unwrap(), 1);

    // first invocation
    let stored = load_identity(&store, "agent").unwrap();
    let mut active = reconstructor.wake(&stored, &context).unwrap();
    assert_eq!(active.version(), 1);
    active.declare(1, 0.9, "precision above all").unwrap();
    active.evolve(&[0.0, 0.2, 0.0], 0.1).unwrap();
    let version = save_identity(&store, "agent", &active.snapshot().unwrap()).unwrap();
    assert_eq!(version, 2);

    // second invocation
    let stored = load_identity(&store, "agent").unwrap();
    let again = reconstructor.wake(&stored, &context).unwrap();
    assert_eq!(again.state(), active.state());
    assert_eq!(again.declarations(), active.declarations());
    assert_eq!(again.trajectory(), active.trajectory());
    assert_eq!(again.version(), 2);

    assert_eq!(store.keys().unwrap(), vec!["agent".to_string()]);
}

#[test]
fn test_concurrent_wakes_are_serialized_by_version() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileStore::new(dir.path());
    let context = WakeContext::ed25519(&[6u8; 32]);
    save_identity(&store, "agent", &genesis()).unwrap();

    let stored = load_identity(&store, "agent").unwrap();
    let mut first = WakeReconstructor::default().wake(&stored, &context).unwrap();
    let mut second = WakeReconstructor::default().wake(&stored, &context).unwrap();

    first.declare(0, 0.1, "first writer").unwrap();
    second.declare(0, 0.9, "second writer").unwrap();

    assert_eq!(save_identity(&store, "agent", &first.snapshot().unwrap()).unwrap(), 2);
    let err = save_identity(&store, "agent", &second.snapshot().unwrap()).unwrap_err();
    assert!(matches!(err, StoreError::VersionConflict { expected: 1, found: 2 }));

    let winner = load_identity(&store, "agent").unwrap();
    assert_eq!(winner.declarations[0].content(), "first writer");
}

#[test]
fn test_snapshot_file_is_json() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileStore::new(dir.path());
    save_identity(&store, "agent", &genesis()).unwrap();

    let raw = std::fs::read_to_string(dir.path().join("agent.json")).unwrap();
    let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(value["version"], 1);
    assert_eq!(value["vocabulary"]["names"][0], "curiosity");
}

#[test]
fn test_corrupt_snapshot_is_a_serialization_error() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileStore::new(dir.path());
    store.set("agent", b"{ not json").unwrap();
    let err = load_identity(&store, "agent").unwrap_err();
    assert_eq!(err.code(), "R604_STORE_SERIALIZE_ERROR");
}

#[test]
fn test_invalid_vocabulary_in_snapshot_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileStore::new(dir.path());
    let mut value = serde_json::to_value(genesis()).unwrap();
    value["vocabulary"]["names"][1] = serde_json::json!("curiosity");
    store.set("agent", &serde_json::to_vec(&value).unwrap()).unwrap();

    assert!(matches!(load_identity(&store, "agent"), Err(StoreError::Serialization(_))));
}

#[test]
fn test_config_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("wake.json");
    std::fs::write(&path, r#"{ "coherence_threshold": 0.25, "fixed_point_max_iter": 500 }"#).unwrap();

    let config = WakeConfig::from_json_file(&path).unwrap();
    assert_eq!(config.coherence_threshold, 0.25);
    assert_eq!(config.fixed_point_max_iter, 500);
    assert_eq!(config.continuity_threshold, WakeConfig::default().continuity_threshold);

    assert!(matches!(
        WakeConfig::from_json_file(dir.path().join("missing.json")),
        Err(StoreError::Io(_))
    ));
}
