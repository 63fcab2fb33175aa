//! Persistence boundary
//!
//! The engine never touches storage. `SnapshotStore` is the byte-level
//! get/set/delete/keys interface the surrounding application plugs in;
//! `save_identity` / `load_identity` layer JSON and optimistic versioning
//! on top.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use crate::error::StoreError;
use crate::types::StoredIdentity;

/// Longest accepted key
pub const MAX_KEY_LEN: usize = 128;

/// Key-value store for snapshots
pub trait SnapshotStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    fn set(&self, key: &str, value: &[u8]) -> Result<(), StoreError>;

    /// Returns whether the key existed
    fn delete(&self, key: &str) -> Result<bool, StoreError>;

    /// All keys, sorted
    fn keys(&self) -> Result<Vec<String>, StoreError>;
}

/// Keys are 1..=128 chars of `[A-Za-z0-9_-]`
pub fn validate_key(key: &str) -> Result<(), StoreError> {
    let valid = !key.is_empty()
        && key.len() <= MAX_KEY_LEN
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(StoreError::InvalidKey(key.to_string()))
    }
}

/// In-process store
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SnapshotStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        validate_key(key)?;
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        validate_key(key)?;
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<bool, StoreError> {
        validate_key(key)?;
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        Ok(entries.remove(key).is_some())
    }

    fn keys(&self) -> Result<Vec<String>, StoreError> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        let mut keys: Vec<String> = entries.keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }
}

/// One `<key>.json` file per entry in a directory
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// The directory is created on first write
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StoreError> {
        validate_key(key)?;
        Ok(self.dir.join(format!("{key}.json")))
    }
}

impl SnapshotStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let path = self.path_for(key)?;
        match std::fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        let path = self.path_for(key)?;
        std::fs::create_dir_all(&self.dir)?;

        // write-then-rename so readers never see a partial file
        let tmp = self.dir.join(format!(".{key}.json.tmp"));
        std::fs::write(&tmp, value)?;
        std::fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<bool, StoreError> {
        let path = self.path_for(key)?;
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn keys(&self) -> Result<Vec<String>, StoreError> {
        let read_dir = match std::fs::read_dir(&self.dir) {
            Ok(rd) => rd,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut keys = Vec::new();
        for entry in read_dir {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                if validate_key(stem).is_ok() {
                    keys.push(stem.to_string());
                }
            }
        }
        keys.sort();
        Ok(keys)
    }
}

/// Persist `identity` under `key`.
///
/// `identity.version` must equal the stored version (0 when absent); the
/// snapshot is written with version + 1, which is returned.
pub fn save_identity<S: SnapshotStore + ?Sized>(
    store: &S,
    key: &str,
    identity: &StoredIdentity,
) -> Result<u64, StoreError> {
    let found = match store.get(key)? {
        Some(bytes) => serde_json::from_slice::<StoredIdentity>(&bytes)?.version,
        None => 0,
    };
    if found != identity.version {
        tracing::warn!(key, expected = identity.version, found, "snapshot version conflict");
        return Err(StoreError::VersionConflict {
            expected: identity.version,
            found,
        });
    }

    let mut next = identity.clone();
    next.version = found + 1;
    let json = serde_json::to_vec_pretty(&next)?;
    store.set(key, &json)?;

    tracing::debug!(key, version = next.version, "snapshot saved");
    Ok(next.version)
}

/// Load the identity stored under `key`
pub fn load_identity<S: SnapshotStore + ?Sized>(store: &S, key: &str) -> Result<StoredIdentity, StoreError> {
    let bytes = store
        .get(key)?
        .ok_or_else(|| StoreError::NotFound(key.to_string()))?;
    Ok(serde_json::from_slice(&bytes)?)
}

// =============================================================================
// TESTS
// =============================================================================
