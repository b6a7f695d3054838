//! Opaque key-value persistence for conversations and comparison runs.
//!
//! The core treats storage as `get`/`set`/`delete` over bytes, keyed per
//! conversation or run-history identifier. Two backends are provided:
//! [`MemoryStore`] for tests and ephemeral sessions, and [`FileStore`],
//! which writes one file per key with an atomic temp-file-then-rename.
//!
//! Loading is tolerant by design: a missing or corrupt value yields the
//! type's default (an empty log, an empty run history) with a warning,
//! never an error — see [`load_json_or_default`].

use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use thiserror::Error;
use tracing::warn;

/// Failures at the persistence boundary.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store i/o failure: {0}")]
    Io(#[from] std::io::Error),

    #[error("store serialization failure: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Opaque key-value capability.
pub trait KvStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;
    fn set(&self, key: &str, value: &[u8]) -> Result<(), StoreError>;
    fn delete(&self, key: &str) -> Result<(), StoreError>;
}

// ── JSON helpers ───────────────────────────────────────────────────

/// Serialize `value` as JSON under `key`.
pub fn save_json<T: Serialize>(
    store: &dyn KvStore,
    key: &str,
    value: &T,
) -> Result<(), StoreError> {
    let bytes = serde_json::to_vec_pretty(value)?;
    store.set(key, &bytes)
}

/// Load and deserialize the value under `key`, starting from the default on
/// a missing or corrupt value rather than failing.
pub fn load_json_or_default<T: DeserializeOwned + Default>(store: &dyn KvStore, key: &str) -> T {
    let bytes = match store.get(key) {
        Ok(Some(bytes)) => bytes,
        Ok(None) => return T::default(),
        Err(e) => {
            warn!("failed to read {key}, starting empty: {e}");
            return T::default();
        }
    };
    match serde_json::from_slice(&bytes) {
        Ok(value) => value,
        Err(e) => {
            warn!("corrupt value under {key}, starting empty: {e}");
            T::default()
        }
    }
}

// ── In-memory store ────────────────────────────────────────────────

/// Ephemeral store backed by a map. Useful for tests and one-shot sessions.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KvStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.entries.lock().unwrap().get(key).cloned())
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.entries.lock().unwrap().remove(key);
        Ok(())
    }
}

// ── File store ─────────────────────────────────────────────────────

/// One file per key under a root directory.
///
/// Writes go to a temp file first and are renamed into place, so a crash
/// mid-write never leaves a torn value. Keys must be filesystem-safe (the
/// crate's generated identifiers are).
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Create a store rooted at `root`, ensuring the directory exists.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(format!("{key}.json"))
    }
}

impl KvStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(std::fs::read(&path)?))
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        let final_path = self.path_for(key);
        let tmp_path = self.root.join(format!(".{key}.json.tmp"));
        std::fs::write(&tmp_path, value)?;
        std::fs::rename(&tmp_path, &final_path)?;
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        let path = self.path_for(key);
        if path.exists() {
            std::fs::remove_file(&path)?;
        }
        Ok(())
    }
}
