//! History stores
//!
//! `update` is the atomic read-modify-write: the store holds its lock across
//! load, mutation and save, and saves nothing when the mutation fails.

use crate::error::{EngineError, StoreError};
use crate::state::{ProjectState, StateKey};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, RwLock};

/// Mutation applied inside [`HistoryStore::update`]
pub type StateMutation<'a> = &'a mut dyn FnMut(&mut ProjectState) -> Result<(), EngineError>;

/// Key→state persistence
pub trait HistoryStore: Send + Sync {
    /// Stored state, or the default state for an unknown key
    fn load(&self, key: &StateKey) -> Result<ProjectState, StoreError>;

    fn save(&self, key: &StateKey, state: &ProjectState) -> Result<(), StoreError>;

    /// Load, mutate and save under one lock; returns the saved state
    fn update(&self, key: &StateKey, f: StateMutation<'_>) -> Result<ProjectState, EngineError>;
}

/// In-memory store for tests and single-process use
#[derive(Debug, Default)]
pub struct MemoryStore {
    states: RwLock<HashMap<StateKey, ProjectState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.states.read().map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl HistoryStore for MemoryStore {
    fn load(&self, key: &StateKey) -> Result<ProjectState, StoreError> {
        let states = self.states.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(states.get(key).cloned().unwrap_or_default())
    }

    fn save(&self, key: &StateKey, state: &ProjectState) -> Result<(), StoreError> {
        let mut states = self.states.write().map_err(|_| StoreError::LockPoisoned)?;
        states.insert(key.clone(), state.clone());
        Ok(())
    }

    fn update(&self, key: &StateKey, f: StateMutation<'_>) -> Result<ProjectState, EngineError> {
        let mut states = self.states.write().map_err(|_| StoreError::LockPoisoned)?;
        let mut state = states.get(key).cloned().unwrap_or_default();
        f(&mut state)?;
        states.insert(key.clone(), state.clone());
        Ok(state)
    }
}

/// One pretty-printed JSON document per key under a directory
///
/// Writes go to a temporary sibling and are renamed into place, so readers
/// never see a half-written document. Updates from this process are
/// serialized by an in-process mutex.
#[derive(Debug)]
pub struct JsonFileStore {
    dir: PathBuf,
    lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, key: &StateKey) -> PathBuf {
        self.dir.join(format!("{}.json", key.file_stem()))
    }

    fn read(&self, key: &StateKey) -> Result<ProjectState, StoreError> {
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(ProjectState::default());
        }
        let json = std::fs::read_to_string(&path).map_err(|source| StoreError::Io {
            path: path.clone(),
            source,
        })?;
        serde_json::from_str(&json).map_err(|e| StoreError::Deserialization {
            key: key.to_string(),
            message: e.to_string(),
        })
    }

    fn write(&self, key: &StateKey, state: &ProjectState) -> Result<(), StoreError> {
        std::fs::create_dir_all(&self.dir).map_err(|source| StoreError::Io {
            path: self.dir.clone(),
            source,
        })?;

        let json = serde_json::to_string_pretty(state)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        let path = self.path_for(key);
        let tmp = self
            .dir
            .join(format!(".{}.{}.tmp", key.file_stem(), uuid::Uuid::new_v4()));

        std::fs::write(&tmp, json).map_err(|source| StoreError::Io {
            path: tmp.clone(),
            source,
        })?;
        std::fs::rename(&tmp, &path).map_err(|source| {
            let _ = std::fs::remove_file(&tmp);
            StoreError::Io {
                path: path.clone(),
                source,
            }
        })?;

        tracing::debug!(key = %key, path = %path.display(), "Saved project state");
        Ok(())
    }
}

impl HistoryStore for JsonFileStore {
    fn load(&self, key: &StateKey) -> Result<ProjectState, StoreError> {
        let _guard = self.lock.lock().map_err(|_| StoreError::LockPoisoned)?;
        self.read(key)
    }

    fn save(&self, key: &StateKey, state: &ProjectState) -> Result<(), StoreError> {
        let _guard = self.lock.lock().map_err(|_| StoreError::LockPoisoned)?;
        self.write(key, state)
    }

    fn update(&self, key: &StateKey, f: StateMutation<'_>) -> Result<ProjectState, EngineError> {
        let _guard = self.lock.lock().map_err(|_| StoreError::LockPoisoned)?;
        let mut state = self.read(key)?;
        f(&mut state)?;
        self.write(key, &state)?;
        Ok(state)
    }
}
