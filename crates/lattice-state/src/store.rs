//! Versioned state store.

use crate::{StateError, StateResult, WorldState};
use dashmap::DashMap;
use lattice_storage::{ColumnFamily, Storage, WriteBatch};
use lattice_types::Hash;
use std::sync::Arc;
use tracing::debug;

/// Store of committed world states, versioned by root digest.
///
/// A committed state is immutable, so the cache hands out clones and the
/// persisted bytes are written once and never rewritten. Readers at
/// different roots proceed without any shared lock.
pub struct StateStore {
    storage: Arc<dyn Storage>,
    cache: DashMap<Hash, WorldState>,
}

impl StateStore {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self {
            storage,
            cache: DashMap::new(),
        }
    }

    /// Commit a state and return its root.
    pub fn commit(&self, state: WorldState) -> StateResult<Hash> {
        let root = state.root();
        if !self.cache.contains_key(&root) {
            self.storage
                .put(ColumnFamily::Trie, root.as_bytes(), &state.to_bytes())?;
            self.cache.insert(root, state);
            debug!(%root, "committed world state");
        }
        Ok(root)
    }

    /// Stage a commit into an existing batch so the state root lands
    /// atomically with the block that produced it.
    pub fn commit_batched(&self, batch: &mut WriteBatch, state: WorldState) -> Hash {
        let root = state.root();
        if !self.cache.contains_key(&root) {
            batch.put(ColumnFamily::Trie, root.as_bytes().to_vec(), state.to_bytes());
            self.cache.insert(root, state);
        }
        root
    }

    /// Fetch the state committed under `root`.
    pub fn get(&self, root: &Hash) -> StateResult<WorldState> {
        if let Some(state) = self.cache.get(root) {
            return Ok(state.clone());
        }
        match self.storage.get(ColumnFamily::Trie, root.as_bytes())? {
            Some(bytes) => {
                let state = WorldState::from_bytes(&bytes)
                    .map_err(|e| StateError::Corruption(e.to_string()))?;
                self.cache.insert(*root, state.clone());
                Ok(state)
            }
            None => Err(StateError::UnknownRoot(*root)),
        }
    }

    /// Whether a state is committed under `root`.
    pub fn contains(&self, root: &Hash) -> StateResult<bool> {
        if self.cache.contains_key(root) {
            return Ok(true);
        }
        Ok(self.storage.contains(ColumnFamily::Trie, root.as_bytes())?)
    }
}
