//! Index state, the durable checkpoint of how far a handler has progressed.
//!
//! A checkpoint stores the last successfully processed block height and hash.
//! On restart, the handler adopts it so already-indexed blocks are skipped.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;

use crate::error::WatchError;

/// The `{height, hash}` pair a handler resumes from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexState {
    pub block_height: u64,
    pub block_hash: String,
}

/// A persisted checkpoint for one indexer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Unique indexer identifier.
    pub indexer_id: String,
    /// Last successfully processed block height.
    pub block_height: u64,
    /// Last successfully processed block hash.
    pub block_hash: String,
    /// Unix timestamp of when this checkpoint was saved.
    pub updated_at: i64,
}

impl Checkpoint {
    pub fn new(indexer_id: impl Into<String>, state: &IndexState) -> Self {
        Self {
            indexer_id: indexer_id.into(),
            block_height: state.block_height,
            block_hash: state.block_hash.clone(),
            updated_at: chrono::Utc::now().timestamp(),
        }
    }

    pub fn index_state(&self) -> IndexState {
        IndexState {
            block_height: self.block_height,
            block_hash: self.block_hash.clone(),
        }
    }
}

/// Trait for storing and loading checkpoints.
///
/// Implementations include [`MemoryIndexStateStore`] and the SQLite store in
/// `minterwatch-storage`.
#[async_trait]
pub trait IndexStateStore: Send + Sync {
    /// Load the latest checkpoint for `indexer_id`.
    async fn load(&self, indexer_id: &str) -> Result<Option<Checkpoint>, WatchError>;

    /// Save (upsert) a checkpoint.
    async fn save(&self, checkpoint: Checkpoint) -> Result<(), WatchError>;

    /// Delete a checkpoint (e.g. when resetting an indexer).
    async fn delete(&self, indexer_id: &str) -> Result<(), WatchError>;

    /// Load the index state for `indexer_id`; a missing checkpoint is height 0
    /// with an empty hash.
    async fn load_index_state(&self, indexer_id: &str) -> Result<IndexState, WatchError> {
        Ok(self
            .load(indexer_id)
            .await?
            .map(|cp| cp.index_state())
            .unwrap_or_default())
    }
}

// ─── In-memory store ────────────────────────────────────────────────────────

/// In-memory checkpoint store for tests and ephemeral indexers.
#[derive(Default)]
pub struct MemoryIndexStateStore {
    data: Mutex<HashMap<String, Checkpoint>>,
}

impl MemoryIndexStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, Checkpoint>>, WatchError> {
        self.data
            .lock()
            .map_err(|e| WatchError::Storage(format!("checkpoint map poisoned: {e}")))
    }
}

#[async_trait]
impl IndexStateStore for MemoryIndexStateStore {
    async fn load(&self, indexer_id: &str) -> Result<Option<Checkpoint>, WatchError> {
        Ok(self.lock()?.get(indexer_id).cloned())
    }

    async fn save(&self, checkpoint: Checkpoint) -> Result<(), WatchError> {
        self.lock()?.insert(checkpoint.indexer_id.clone(), checkpoint);
        Ok(())
    }

    async fn delete(&self, indexer_id: &str) -> Result<(), WatchError> {
        self.lock()?.remove(indexer_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_checkpoint_loads_as_zero() {
        let store = MemoryIndexStateStore::new();
        let state = store.load_index_state("minter").await.unwrap();
        assert_eq!(state, IndexState::default());
        assert_eq!(state.block_hash, "");
    }

    #[tokio::test]
    async fn memory_store_roundtrip() {
        let store = MemoryIndexStateStore::new();
        let state = IndexState {
            block_height: 1000,
            block_hash: "0xabc".into(),
        };
        store.save(Checkpoint::new("minter", &state)).await.unwrap();

        let cp = store.load("minter").await.unwrap().unwrap();
        assert_eq!(cp.block_height, 1000);
        assert_eq!(cp.indexer_id, "minter");
        assert_eq!(store.load_index_state("minter").await.unwrap(), state);

        // Other indexers are isolated.
        assert!(store.load("other").await.unwrap().is_none());

        store.delete("minter").await.unwrap();
        assert!(store.load("minter").await.unwrap().is_none());
    }
}
