//! In-memory handler backend.
//!
//! Keeps integrator state in RAM and checkpoints through any
//! [`IndexStateStore`]. The working state is a clone of the committed one, so
//! a block that fails halfway never leaks partial updates.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

use minterwatch_core::checkpoint::{Checkpoint, IndexState, IndexStateStore, MemoryIndexStateStore};
use minterwatch_core::error::WatchError;
use minterwatch_core::handler::HandlerBackend;
use minterwatch_core::types::Block;

/// Handler backend holding state of type `T` in memory.
pub struct InMemoryBackend<T> {
    indexer_id: String,
    committed: Arc<RwLock<T>>,
    store: Arc<dyn IndexStateStore>,
}

impl<T: Clone + Send + Sync + 'static> InMemoryBackend<T> {
    /// Create a backend that checkpoints `indexer_id` through `store`.
    pub fn new(indexer_id: impl Into<String>, initial: T, store: Arc<dyn IndexStateStore>) -> Self {
        Self {
            indexer_id: indexer_id.into(),
            committed: Arc::new(RwLock::new(initial)),
            store,
        }
    }

    /// Create a backend whose checkpoints live only as long as the process.
    pub fn ephemeral(indexer_id: impl Into<String>, initial: T) -> Self {
        Self::new(indexer_id, initial, Arc::new(MemoryIndexStateStore::new()))
    }

    pub fn indexer_id(&self) -> &str {
        &self.indexer_id
    }

    pub fn store(&self) -> &Arc<dyn IndexStateStore> {
        &self.store
    }

    /// Shared handle to the committed state. Stays valid after the backend is
    /// moved into a watcher.
    pub fn state(&self) -> Arc<RwLock<T>> {
        self.committed.clone()
    }

    /// Clone of the committed state.
    pub async fn snapshot(&self) -> T {
        self.committed.read().await.clone()
    }
}

#[async_trait]
impl<T: Clone + Send + Sync + 'static> HandlerBackend for InMemoryBackend<T> {
    type State = T;
    type Context = ();

    async fn load_index_state(&mut self) -> Result<IndexState, WatchError> {
        self.store.load_index_state(&self.indexer_id).await
    }

    async fn acquire_state(&mut self, _block: &Block) -> Result<(T, ()), WatchError> {
        Ok((self.committed.read().await.clone(), ()))
    }

    async fn update_index_state(
        &mut self,
        state: T,
        block: &Block,
        _context: &(),
    ) -> Result<(), WatchError> {
        let index_state = IndexState {
            block_height: block.height(),
            block_hash: block.hash().to_string(),
        };
        self.store
            .save(Checkpoint::new(&self.indexer_id, &index_state))
            .await?;

        *self.committed.write().await = state;

        tracing::debug!(
            indexer_id = %self.indexer_id,
            block = block.height(),
            "state committed"
        );
        Ok(())
    }
}
