//! Updater/effect traits, their registry, and the action handler.
//!
//! For each block the handler checks the working state out of its
//! [`HandlerBackend`], runs every matching [`Updater`], then every matching
//! [`Effect`], and finally hands the state back so the backend can persist
//! it together with the new checkpoint.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

use crate::checkpoint::IndexState;
use crate::error::WatchError;
use crate::types::{Block, BlockInfo, HandlerInfo, NextBlock, Payload};

/// A state mutation registered for one action type.
#[async_trait]
pub trait Updater<S: Send + Sync, C: Send + Sync>: Send + Sync {
    /// The action type tag this updater processes (e.g. `"Send"`).
    fn action_type(&self) -> &str;

    async fn update(
        &self,
        state: &mut S,
        payload: &Payload,
        block_info: &BlockInfo,
        context: &C,
    ) -> Result<(), WatchError>;
}

/// A side effect registered for one action type.
///
/// Effects see the state only after every updater of the block has run and
/// cannot mutate it.
#[async_trait]
pub trait Effect<S: Send + Sync, C: Send + Sync>: Send + Sync {
    /// The action type tag this effect reacts to (e.g. `"Reward"`).
    fn action_type(&self) -> &str;

    async fn run(
        &self,
        state: &S,
        payload: &Payload,
        block_info: &BlockInfo,
        context: &C,
    ) -> Result<(), WatchError>;
}

/// Registry of updaters and effects, keyed by action type.
///
/// Registrations sharing a type fire in registration order.
pub struct HandlerRegistry<S: Send + Sync, C: Send + Sync> {
    updaters: HashMap<String, Vec<Arc<dyn Updater<S, C>>>>,
    effects: HashMap<String, Vec<Arc<dyn Effect<S, C>>>>,
}

impl<S: Send + Sync, C: Send + Sync> HandlerRegistry<S, C> {
    pub fn new() -> Self {
        Self {
            updaters: HashMap::new(),
            effects: HashMap::new(),
        }
    }

    /// Register an updater for its action type.
    pub fn add_updater(&mut self, updater: Arc<dyn Updater<S, C>>) {
        self.updaters
            .entry(updater.action_type().to_string())
            .or_default()
            .push(updater);
    }

    /// Register an effect for its action type.
    pub fn add_effect(&mut self, effect: Arc<dyn Effect<S, C>>) {
        self.effects
            .entry(effect.action_type().to_string())
            .or_default()
            .push(effect);
    }

    pub fn with_updater(mut self, updater: Arc<dyn Updater<S, C>>) -> Self {
        self.add_updater(updater);
        self
    }

    pub fn with_effect(mut self, effect: Arc<dyn Effect<S, C>>) -> Self {
        self.add_effect(effect);
        self
    }

    pub fn updater_count(&self) -> usize {
        self.updaters.values().map(Vec::len).sum()
    }

    pub fn effect_count(&self) -> usize {
        self.effects.values().map(Vec::len).sum()
    }

    /// Run every matching updater, in block-action order, one at a time.
    pub async fn run_updaters(&self, state: &mut S, block: &Block, context: &C) -> Result<(), WatchError> {
        for action in &block.actions {
            let Some(updaters) = action.action_type.as_deref().and_then(|t| self.updaters.get(t)) else {
                continue;
            };
            for updater in updaters {
                updater
                    .update(state, &action.payload, &block.block_info, context)
                    .await?;
            }
        }
        Ok(())
    }

    /// Run every matching effect, in block-action order.
    pub async fn run_effects(&self, state: &S, block: &Block, context: &C) -> Result<(), WatchError> {
        for action in &block.actions {
            let Some(effects) = action.action_type.as_deref().and_then(|t| self.effects.get(t)) else {
                continue;
            };
            for effect in effects {
                effect
                    .run(state, &action.payload, &block.block_info, context)
                    .await?;
            }
        }
        Ok(())
    }
}

impl<S: Send + Sync, C: Send + Sync> Default for HandlerRegistry<S, C> {
    fn default() -> Self {
        Self::new()
    }
}

// ─── Backend ──────────────────────────────────────────────────────────────────

/// The storage-specific half of a handler.
#[async_trait]
pub trait HandlerBackend: Send {
    /// Working state mutated by updaters.
    type State: Send + Sync;
    /// Per-block context passed to updaters and effects.
    type Context: Send + Sync;

    /// One-time preparation (open connections, create tables, ...).
    async fn setup(&mut self) -> Result<(), WatchError> {
        Ok(())
    }

    /// The persisted checkpoint to resume from.
    async fn load_index_state(&mut self) -> Result<IndexState, WatchError>;

    /// Check out the working state and context for `block`.
    async fn acquire_state(
        &mut self,
        block: &Block,
    ) -> Result<(Self::State, Self::Context), WatchError>;

    /// Check the state back in and durably record `block` as processed.
    async fn update_index_state(
        &mut self,
        state: Self::State,
        block: &Block,
        context: &Self::Context,
    ) -> Result<(), WatchError>;
}

/// The handler capability the watcher drives.
#[async_trait]
pub trait BlockHandler: Send {
    async fn handle_block(&mut self, next_block: &NextBlock) -> Result<(), WatchError>;

    fn info(&self) -> HandlerInfo;
}

/// Dispatches each block's actions exactly once and tracks the checkpoint.
pub struct ActionHandler<B: HandlerBackend> {
    backend: B,
    registry: HandlerRegistry<B::State, B::Context>,
    last_processed_block_height: u64,
    last_processed_block_hash: String,
    initialized: bool,
}

impl<B: HandlerBackend> ActionHandler<B> {
    pub fn new(backend: B, registry: HandlerRegistry<B::State, B::Context>) -> Self {
        Self {
            backend,
            registry,
            last_processed_block_height: 0,
            last_processed_block_hash: String::new(),
            initialized: false,
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn registry(&self) -> &HandlerRegistry<B::State, B::Context> {
        &self.registry
    }

    /// Run backend setup and adopt the persisted checkpoint.
    pub async fn initialize(&mut self) -> Result<(), WatchError> {
        self.backend.setup().await?;
        let IndexState {
            block_height,
            block_hash,
        } = self.backend.load_index_state().await?;

        tracing::info!(block = block_height, hash = %block_hash, "resuming from index state");
        self.last_processed_block_height = block_height;
        self.last_processed_block_hash = block_hash;
        self.initialized = true;
        Ok(())
    }

    pub async fn handle_block(&mut self, next_block: &NextBlock) -> Result<(), WatchError> {
        let block = &next_block.block;

        if !self.initialized {
            self.initialize().await?;
        }

        if block.height() == self.last_processed_block_height {
            tracing::debug!(block = block.height(), "block already processed, skipping");
            return Ok(());
        }

        let (mut state, context) = self.backend.acquire_state(block).await?;
        self.registry.run_updaters(&mut state, block, &context).await?;
        self.registry.run_effects(&state, block, &context).await?;
        self.backend
            .update_index_state(state, block, &context)
            .await?;

        self.last_processed_block_height = block.height();
        self.last_processed_block_hash = block.hash().to_string();

        tracing::debug!(
            block = block.height(),
            actions = block.actions.len(),
            "block processed"
        );
        Ok(())
    }

    pub fn info(&self) -> HandlerInfo {
        HandlerInfo {
            last_processed_block_height: self.last_processed_block_height,
            last_processed_block_hash: self.last_processed_block_hash.clone(),
        }
    }
}

#[async_trait]
impl<B: HandlerBackend> BlockHandler for ActionHandler<B> {
    async fn handle_block(&mut self, next_block: &NextBlock) -> Result<(), WatchError> {
        ActionHandler::handle_block(self, next_block).await
    }

    fn info(&self) -> HandlerInfo {
        ActionHandler::info(self)
    }
}
