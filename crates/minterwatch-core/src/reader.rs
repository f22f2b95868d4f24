//! Action reader. Hands out the next unseen block, in order.
//!
//! A [`BlockSource`] is the node-specific part: one attempt per call, no
//! retry, returning already-normalized blocks. [`ActionReader`] wraps any
//! source with the shared behavior: fixed-delay retry, head tracking and
//! resolution of a negative `start_at_block` against the chain head.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::WatchError;
use crate::retry::{retry, RetryConfig};
use crate::types::{Block, BlockMeta, NextBlock, ReaderInfo};

/// Node-specific block access (single attempt per call).
#[async_trait]
pub trait BlockSource: Send + Sync {
    /// One-time connectivity check. Fails with [`WatchError::NotInitialized`]
    /// when the node cannot be reached.
    async fn setup(&self) -> Result<(), WatchError>;

    /// Current chain head height.
    async fn fetch_head_block_height(&self) -> Result<u64, WatchError>;

    /// The normalized block at `height`.
    async fn fetch_block(&self, height: u64) -> Result<Block, WatchError>;
}

#[async_trait]
impl<T: BlockSource + ?Sized> BlockSource for Arc<T> {
    async fn setup(&self) -> Result<(), WatchError> {
        (**self).setup().await
    }

    async fn fetch_head_block_height(&self) -> Result<u64, WatchError> {
        (**self).fetch_head_block_height().await
    }

    async fn fetch_block(&self, height: u64) -> Result<Block, WatchError> {
        (**self).fetch_block(height).await
    }
}

/// The reader capability the watcher drives.
#[async_trait]
pub trait BlockReader: Send {
    /// Returns the next block, fetching at most one block per call.
    async fn get_next_block(&mut self) -> Result<NextBlock, WatchError>;

    fn info(&self) -> ReaderInfo;
}

/// Configuration for an [`ActionReader`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaderConfig {
    /// First block to index. Zero or negative means "this many blocks behind head".
    pub start_at_block: i64,
    /// Retry policy applied to every head/block fetch.
    pub retry: RetryConfig,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            start_at_block: 1,
            retry: RetryConfig::default(),
        }
    }
}

/// Sequential block reader over a [`BlockSource`].
pub struct ActionReader<S> {
    source: S,
    retry: RetryConfig,
    start_at_block: i64,
    current_block_height: u64,
    head_block_height: u64,
    current_block: Block,
    initialized: bool,
}

impl<S: BlockSource> ActionReader<S> {
    pub fn new(source: S, config: ReaderConfig) -> Self {
        let current_block_height = if config.start_at_block > 0 {
            (config.start_at_block - 1) as u64
        } else {
            0
        };
        Self {
            source,
            retry: config.retry,
            start_at_block: config.start_at_block,
            current_block_height,
            head_block_height: 0,
            current_block: Block::default(),
            initialized: false,
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn current_block_height(&self) -> u64 {
        self.current_block_height
    }

    pub fn head_block_height(&self) -> u64 {
        self.head_block_height
    }

    pub fn start_at_block(&self) -> i64 {
        self.start_at_block
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Query the chain head with the reader's retry policy.
    pub async fn get_head_block_height(&self) -> Result<u64, WatchError> {
        self.get_head_block_height_with(self.retry).await
    }

    /// Query the chain head with an explicit retry policy.
    pub async fn get_head_block_height_with(&self, policy: RetryConfig) -> Result<u64, WatchError> {
        retry(&policy, "head block height", || {
            self.source.fetch_head_block_height()
        })
        .await
        .map_err(|_| WatchError::RetrieveHeadBlock {
            attempts: policy.attempts(),
        })
    }

    /// Fetch the block at `height` with the reader's retry policy.
    pub async fn get_block(&self, height: u64) -> Result<Block, WatchError> {
        self.get_block_with(height, self.retry).await
    }

    /// Fetch the block at `height` with an explicit retry policy.
    pub async fn get_block_with(&self, height: u64, policy: RetryConfig) -> Result<Block, WatchError> {
        retry(&policy, "block", || self.source.fetch_block(height))
            .await
            .map_err(|_| WatchError::RetrieveBlock {
                height,
                attempts: policy.attempts(),
            })
    }

    /// Check connectivity and resolve the starting position against the head.
    pub async fn initialize(&mut self) -> Result<(), WatchError> {
        self.source.setup().await?;
        self.head_block_height = self.get_head_block_height().await?;

        if self.start_at_block <= 0 {
            self.current_block_height = self
                .head_block_height
                .saturating_add_signed(self.start_at_block);
            self.start_at_block = self.current_block_height as i64 + 1;
        }
        // A start beyond the chain head waits at head until the chain catches up.
        self.head_block_height = self.head_block_height.max(self.current_block_height);

        tracing::info!(
            start_at_block = self.start_at_block,
            head = self.head_block_height,
            "reader initialized"
        );
        self.initialized = true;
        Ok(())
    }

    /// Returns the next unseen block, or the last held block with
    /// `is_new_block = false` when already at head.
    pub async fn get_next_block(&mut self) -> Result<NextBlock, WatchError> {
        let mut block_meta = BlockMeta { is_new_block: false };

        if !self.initialized {
            self.initialize().await?;
        }

        if self.current_block_height == self.head_block_height {
            let head = self.get_head_block_height().await?;
            self.head_block_height = head.max(self.current_block_height);
        }

        if self.current_block_height < self.head_block_height {
            let requested = self.current_block_height + 1;
            let block = self.get_block(requested).await?;
            let reported = block.height();

            if reported != requested {
                tracing::warn!(requested, reported, "node returned a different block height");
            }

            self.current_block_height = self.current_block_height.max(reported);
            self.head_block_height = self.head_block_height.max(self.current_block_height);
            self.current_block = block;
            block_meta.is_new_block = true;

            tracing::debug!(
                height = self.current_block_height,
                head = self.head_block_height,
                "fetched block"
            );
        }

        Ok(NextBlock {
            block: self.current_block.clone(),
            block_meta,
        })
    }

    pub fn info(&self) -> ReaderInfo {
        ReaderInfo {
            current_block_height: self.current_block_height,
            start_at_block: self.start_at_block,
            head_block_height: self.head_block_height,
        }
    }
}

#[async_trait]
impl<S: BlockSource> BlockReader for ActionReader<S> {
    async fn get_next_block(&mut self) -> Result<NextBlock, WatchError> {
        ActionReader::get_next_block(self).await
    }

    fn info(&self) -> ReaderInfo {
        ActionReader::info(self)
    }
}
