//! Scripted block source shared by the unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use crate::error::WatchError;
use crate::reader::BlockSource;
use crate::types::{Action, Block, BlockInfo};

/// A block at `height` carrying one `Send` transaction and one `Reward` event.
pub(crate) fn block_at(height: u64) -> Block {
    Block {
        block_info: BlockInfo {
            block_hash: format!("0x{height:04x}"),
            block_height: height,
            num_txs: 1,
            total_txs: height,
            ..Default::default()
        },
        actions: vec![
            Action::new("Send", json!({ "height": height })),
            Action::new("Reward", json!({ "height": height })),
        ],
    }
}

#[derive(Default)]
pub(crate) struct ScriptedSource {
    pub head: AtomicU64,
    pub head_calls: AtomicU32,
    pub block_calls: AtomicU32,
    pub fail_setup: AtomicBool,
    pub fail_head: AtomicBool,
    pub fail_blocks: AtomicBool,
    /// Height whose fetch always fails (0 = none).
    pub fail_at: AtomicU64,
    pub block_delay_ms: AtomicU64,
    overrides: Mutex<HashMap<u64, Block>>,
}

impl ScriptedSource {
    pub fn with_head(head: u64) -> Self {
        let source = Self::default();
        source.set_head(head);
        source
    }

    pub fn set_head(&self, head: u64) {
        self.head.store(head, Ordering::SeqCst);
    }

    /// Serve `block` when `requested` is fetched.
    pub fn insert(&self, requested: u64, block: Block) {
        self.overrides.lock().unwrap().insert(requested, block);
    }
}

#[async_trait]
impl BlockSource for ScriptedSource {
    async fn setup(&self) -> Result<(), WatchError> {
        if self.fail_setup.load(Ordering::SeqCst) {
            return Err(WatchError::NotInitialized {
                endpoint: "scripted".into(),
            });
        }
        Ok(())
    }

    async fn fetch_head_block_height(&self) -> Result<u64, WatchError> {
        self.head_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_head.load(Ordering::SeqCst) {
            return Err(WatchError::Http("connection refused".into()));
        }
        Ok(self.head.load(Ordering::SeqCst))
    }

    async fn fetch_block(&self, height: u64) -> Result<Block, WatchError> {
        self.block_calls.fetch_add(1, Ordering::SeqCst);
        let delay = self.block_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        if self.fail_blocks.load(Ordering::SeqCst) || self.fail_at.load(Ordering::SeqCst) == height {
            return Err(WatchError::Http(format!("block {height} unavailable")));
        }
        if let Some(block) = self.overrides.lock().unwrap().get(&height) {
            return Ok(block.clone());
        }
        if height > self.head.load(Ordering::SeqCst) {
            return Err(WatchError::Other(format!("block {height} not produced yet")));
        }
        Ok(block_at(height))
    }
}
