//! Shared types for the watch pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Opaque action payload (field name → value), as produced by the normalizer.
pub type Payload = Value;

// ─── BlockInfo ────────────────────────────────────────────────────────────────

/// A validator signature record attached to a block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Validator {
    pub pub_key: String,
    pub signed: bool,
}

/// Immutable summary of one block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockInfo {
    /// Block hash.
    pub block_hash: String,
    /// Block height as reported by the node.
    pub block_height: u64,
    /// Block timestamp.
    pub time: DateTime<Utc>,
    /// Number of transactions in the block.
    pub num_txs: u64,
    /// Total number of transactions in the chain up to and including this block.
    pub total_txs: u64,
    /// Block reward in the smallest coin unit.
    pub block_reward: u128,
    /// Block size in bytes.
    pub size: u64,
    /// Proposer public key.
    pub proposer: String,
    /// Validator signature records, in node order.
    pub validators: Vec<Validator>,
}

// ─── Action ───────────────────────────────────────────────────────────────────

/// A normalized transaction or event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    /// Type tag (e.g. `"Send"`, `"Reward"`). `None` when the node type is unknown;
    /// such actions never match a registration.
    #[serde(rename = "type")]
    pub action_type: Option<String>,
    pub payload: Payload,
}

impl Action {
    pub fn new(action_type: impl Into<String>, payload: Payload) -> Self {
        Self {
            action_type: Some(action_type.into()),
            payload,
        }
    }

    /// Returns `true` if this action carries the given type tag.
    pub fn is_type(&self, action_type: &str) -> bool {
        self.action_type.as_deref() == Some(action_type)
    }
}

// ─── Block ────────────────────────────────────────────────────────────────────

/// One block: header summary plus its actions (transactions first, then events).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub block_info: BlockInfo,
    pub actions: Vec<Action>,
}

impl Block {
    pub fn height(&self) -> u64 {
        self.block_info.block_height
    }

    pub fn hash(&self) -> &str {
        &self.block_info.block_hash
    }
}

/// Per-poll metadata returned alongside a block.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockMeta {
    /// `false` when the reader is already at head and `block` is the one held from before.
    pub is_new_block: bool,
}

/// The reader's per-poll response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NextBlock {
    pub block: Block,
    pub block_meta: BlockMeta,
}

// ─── Observability snapshots ─────────────────────────────────────────────────

/// Snapshot of a reader's position.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReaderInfo {
    pub current_block_height: u64,
    /// First block to index. Negative until resolved against the head at setup.
    pub start_at_block: i64,
    pub head_block_height: u64,
}

/// Snapshot of a handler's checkpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandlerInfo {
    pub last_processed_block_height: u64,
    pub last_processed_block_hash: String,
}
