//! minterwatch-core — the reader → handler → watcher pipeline.
//!
//! # Architecture
//!
//! ```text
//! ActionWatcher (single control task, poll cycle, pause/resume)
//!      ├── ActionReader<S: BlockSource>   (head tracking, fixed-delay retry)
//!      └── ActionHandler<B: HandlerBackend>
//!               ├── HandlerRegistry  (updaters, then effects, per action type)
//!               └── backend          (working state + IndexStateStore checkpoint)
//! ```

pub mod checkpoint;
pub mod error;
pub mod handler;
pub mod reader;
pub mod retry;
pub mod types;
pub mod watcher;

#[cfg(test)]
mod testing;

pub use checkpoint::{Checkpoint, IndexState, IndexStateStore, MemoryIndexStateStore};
pub use error::WatchError;
pub use handler::{ActionHandler, BlockHandler, Effect, HandlerBackend, HandlerRegistry, Updater};
pub use reader::{ActionReader, BlockReader, BlockSource, ReaderConfig};
pub use retry::RetryConfig;
pub use types::{
    Action, Block, BlockInfo, BlockMeta, HandlerInfo, NextBlock, Payload, ReaderInfo, Validator,
};
pub use watcher::{ActionWatcher, IndexingStatus, WatcherConfig, WatcherInfo};
