//! minterwatch-node — Minter node access for MinterWatch.
//!
//! - [`client`] — `reqwest`-backed [`BlockSource`](minterwatch_core::BlockSource)
//! - [`block`] — raw block/event JSON → normalized [`Block`](minterwatch_core::Block)
//! - [`builder`] — reader configuration and fluent builder

pub mod block;
pub mod builder;
pub mod client;

pub use builder::{MinterActionReader, MinterReaderBuilder, MinterReaderConfig};
pub use client::MinterClient;
