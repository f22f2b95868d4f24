//! Configuration and fluent builder for a Minter action reader.
//!
//! # Example
//!
//! ```rust,no_run
//! use minterwatch_node::MinterReaderBuilder;
//!
//! # fn example() -> Result<(), minterwatch_core::WatchError> {
//! let reader = MinterReaderBuilder::new()
//!     .endpoint("https://node.example.org/")
//!     .start_at_block(-100)
//!     .num_retries(40)
//!     .wait_time_ms(500)
//!     .build()?;
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use minterwatch_core::error::WatchError;
use minterwatch_core::reader::{ActionReader, ReaderConfig};

use crate::client::{normalize_endpoint, MinterClient};

/// An [`ActionReader`] over a Minter node.
pub type MinterActionReader = ActionReader<MinterClient>;

/// Configuration for a [`MinterActionReader`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MinterReaderConfig {
    /// Node base URL. Trailing slashes are ignored.
    pub endpoint: String,
    /// Per-request HTTP timeout (milliseconds).
    pub request_timeout_ms: u64,
    #[serde(flatten)]
    pub reader: ReaderConfig,
}

impl Default for MinterReaderConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8841".into(),
            request_timeout_ms: 30_000,
            reader: ReaderConfig::default(),
        }
    }
}

impl MinterReaderConfig {
    /// Build the reader this configuration describes.
    pub fn into_reader(self) -> Result<MinterActionReader, WatchError> {
        let client = MinterClient::new(
            &self.endpoint,
            Duration::from_millis(self.request_timeout_ms),
        )?;
        Ok(ActionReader::new(client, self.reader))
    }
}

/// Fluent builder for [`MinterReaderConfig`].
#[derive(Default)]
pub struct MinterReaderBuilder {
    config: MinterReaderConfig,
}

impl MinterReaderBuilder {
    pub fn new() -> Self {
        Self {
            config: MinterReaderConfig::default(),
        }
    }

    /// Set the node base URL.
    pub fn endpoint(mut self, endpoint: impl AsRef<str>) -> Self {
        self.config.endpoint = normalize_endpoint(endpoint.as_ref());
        self
    }

    /// Set the first block to index (zero or negative = blocks behind head).
    pub fn start_at_block(mut self, block: i64) -> Self {
        self.config.reader.start_at_block = block;
        self
    }

    /// Set the number of attempts per head/block fetch.
    pub fn num_retries(mut self, n: u32) -> Self {
        self.config.reader.retry.num_retries = n;
        self
    }

    /// Set the wait between attempts in milliseconds.
    pub fn wait_time_ms(mut self, ms: u64) -> Self {
        self.config.reader.retry.wait_time_ms = ms;
        self
    }

    /// Set the per-request HTTP timeout in milliseconds.
    pub fn request_timeout_ms(mut self, ms: u64) -> Self {
        self.config.request_timeout_ms = ms;
        self
    }

    pub fn build_config(self) -> MinterReaderConfig {
        self.config
    }

    pub fn build(self) -> Result<MinterActionReader, WatchError> {
        self.config.into_reader()
    }
}
