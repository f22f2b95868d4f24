//! Error types for the watch pipeline.

use thiserror::Error;

/// Errors that can occur while reading, handling or watching blocks.
#[derive(Debug, Error)]
pub enum WatchError {
    /// The node endpoint could not be reached during setup.
    #[error("Cannot reach supplied minter endpoint: {endpoint}")]
    NotInitialized { endpoint: String },

    /// The head height could not be fetched within the retry budget.
    #[error("Error retrieving head block, max retries failed after {attempts} attempts")]
    RetrieveHeadBlock { attempts: u32 },

    /// A block could not be fetched within the retry budget.
    #[error("Error retrieving block {height}, max retries failed after {attempts} attempts")]
    RetrieveBlock { height: u64, attempts: u32 },

    /// Transport failure talking to the node (connection refused, bad status, ...).
    #[error("HTTP error: {0}")]
    Http(String),

    /// The node answered with something that could not be normalized.
    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Storage error: {0}")]
    Storage(String),

    /// An updater or effect failed.
    #[error("Handler error in '{handler}': {reason}")]
    Handler { handler: String, reason: String },

    #[error("{0}")]
    Other(String),
}

impl WatchError {
    /// Returns `true` if the error means a retry budget was exhausted.
    pub fn is_retrieval(&self) -> bool {
        matches!(
            self,
            Self::RetrieveHeadBlock { .. } | Self::RetrieveBlock { .. }
        )
    }

    /// Convenience constructor for updater/effect failures.
    pub fn handler(handler: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::Handler {
            handler: handler.into(),
            reason: reason.to_string(),
        }
    }
}

impl From<serde_json::Error> for WatchError {
    fn from(e: serde_json::Error) -> Self {
        Self::Decode(e.to_string())
    }
}
