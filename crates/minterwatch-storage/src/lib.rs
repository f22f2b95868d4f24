//! minterwatch-storage — index state stores and handler backends.
//!
//! Backends:
//! - [`memory`] — [`InMemoryBackend`], integrator state in RAM, checkpoint via any store
//! - [`sqlite`] — SQLite checkpoint store via `sqlx` (feature `sqlite`)

pub mod memory;

#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use memory::InMemoryBackend;
pub use minterwatch_core::checkpoint::MemoryIndexStateStore;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteIndexStateStore;
