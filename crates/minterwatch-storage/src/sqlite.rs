//! SQLite index state store.
//!
//! Persists one checkpoint row per indexer to a single SQLite file, using
//! `sqlx` with WAL mode.
//!
//! # Usage
//! ```rust,no_run
//! use minterwatch_storage::sqlite::SqliteIndexStateStore;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! // File-backed (persistent)
//! let store = SqliteIndexStateStore::open("./minter.db").await?;
//!
//! // In-memory (tests / ephemeral)
//! let store = SqliteIndexStateStore::in_memory().await?;
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Row, SqlitePool};
use tracing::debug;

use minterwatch_core::checkpoint::{Checkpoint, IndexStateStore};
use minterwatch_core::error::WatchError;

fn storage_err(e: sqlx::Error) -> WatchError {
    WatchError::Storage(e.to_string())
}

/// SQLite-backed checkpoint store.
pub struct SqliteIndexStateStore {
    pool: SqlitePool,
}

impl SqliteIndexStateStore {
    /// Open (or create) a SQLite database at `path`.
    ///
    /// The path may be a plain file path (`"./minter.db"`) or a full
    /// SQLite URL (`"sqlite:./minter.db?mode=rwc"`).
    pub async fn open(path: &str) -> Result<Self, WatchError> {
        let url = if path.starts_with("sqlite:") {
            path.to_string()
        } else {
            format!("sqlite:{path}?mode=rwc")
        };

        let pool = SqlitePool::connect(&url).await.map_err(storage_err)?;
        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    /// Open an in-memory SQLite database. Data is lost when the store is dropped.
    pub async fn in_memory() -> Result<Self, WatchError> {
        // Every pooled connection to `:memory:` is its own database.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(storage_err)?;

        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> Result<(), WatchError> {
        sqlx::query("PRAGMA journal_mode=WAL;")
            .execute(&self.pool)
            .await
            .map_err(storage_err)?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS index_state (
                indexer_id   TEXT    NOT NULL PRIMARY KEY,
                block_height INTEGER NOT NULL,
                block_hash   TEXT    NOT NULL,
                updated_at   INTEGER NOT NULL
            );",
        )
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        Ok(())
    }
}

#[async_trait]
impl IndexStateStore for SqliteIndexStateStore {
    async fn load(&self, indexer_id: &str) -> Result<Option<Checkpoint>, WatchError> {
        let row = sqlx::query(
            "SELECT indexer_id, block_height, block_hash, updated_at
             FROM index_state WHERE indexer_id = ?",
        )
        .bind(indexer_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_err)?;

        Ok(row.map(|r| Checkpoint {
            indexer_id: r.get("indexer_id"),
            block_height: r.get::<i64, _>("block_height") as u64,
            block_hash: r.get("block_hash"),
            updated_at: r.get("updated_at"),
        }))
    }

    async fn save(&self, checkpoint: Checkpoint) -> Result<(), WatchError> {
        sqlx::query(
            "INSERT OR REPLACE INTO index_state
             (indexer_id, block_height, block_hash, updated_at)
             VALUES (?, ?, ?, ?)",
        )
        .bind(&checkpoint.indexer_id)
        .bind(checkpoint.block_height as i64)
        .bind(&checkpoint.block_hash)
        .bind(checkpoint.updated_at)
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        debug!(
            indexer_id = %checkpoint.indexer_id,
            block = checkpoint.block_height,
            "checkpoint saved"
        );
        Ok(())
    }

    async fn delete(&self, indexer_id: &str) -> Result<(), WatchError> {
        sqlx::query("DELETE FROM index_state WHERE indexer_id = ?")
            .bind(indexer_id)
            .execute(&self.pool)
            .await
            .map_err(storage_err)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use minterwatch_core::checkpoint::IndexState;

    fn checkpoint(indexer_id: &str, height: u64, hash: &str, updated_at: i64) -> Checkpoint {
        Checkpoint {
            indexer_id: indexer_id.into(),
            block_height: height,
            block_hash: hash.into(),
            updated_at,
        }
    }

    #[tokio::test]
    async fn checkpoint_roundtrip() {
        let store = SqliteIndexStateStore::in_memory().await.unwrap();
        store
            .save(checkpoint("ledger", 1_000, "Mhabcdef", 1_700_000_000))
            .await
            .unwrap();

        let loaded = store.load("ledger").await.unwrap().unwrap();
        assert_eq!(loaded.block_height, 1_000);
        assert_eq!(loaded.block_hash, "Mhabcdef");
        assert_eq!(loaded.updated_at, 1_700_000_000);
    }

    #[tokio::test]
    async fn save_overwrites_previous_checkpoint() {
        let store = SqliteIndexStateStore::in_memory().await.unwrap();
        store.save(checkpoint("ledger", 100, "Mhold", 0)).await.unwrap();
        store.save(checkpoint("ledger", 200, "Mhnew", 1)).await.unwrap();

        let state = store.load_index_state("ledger").await.unwrap();
        assert_eq!(
            state,
            IndexState {
                block_height: 200,
                block_hash: "Mhnew".into(),
            }
        );
    }

    #[tokio::test]
    async fn missing_checkpoint_is_zero_state() {
        let store = SqliteIndexStateStore::in_memory().await.unwrap();
        assert!(store.load("unknown").await.unwrap().is_none());
        assert_eq!(store.load_index_state("unknown").await.unwrap(), IndexState::default());
    }

    #[tokio::test]
    async fn delete_only_touches_one_indexer() {
        let store = SqliteIndexStateStore::in_memory().await.unwrap();
        store.save(checkpoint("ledger", 5, "Mh05", 0)).await.unwrap();
        store.save(checkpoint("rewards", 7, "Mh07", 0)).await.unwrap();

        store.delete("ledger").await.unwrap();
        assert!(store.load("ledger").await.unwrap().is_none());
        assert_eq!(store.load("rewards").await.unwrap().unwrap().block_height, 7);
    }
}
