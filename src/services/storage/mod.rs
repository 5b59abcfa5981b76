//! SQLite-backed query history storage.

mod history;
mod types;

pub use history::QueryHistoryRepository;
pub use types::*;

use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};

/// Local store holding the query history, independent of the target database.
#[derive(Debug, Clone)]
pub struct HistoryStore {
    pool: SqlitePool,
}

impl HistoryStore {
    /// Open the per-user default store at `~/.sqldeck/history.db`.
    pub async fn open_default() -> Result<Self> {
        Self::open(&Self::default_path()?).await
    }

    pub async fn open(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let options = SqliteConnectOptions::from_str(&format!("sqlite://{}", db_path.display()))?
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.initialize_schema().await?;
        Ok(store)
    }

    fn default_path() -> Result<PathBuf> {
        let home =
            dirs::home_dir().ok_or_else(|| anyhow::anyhow!("Could not find home directory"))?;
        Ok(home.join(".sqldeck").join("history.db"))
    }

    /// Get a query history repository
    pub fn history(&self) -> QueryHistoryRepository {
        QueryHistoryRepository::new(self.pool.clone())
    }

    /// Initialize the database schema
    async fn initialize_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
                CREATE TABLE IF NOT EXISTS query_history (
                    id TEXT PRIMARY KEY,
                    sql TEXT NOT NULL,
                    dialect TEXT NOT NULL,
                    duration_ms INTEGER NOT NULL,
                    row_count INTEGER,
                    success INTEGER NOT NULL,
                    error_message TEXT,
                    executed_at TIMESTAMP NOT NULL
                )
                "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_history_executed ON query_history(executed_at DESC)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[async_std::test]
    async fn test_record_and_load_recent() {
        let dir = tempfile::tempdir().unwrap();
        let store = HistoryStore::open(&dir.path().join("history.db"))
            .await
            .unwrap();
        let history = store.history();

        history
            .record("SELECT 1", "sqlite", 3, Some(1), true, None)
            .await
            .unwrap();
        history
            .record("DELETE FROM t", "sqlite", 1, None, false, Some("denied"))
            .await
            .unwrap();

        let entries = history.recent(10).await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].sql, "DELETE FROM t");
        assert!(!entries[0].success);
        assert_eq!(entries[0].error_message.as_deref(), Some("denied"));
        assert!(entries[1].success);
    }

    #[async_std::test]
    async fn test_prune_keeps_most_recent() {
        let dir = tempfile::tempdir().unwrap();
        let store = HistoryStore::open(&dir.path().join("history.db"))
            .await
            .unwrap();
        let history = store.history();

        for i in 0..5 {
            history
                .record(&format!("SELECT {}", i), "sqlite", 1, Some(1), true, None)
                .await
                .unwrap();
        }

        history.prune(2).await.unwrap();
        let entries = history.recent(10).await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].sql, "SELECT 4");
    }
}
