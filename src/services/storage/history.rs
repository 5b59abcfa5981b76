use anyhow::{Context, Result};
use chrono::{NaiveDateTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use super::types::QueryHistoryEntry;

/// Repository for query history operations.
#[derive(Debug, Clone)]
pub struct QueryHistoryRepository {
    pool: SqlitePool,
}

impl QueryHistoryRepository {
    pub(crate) fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Record a query execution
    pub async fn record(
        &self,
        sql: &str,
        dialect: &str,
        duration_ms: i64,
        row_count: Option<i64>,
        success: bool,
        error_message: Option<&str>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO query_history
                (id, sql, dialect, duration_ms, row_count, success, error_message, executed_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, datetime('now'))
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(sql)
        .bind(dialect)
        .bind(duration_ms)
        .bind(row_count)
        .bind(success)
        .bind(error_message)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Load the most recent executions, newest first
    pub async fn recent(&self, limit: u32) -> Result<Vec<QueryHistoryEntry>> {
        let rows = sqlx::query_as::<
            _,
            (
                String,
                String,
                String,
                i64,
                Option<i64>,
                bool,
                Option<String>,
                String,
            ),
        >(
            r#"
            SELECT id, sql, dialect, duration_ms, row_count, success, error_message, executed_at
            FROM query_history
            ORDER BY executed_at DESC, rowid DESC
            LIMIT ?
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(
                |(id, sql, dialect, duration_ms, row_count, success, error_message, executed_at)| {
                    Ok(QueryHistoryEntry {
                        id: Uuid::parse_str(&id).context("Invalid UUID")?,
                        sql,
                        dialect,
                        duration_ms,
                        row_count,
                        success,
                        error_message,
                        executed_at: NaiveDateTime::parse_from_str(
                            &executed_at,
                            "%Y-%m-%d %H:%M:%S",
                        )
                        .map(|dt| dt.and_utc())
                        .unwrap_or_else(|_| Utc::now()),
                    })
                },
            )
            .collect()
    }

    /// Prune old entries, keeping only the last N
    pub async fn prune(&self, keep: u32) -> Result<u64> {
        let result = sqlx::query(
            r#"
            DELETE FROM query_history
            WHERE rowid NOT IN (
                SELECT rowid FROM query_history
                ORDER BY executed_at DESC, rowid DESC
                LIMIT ?
            )
            "#,
        )
        .bind(keep)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}
