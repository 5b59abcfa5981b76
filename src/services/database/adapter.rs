//! Dialect adapter seam.
//!
//! One implementation per supported backend family, selected once at startup
//! from configuration. Implementations translate generic `:name` placeholders
//! into their native binding syntax, map native rows into the generic row
//! mapping, and never leak backend error types past this boundary.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::CoreConfig;
use crate::error::CoreResult;

use super::postgres::PostgresAdapter;
use super::sqlite::SqliteAdapter;
use super::types::{ParamValue, StatementEffect, StatementOutput, TableMeta};

/// Supported backend families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    Postgres,
    Sqlite,
}

impl Dialect {
    pub fn as_str(&self) -> &'static str {
        match self {
            Dialect::Postgres => "postgres",
            Dialect::Sqlite => "sqlite",
        }
    }

    /// Double-quote an identifier, escaping embedded quotes.
    /// Both supported backends accept the SQL-standard form.
    pub fn quote_ident(&self, ident: &str) -> String {
        format!("\"{}\"", ident.replace('"', "\"\""))
    }
}

/// Capability set every backend family implements.
#[async_trait]
pub trait DialectAdapter: Send + Sync {
    fn dialect(&self) -> Dialect;

    /// Cheap connectivity check against the live backend
    async fn ping(&self) -> CoreResult<()>;

    /// Query the backend for its structural metadata: tables, columns,
    /// primary and foreign keys, comments where the backend exposes them.
    async fn introspect(&self) -> CoreResult<Vec<TableMeta>>;

    /// Run one statement with the given bound parameters.
    ///
    /// `effect` tells the adapter whether to fetch rows or report affected
    /// rows. `timeout` is the cancellation pass-through: an elapsed deadline
    /// surfaces as `CoreError::Cancelled` rather than hanging.
    async fn execute(
        &self,
        sql: &str,
        params: &[ParamValue],
        effect: StatementEffect,
        timeout: Option<Duration>,
    ) -> CoreResult<StatementOutput>;
}

/// Run a backend future under an optional deadline, mapping an elapsed
/// deadline to `Cancelled` instead of hanging the caller.
pub(crate) async fn with_deadline<T, F>(fut: F, limit: Option<Duration>) -> CoreResult<T>
where
    F: std::future::Future<Output = Result<T, sqlx::Error>>,
{
    match limit {
        Some(limit) => match async_std::future::timeout(limit, fut).await {
            Ok(result) => result.map_err(crate::error::CoreError::from),
            Err(_) => Err(crate::error::CoreError::cancelled(format!(
                "statement exceeded {}ms",
                limit.as_millis()
            ))),
        },
        None => fut.await.map_err(crate::error::CoreError::from),
    }
}

/// Build the adapter named by the configuration and verify connectivity.
pub async fn connect(config: &CoreConfig) -> CoreResult<Arc<dyn DialectAdapter>> {
    let adapter: Arc<dyn DialectAdapter> = match config.dialect {
        Dialect::Postgres => Arc::new(PostgresAdapter::connect(config).await?),
        Dialect::Sqlite => Arc::new(SqliteAdapter::connect(config).await?),
    };
    adapter.ping().await?;
    Ok(adapter)
}
