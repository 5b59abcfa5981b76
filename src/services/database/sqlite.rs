//! SQLite dialect adapter.

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{Column, Row, ValueRef};

use crate::config::CoreConfig;
use crate::error::{CoreError, CoreResult};

use super::adapter::{Dialect, DialectAdapter, with_deadline};
use super::template::{PlaceholderStyle, rewrite_placeholders};
use super::types::{
    ColumnMeta, ForeignKeyRef, ParamValue, RowMap, StatementEffect, StatementOutput, TableMeta,
};

pub struct SqliteAdapter {
    pool: SqlitePool,
}

impl SqliteAdapter {
    pub async fn connect(config: &CoreConfig) -> CoreResult<Self> {
        let target = if config.connection.starts_with("sqlite:") {
            config.connection.clone()
        } else {
            format!("sqlite://{}", config.connection)
        };

        let options = SqliteConnectOptions::from_str(&target)
            .map_err(|e| CoreError::validation(format!("Invalid SQLite target: {}", e)))?
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout())
            .connect_with(options)
            .await
            .map_err(|e| {
                tracing::error!("Error Connecting: {}", e);
                CoreError::backend(format!("Failed to open SQLite database: {}", e))
            })?;

        Ok(Self { pool })
    }

    async fn fetch_columns(&self, table_name: &str) -> CoreResult<Vec<ColumnMeta>> {
        let rows = sqlx::query(
            r#"SELECT name, type, "notnull", pk FROM pragma_table_info(?) ORDER BY cid"#,
        )
        .bind(table_name)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| {
                let not_null: i64 = row.get("notnull");
                let pk_position: i64 = row.get("pk");
                ColumnMeta {
                    name: row.get("name"),
                    data_type: row.get("type"),
                    is_nullable: not_null == 0,
                    is_primary_key: pk_position > 0,
                }
            })
            .collect())
    }

    async fn fetch_foreign_keys(&self, table_name: &str) -> CoreResult<Vec<ForeignKeyRef>> {
        let rows = sqlx::query(
            r#"SELECT "table", "from", "to" FROM pragma_foreign_key_list(?)"#,
        )
        .bind(table_name)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| ForeignKeyRef {
                column: row.get("from"),
                referenced_table: row.get("table"),
                // A NULL "to" means the referenced table's primary key
                referenced_column: row
                    .try_get::<Option<String>, _>("to")
                    .ok()
                    .flatten()
                    .unwrap_or_default(),
            })
            .collect())
    }
}

#[async_trait]
impl DialectAdapter for SqliteAdapter {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    async fn ping(&self) -> CoreResult<()> {
        sqlx::query("SELECT 1").fetch_one(&self.pool).await?;
        Ok(())
    }

    async fn introspect(&self) -> CoreResult<Vec<TableMeta>> {
        let table_rows = sqlx::query(
            r#"
            SELECT name, type
            FROM sqlite_master
            WHERE type IN ('table', 'view') AND name NOT LIKE 'sqlite_%'
            ORDER BY name
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut tables = Vec::with_capacity(table_rows.len());

        for table_row in table_rows {
            let name: String = table_row.get("name");
            let kind: String = table_row.get("type");

            let columns = self.fetch_columns(&name).await?;
            let foreign_keys = self.fetch_foreign_keys(&name).await?;
            let primary_keys = columns
                .iter()
                .filter(|c| c.is_primary_key)
                .map(|c| c.name.clone())
                .collect();

            tables.push(TableMeta {
                catalog: None,
                schema: "main".to_string(),
                name,
                table_type: if kind == "view" {
                    "VIEW".to_string()
                } else {
                    "BASE TABLE".to_string()
                },
                comment: None,
                columns,
                primary_keys,
                foreign_keys,
            });
        }

        Ok(tables)
    }

    async fn execute(
        &self,
        sql: &str,
        params: &[ParamValue],
        effect: StatementEffect,
        timeout: Option<Duration>,
    ) -> CoreResult<StatementOutput> {
        let sql = if params.is_empty() {
            sql.to_string()
        } else {
            rewrite_placeholders(sql, PlaceholderStyle::Question)
        };

        let mut query = sqlx::query(&sql);
        for value in params {
            query = match value {
                ParamValue::Text(s) => query.bind(s.clone()),
                ParamValue::Int(i) => query.bind(*i),
                ParamValue::Float(f) => query.bind(*f),
                ParamValue::Bool(b) => query.bind(*b),
                ParamValue::Null => query.bind(Option::<String>::None),
            };
        }

        match effect {
            StatementEffect::Read => {
                let rows = with_deadline(query.fetch_all(&self.pool), timeout).await?;
                Ok(rows_to_output(&rows))
            }
            StatementEffect::Write => {
                let done = with_deadline(query.execute(&self.pool), timeout).await?;
                Ok(StatementOutput {
                    fields: Vec::new(),
                    rows: Vec::new(),
                    rows_affected: Some(done.rows_affected()),
                })
            }
        }
    }
}

fn rows_to_output(rows: &[SqliteRow]) -> StatementOutput {
    if rows.is_empty() {
        return StatementOutput::default();
    }

    let fields = rows[0]
        .columns()
        .iter()
        .map(|col| col.name().to_string())
        .collect();

    let mapped = rows
        .iter()
        .map(|row| {
            let mut map = RowMap::new();
            for (index, column) in row.columns().iter().enumerate() {
                map.insert(column.name().to_string(), cell_value(row, index));
            }
            map
        })
        .collect();

    StatementOutput {
        fields,
        rows: mapped,
        rows_affected: None,
    }
}

fn cell_value(row: &SqliteRow, index: usize) -> Value {
    match row.try_get_raw(index) {
        Ok(raw) if raw.is_null() => return Value::Null,
        Err(_) => return Value::Null,
        Ok(_) => {}
    }

    // SQLite stores dynamic types; try in order of likelihood
    if let Ok(v) = row.try_get::<i64, _>(index) {
        return Value::from(v);
    }
    if let Ok(v) = row.try_get::<f64, _>(index) {
        return Value::from(v);
    }
    if let Ok(v) = row.try_get::<String, _>(index) {
        return Value::String(v);
    }

    Value::Null
}
