//! PostgreSQL dialect adapter.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::{PgColumn, PgPool, PgPoolOptions, PgRow};
use sqlx::{Column, Row, TypeInfo, ValueRef};

use crate::config::CoreConfig;
use crate::error::{CoreError, CoreResult};

use super::adapter::{Dialect, DialectAdapter, with_deadline};
use super::template::{PlaceholderStyle, rewrite_placeholders};
use super::types::{
    ColumnMeta, ForeignKeyRef, ParamValue, RowMap, StatementEffect, StatementOutput, TableMeta,
};

pub struct PostgresAdapter {
    pool: PgPool,
}

impl PostgresAdapter {
    pub async fn connect(config: &CoreConfig) -> CoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout())
            .connect(&config.connection)
            .await
            .map_err(|e| {
                tracing::error!("Error Connecting: {}", e);
                CoreError::backend(format!("Failed to connect to PostgreSQL: {}", e))
            })?;

        Ok(Self { pool })
    }

    async fn fetch_columns(
        &self,
        table_name: &str,
        table_schema: &str,
    ) -> CoreResult<Vec<ColumnMeta>> {
        let query = r#"
            SELECT
                column_name,
                data_type,
                is_nullable
            FROM information_schema.columns
            WHERE table_name = $1 AND table_schema = $2
            ORDER BY ordinal_position
        "#;

        let rows = sqlx::query(query)
            .bind(table_name)
            .bind(table_schema)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .into_iter()
            .map(|row| {
                let is_nullable: String = row.get("is_nullable");
                ColumnMeta {
                    name: row.get("column_name"),
                    data_type: row.get("data_type"),
                    is_nullable: is_nullable == "YES",
                    is_primary_key: false,
                }
            })
            .collect())
    }

    async fn fetch_primary_keys(
        &self,
        table_name: &str,
        table_schema: &str,
    ) -> CoreResult<Vec<String>> {
        let query = r#"
            SELECT kcu.column_name
            FROM information_schema.table_constraints tc
            JOIN information_schema.key_column_usage kcu
                ON tc.constraint_name = kcu.constraint_name
                AND tc.table_schema = kcu.table_schema
            WHERE tc.constraint_type = 'PRIMARY KEY'
                AND tc.table_name = $1
                AND tc.table_schema = $2
            ORDER BY kcu.ordinal_position
        "#;

        let rows = sqlx::query(query)
            .bind(table_name)
            .bind(table_schema)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(|row| row.get("column_name")).collect())
    }

    async fn fetch_foreign_keys(
        &self,
        table_name: &str,
        table_schema: &str,
    ) -> CoreResult<Vec<ForeignKeyRef>> {
        let query = r#"
            SELECT
                kcu.column_name,
                ccu.table_name AS foreign_table_name,
                ccu.column_name AS foreign_column_name
            FROM information_schema.table_constraints AS tc
            JOIN information_schema.key_column_usage AS kcu
                ON tc.constraint_name = kcu.constraint_name
                AND tc.table_schema = kcu.table_schema
            JOIN information_schema.constraint_column_usage AS ccu
                ON ccu.constraint_name = tc.constraint_name
                AND ccu.table_schema = tc.table_schema
            WHERE tc.constraint_type = 'FOREIGN KEY'
                AND tc.table_name = $1
                AND tc.table_schema = $2
        "#;

        let rows = sqlx::query(query)
            .bind(table_name)
            .bind(table_schema)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .into_iter()
            .map(|row| ForeignKeyRef {
                column: row.get("column_name"),
                referenced_table: row.get("foreign_table_name"),
                referenced_column: row.get("foreign_column_name"),
            })
            .collect())
    }
}

#[async_trait]
impl DialectAdapter for PostgresAdapter {
    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    async fn ping(&self) -> CoreResult<()> {
        sqlx::query("SELECT 1").fetch_one(&self.pool).await?;
        Ok(())
    }

    async fn introspect(&self) -> CoreResult<Vec<TableMeta>> {
        let catalog: String = sqlx::query("SELECT current_database()")
            .fetch_one(&self.pool)
            .await?
            .get(0);

        let table_query = r#"
            SELECT
                t.table_name,
                t.table_schema,
                t.table_type,
                obj_description(format('%I.%I', t.table_schema, t.table_name)::regclass, 'pg_class') as description
            FROM information_schema.tables t
            WHERE t.table_schema NOT IN ('information_schema', 'pg_catalog')
            ORDER BY t.table_schema, t.table_name
        "#;

        let table_rows = sqlx::query(table_query).fetch_all(&self.pool).await?;
        let mut tables = Vec::with_capacity(table_rows.len());

        for table_row in table_rows {
            let table_name: String = table_row.get("table_name");
            let table_schema: String = table_row.get("table_schema");
            let table_type: String = table_row.get("table_type");
            let comment: Option<String> = table_row.get("description");

            let mut columns = self.fetch_columns(&table_name, &table_schema).await?;
            let primary_keys = self.fetch_primary_keys(&table_name, &table_schema).await?;
            let foreign_keys = self.fetch_foreign_keys(&table_name, &table_schema).await?;

            for column in &mut columns {
                column.is_primary_key = primary_keys.contains(&column.name);
            }

            tables.push(TableMeta {
                catalog: Some(catalog.clone()),
                schema: table_schema,
                name: table_name,
                table_type,
                comment,
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
            rewrite_placeholders(sql, PlaceholderStyle::Numbered)
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

fn rows_to_output(rows: &[PgRow]) -> StatementOutput {
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
                map.insert(column.name().to_string(), cell_value(row, column, index));
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

fn cell_value(row: &PgRow, column: &PgColumn, index: usize) -> Value {
    match row.try_get_raw(index) {
        Ok(raw) if raw.is_null() => return Value::Null,
        Err(_) => return Value::Null,
        Ok(_) => {}
    }

    match column.type_info().name() {
        "BOOL" => row
            .try_get::<bool, _>(index)
            .map(Value::from)
            .unwrap_or(Value::Null),
        "INT2" => row
            .try_get::<i16, _>(index)
            .map(Value::from)
            .unwrap_or(Value::Null),
        "INT4" => row
            .try_get::<i32, _>(index)
            .map(Value::from)
            .unwrap_or(Value::Null),
        "INT8" => row
            .try_get::<i64, _>(index)
            .map(Value::from)
            .unwrap_or(Value::Null),
        "FLOAT4" => row
            .try_get::<f32, _>(index)
            .map(Value::from)
            .unwrap_or(Value::Null),
        "FLOAT8" => row
            .try_get::<f64, _>(index)
            .map(Value::from)
            .unwrap_or(Value::Null),
        // Keep NUMERIC precision by rendering through Decimal
        "NUMERIC" => row
            .try_get::<rust_decimal::Decimal, _>(index)
            .map(|v| Value::String(v.to_string()))
            .unwrap_or(Value::Null),
        // Postgres renders most remaining types as text
        _ => row
            .try_get::<String, _>(index)
            .map(Value::String)
            .unwrap_or(Value::Null),
    }
}
