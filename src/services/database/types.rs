//! Schema and result types shared across the query core.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Ordered field name to value mapping for a single result row.
pub type RowMap = serde_json::Map<String, serde_json::Value>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableMeta {
    pub catalog: Option<String>,
    pub schema: String,
    pub name: String,
    pub table_type: String,
    pub comment: Option<String>,
    pub columns: Vec<ColumnMeta>,
    pub primary_keys: Vec<String>,
    pub foreign_keys: Vec<ForeignKeyRef>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnMeta {
    pub name: String,
    pub data_type: String,
    pub is_nullable: bool,
    pub is_primary_key: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForeignKeyRef {
    pub column: String,
    pub referenced_table: String,
    pub referenced_column: String,
}

impl TableMeta {
    /// Schema-qualified name, omitting the default/empty schema
    pub fn qualified_name(&self) -> String {
        if self.schema.is_empty() {
            self.name.clone()
        } else {
            format!("{}.{}", self.schema, self.name)
        }
    }

    pub fn column(&self, name: &str) -> Option<&ColumnMeta> {
        self.columns.iter().find(|c| c.name.eq_ignore_ascii_case(name))
    }
}

/// Immutable snapshot of the introspected database structure.
///
/// Published whole by the schema cache; readers always see a consistent
/// snapshot, never a partially rebuilt one. `version` strictly increases
/// across rebuilds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaSnapshot {
    pub version: u64,
    pub last_modified: DateTime<Utc>,
    pub table_count: usize,
    pub tables: Vec<TableMeta>,
}

impl SchemaSnapshot {
    pub fn header(&self) -> SchemaHeader {
        SchemaHeader {
            version: self.version,
            last_modified: self.last_modified,
            table_count: self.table_count,
        }
    }

    /// Look up a table by bare or schema-qualified name, case-insensitively
    pub fn find_table(&self, name: &str) -> Option<&TableMeta> {
        self.tables.iter().find(|t| {
            t.name.eq_ignore_ascii_case(name) || t.qualified_name().eq_ignore_ascii_case(name)
        })
    }
}

/// Cheap header view of the current snapshot.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SchemaHeader {
    pub version: u64,
    pub last_modified: DateTime<Utc>,
    pub table_count: usize,
}

/// A table plus a handful of live sample rows, for the schema browser.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableSample {
    #[serde(flatten)]
    pub table: TableMeta,
    pub sample_rows: Vec<RowMap>,
}

// ============================================================================
// Query requests
// ============================================================================

/// A typed value bound into a template query. Never spliced into SQL text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamValue {
    Text(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Null,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NamedParam {
    pub name: String,
    pub value: ParamValue,
}

impl NamedParam {
    pub fn new(name: impl Into<String>, value: ParamValue) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum QueryRequest {
    Raw(String),
    Template {
        template: String,
        parameters: Vec<NamedParam>,
    },
}

/// Read vs. write effect of a statement, judged by its leading verb.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatementEffect {
    Read,
    Write,
}

// ============================================================================
// Query results
// ============================================================================

/// What a dialect adapter hands back for one executed statement.
#[derive(Debug, Clone, Default)]
pub struct StatementOutput {
    pub fields: Vec<String>,
    pub rows: Vec<RowMap>,
    /// Populated for write statements instead of `rows`
    pub rows_affected: Option<u64>,
}

/// Structured result of one execution request, success or failure.
///
/// A failed execution reports zero rows, never a truncated result set:
/// `error` is set exactly when `errors_count > 0`, and then `rows` is empty.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResult {
    pub rows: Vec<RowMap>,
    pub row_count: u64,
    pub fields: Vec<String>,
    /// Serialized byte size of the row data
    pub payload_size: u64,
    pub total_time_ms: u64,
    pub errors_count: u32,
    pub error: Option<String>,
}

impl QueryResult {
    pub fn success(output: StatementOutput, total_time_ms: u64) -> Self {
        let row_count = output
            .rows_affected
            .unwrap_or(output.rows.len() as u64);
        let payload_size = serde_json::to_vec(&output.rows)
            .map(|bytes| bytes.len() as u64)
            .unwrap_or(0);
        Self {
            rows: output.rows,
            row_count,
            fields: output.fields,
            payload_size,
            total_time_ms,
            errors_count: 0,
            error: None,
        }
    }

    pub fn failure(message: impl Into<String>, total_time_ms: u64) -> Self {
        Self {
            rows: Vec::new(),
            row_count: 0,
            fields: Vec::new(),
            payload_size: 0,
            total_time_ms,
            errors_count: 1,
            error: Some(message.into()),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.errors_count == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_has_no_rows() {
        let result = QueryResult::failure("boom", 3);
        assert_eq!(result.errors_count, 1);
        assert!(result.rows.is_empty());
        assert_eq!(result.row_count, 0);
        assert_eq!(result.error.as_deref(), Some("boom"));
    }

    #[test]
    fn test_success_counts_affected_rows() {
        let output = StatementOutput {
            fields: vec![],
            rows: vec![],
            rows_affected: Some(7),
        };
        let result = QueryResult::success(output, 1);
        assert_eq!(result.row_count, 7);
        assert!(result.is_ok());
    }

    #[test]
    fn test_find_table_qualified_and_case_insensitive() {
        let snapshot = SchemaSnapshot {
            version: 1,
            last_modified: Utc::now(),
            table_count: 1,
            tables: vec![TableMeta {
                catalog: None,
                schema: "public".to_string(),
                name: "Users".to_string(),
                table_type: "BASE TABLE".to_string(),
                comment: None,
                columns: vec![],
                primary_keys: vec![],
                foreign_keys: vec![],
            }],
        };
        assert!(snapshot.find_table("users").is_some());
        assert!(snapshot.find_table("public.users").is_some());
        assert!(snapshot.find_table("missing").is_none());
    }
}
