//! Suggestion providers, one grammatical context each.
//!
//! Providers are stateless and side-effect free. A provider that does not
//! recognize the context returns an empty list, never an error, and the
//! schema-dependent providers return nothing when no snapshot is cached.

use crate::services::database::SchemaSnapshot;

use super::token::{Prefix, TokenKind};
use super::{CompletionContext, Suggestion, SuggestionKind, SuggestionProvider};

const STATEMENT_KEYWORDS: [&str; 9] = [
    "SELECT", "INSERT", "UPDATE", "DELETE", "CREATE", "DROP", "ALTER", "WITH", "EXPLAIN",
];

const AFTER_TABLE_KEYWORDS: [&str; 7] = [
    "WHERE", "JOIN", "LEFT JOIN", "INNER JOIN", "GROUP BY", "ORDER BY", "LIMIT",
];

const IN_CONDITION_KEYWORDS: [&str; 5] = ["AND", "OR", "GROUP BY", "ORDER BY", "LIMIT"];

const NON_TABLE_TAIL: [&str; 14] = [
    "SELECT", "FROM", "JOIN", "INTO", "UPDATE", "TABLE", "WHERE", "AND", "OR", "ON", "BY", "SET",
    "LIMIT", "IN",
];

fn matches_prefix(candidate: &str, prefix: &str) -> bool {
    if prefix.is_empty() {
        return true;
    }
    candidate
        .get(..prefix.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
}

fn keyword_suggestion(keyword: &str, prefix: &Prefix<'_>) -> Suggestion {
    Suggestion {
        label: keyword.to_string(),
        kind: SuggestionKind::Keyword,
        insert_text: keyword.to_string(),
        detail: "keyword".to_string(),
        range_start: prefix.start,
    }
}

/// Re-apply quoting when the user started a quoted identifier.
fn identifier_insert(name: &str, prefix: &Prefix<'_>) -> String {
    if prefix.quoted {
        format!("\"{}\"", name)
    } else {
        name.to_string()
    }
}

/// Statement-start keywords on an empty statement.
pub struct StatementKeywordProvider;

impl SuggestionProvider for StatementKeywordProvider {
    fn propose(
        &self,
        ctx: &CompletionContext<'_>,
        _schema: Option<&SchemaSnapshot>,
    ) -> Vec<Suggestion> {
        if !ctx.tokens.is_empty() {
            return Vec::new();
        }
        STATEMENT_KEYWORDS
            .iter()
            .filter(|kw| matches_prefix(kw, ctx.prefix.text))
            .map(|kw| keyword_suggestion(kw, &ctx.prefix))
            .collect()
    }
}

/// Clause keywords inside a statement: FROM after the select list, WHERE
/// and friends after the table, AND/OR inside a condition.
pub struct ClauseKeywordProvider;

impl ClauseKeywordProvider {
    fn propose_from(&self, ctx: &CompletionContext<'_>) -> Option<Suggestion> {
        // `SELECT <list>` with no FROM yet: exactly one FROM suggestion
        let first = ctx.tokens.first()?;
        if !first.is_keyword("SELECT") || ctx.has_keyword("FROM") || ctx.tokens.len() < 2 {
            return None;
        }
        if !matches_prefix("FROM", ctx.prefix.text) {
            return None;
        }
        Some(keyword_suggestion("FROM", &ctx.prefix))
    }

    fn propose_after_table(&self, ctx: &CompletionContext<'_>) -> Vec<Suggestion> {
        if !ctx.has_keyword("FROM") && !ctx.has_keyword("UPDATE") {
            return Vec::new();
        }
        let Some(last) = ctx.tokens.last() else {
            return Vec::new();
        };
        // Only fires after a complete table (or column) reference; positions
        // right after a keyword belong to the identifier providers
        if !last.is_identifier() || NON_TABLE_TAIL.iter().any(|kw| last.is_keyword(kw)) {
            return Vec::new();
        }

        let candidates: &[&str] = if ctx.has_keyword("WHERE") {
            &IN_CONDITION_KEYWORDS
        } else {
            &AFTER_TABLE_KEYWORDS
        };

        candidates
            .iter()
            .filter(|kw| !ctx.has_keyword(kw))
            .filter(|kw| matches_prefix(kw, ctx.prefix.text))
            .map(|kw| keyword_suggestion(kw, &ctx.prefix))
            .collect()
    }
}

impl SuggestionProvider for ClauseKeywordProvider {
    fn propose(
        &self,
        ctx: &CompletionContext<'_>,
        _schema: Option<&SchemaSnapshot>,
    ) -> Vec<Suggestion> {
        let mut suggestions = Vec::new();
        if let Some(from) = self.propose_from(ctx) {
            suggestions.push(from);
        }
        suggestions.extend(self.propose_after_table(ctx));
        suggestions
    }
}

/// Table names after FROM, JOIN, INTO, UPDATE, or TABLE.
pub struct TableNameProvider;

const TABLE_POSITION_KEYWORDS: [&str; 5] = ["FROM", "JOIN", "INTO", "UPDATE", "TABLE"];

impl SuggestionProvider for TableNameProvider {
    fn propose(
        &self,
        ctx: &CompletionContext<'_>,
        schema: Option<&SchemaSnapshot>,
    ) -> Vec<Suggestion> {
        let Some(schema) = schema else {
            return Vec::new();
        };
        let Some(last) = ctx.tokens.last() else {
            return Vec::new();
        };
        if !TABLE_POSITION_KEYWORDS.iter().any(|kw| last.is_keyword(kw)) {
            return Vec::new();
        }

        schema
            .tables
            .iter()
            .filter(|table| matches_prefix(&table.name, ctx.prefix.text))
            .map(|table| Suggestion {
                label: table.name.clone(),
                kind: SuggestionKind::Table,
                insert_text: identifier_insert(&table.name, &ctx.prefix),
                detail: format!("{} · {}", table.table_type.to_lowercase(), table.schema),
                range_start: ctx.prefix.start,
            })
            .collect()
    }
}

/// Column names in the select list and in condition positions.
pub struct ColumnNameProvider;

const COLUMN_POSITION_KEYWORDS: [&str; 6] = ["SELECT", "WHERE", "AND", "OR", "ON", "BY"];

impl ColumnNameProvider {
    fn in_column_position(&self, ctx: &CompletionContext<'_>) -> bool {
        let Some(last) = ctx.tokens.last() else {
            return false;
        };
        if COLUMN_POSITION_KEYWORDS.iter().any(|kw| last.is_keyword(kw)) {
            return true;
        }
        // Continuing a select list: `SELECT id, `
        if last.kind == TokenKind::Symbol && last.text == "," {
            return ctx
                .tokens
                .first()
                .is_some_and(|t| t.is_keyword("SELECT"))
                && !ctx.has_keyword("FROM");
        }
        false
    }

    /// Tables named in the statement, falling back to the whole schema when
    /// none are mentioned yet (select list typed before the FROM clause).
    fn referenced_tables<'s>(
        &self,
        ctx: &CompletionContext<'_>,
        schema: &'s SchemaSnapshot,
    ) -> Vec<&'s crate::services::database::TableMeta> {
        let mentioned: Vec<_> = ctx
            .tokens
            .iter()
            .filter(|t| t.is_identifier())
            .filter_map(|t| schema.find_table(t.ident_text()))
            .collect();
        if mentioned.is_empty() {
            schema.tables.iter().collect()
        } else {
            mentioned
        }
    }
}

impl SuggestionProvider for ColumnNameProvider {
    fn propose(
        &self,
        ctx: &CompletionContext<'_>,
        schema: Option<&SchemaSnapshot>,
    ) -> Vec<Suggestion> {
        let Some(schema) = schema else {
            return Vec::new();
        };
        if !self.in_column_position(ctx) {
            return Vec::new();
        }

        self.referenced_tables(ctx, schema)
            .into_iter()
            .flat_map(|table| {
                table.columns.iter().map(move |column| Suggestion {
                    label: column.name.clone(),
                    kind: SuggestionKind::Column,
                    insert_text: identifier_insert(&column.name, &ctx.prefix),
                    detail: format!("{} · {}", column.data_type, table.name),
                    range_start: ctx.prefix.start,
                })
            })
            .filter(|s| matches_prefix(&s.label, ctx.prefix.text))
            .collect()
    }
}

/// Literal values after a comparison operator.
pub struct ValueLiteralProvider;

const COMPARISON_SYMBOLS: [&str; 6] = ["=", "<", ">", "<=", ">=", "<>"];
const VALUE_LITERALS: [&str; 3] = ["NULL", "TRUE", "FALSE"];

impl SuggestionProvider for ValueLiteralProvider {
    fn propose(
        &self,
        ctx: &CompletionContext<'_>,
        _schema: Option<&SchemaSnapshot>,
    ) -> Vec<Suggestion> {
        let Some(last) = ctx.tokens.last() else {
            return Vec::new();
        };
        let comparison = (last.kind == TokenKind::Symbol
            && COMPARISON_SYMBOLS.contains(&last.text))
            || last.is_keyword("IN")
            || last.is_keyword("LIKE")
            || last.is_keyword("IS");
        if !comparison {
            return Vec::new();
        }

        VALUE_LITERALS
            .iter()
            .filter(|lit| matches_prefix(lit, ctx.prefix.text))
            .map(|lit| Suggestion {
                label: lit.to_string(),
                kind: SuggestionKind::Value,
                insert_text: lit.to_string(),
                detail: "literal".to_string(),
                range_start: ctx.prefix.start,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::database::{ColumnMeta, TableMeta};
    use chrono::Utc;

    pub(crate) fn snapshot() -> SchemaSnapshot {
        let users = TableMeta {
            catalog: None,
            schema: "public".to_string(),
            name: "users".to_string(),
            table_type: "BASE TABLE".to_string(),
            comment: None,
            columns: vec![
                ColumnMeta {
                    name: "id".to_string(),
                    data_type: "integer".to_string(),
                    is_nullable: false,
                    is_primary_key: true,
                },
                ColumnMeta {
                    name: "email".to_string(),
                    data_type: "text".to_string(),
                    is_nullable: false,
                    is_primary_key: false,
                },
            ],
            primary_keys: vec!["id".to_string()],
            foreign_keys: vec![],
        };
        let orders = TableMeta {
            catalog: None,
            schema: "public".to_string(),
            name: "orders".to_string(),
            table_type: "BASE TABLE".to_string(),
            comment: None,
            columns: vec![ColumnMeta {
                name: "total".to_string(),
                data_type: "numeric".to_string(),
                is_nullable: true,
                is_primary_key: false,
            }],
            primary_keys: vec![],
            foreign_keys: vec![],
        };
        SchemaSnapshot {
            version: 1,
            last_modified: Utc::now(),
            table_count: 2,
            tables: vec![users, orders],
        }
    }

    fn ctx(text: &str) -> CompletionContext<'_> {
        CompletionContext::build(text, text.len())
    }

    #[test]
    fn test_statement_keywords_on_empty_document() {
        let context = ctx("");
        let suggestions = StatementKeywordProvider.propose(&context, None);
        assert!(suggestions.iter().any(|s| s.label == "SELECT"));
        assert!(suggestions.iter().all(|s| s.kind == SuggestionKind::Keyword));
    }

    #[test]
    fn test_statement_keywords_filtered_by_prefix() {
        let context = ctx("se");
        let suggestions = StatementKeywordProvider.propose(&context, None);
        assert_eq!(suggestions.len(), 1);
        assert_eq!(suggestions[0].label, "SELECT");
        assert_eq!(suggestions[0].range_start, 0);
    }

    #[test]
    fn test_from_proposed_after_select_list() {
        let context = ctx("SELECT id ");
        let suggestions = ClauseKeywordProvider.propose(&context, None);
        assert_eq!(
            suggestions
                .iter()
                .filter(|s| s.label == "FROM")
                .count(),
            1
        );
    }

    #[test]
    fn test_from_not_proposed_twice() {
        let context = ctx("SELECT id FROM users ");
        let suggestions = ClauseKeywordProvider.propose(&context, None);
        assert!(suggestions.iter().all(|s| s.label != "FROM"));
    }

    #[test]
    fn test_from_not_proposed_on_empty_select_list() {
        let context = ctx("SELECT ");
        let suggestions = ClauseKeywordProvider.propose(&context, None);
        assert!(suggestions.iter().all(|s| s.label != "FROM"));
    }

    #[test]
    fn test_where_proposed_after_table() {
        let context = ctx("SELECT id FROM users ");
        let suggestions = ClauseKeywordProvider.propose(&context, None);
        assert!(suggestions.iter().any(|s| s.label == "WHERE"));
        assert!(suggestions.iter().any(|s| s.label == "ORDER BY"));
    }

    #[test]
    fn test_tables_proposed_after_from() {
        let schema = snapshot();
        let context = ctx("SELECT id FROM ");
        let suggestions = TableNameProvider.propose(&context, Some(&schema));
        let labels: Vec<&str> = suggestions.iter().map(|s| s.label.as_str()).collect();
        assert_eq!(labels, vec!["users", "orders"]);
    }

    #[test]
    fn test_tables_filtered_by_prefix_case_insensitively() {
        let schema = snapshot();
        let context = ctx("SELECT id FROM US");
        let suggestions = TableNameProvider.propose(&context, Some(&schema));
        assert_eq!(suggestions.len(), 1);
        assert_eq!(suggestions[0].label, "users");
        assert_eq!(suggestions[0].insert_text, "users");
    }

    #[test]
    fn test_quoted_prefix_requotes_insert_text() {
        let schema = snapshot();
        let text = r#"SELECT id FROM "us"#;
        let context = CompletionContext::build(text, text.len());
        let suggestions = TableNameProvider.propose(&context, Some(&schema));
        assert_eq!(suggestions.len(), 1);
        assert_eq!(suggestions[0].insert_text, "\"users\"");
        assert_eq!(suggestions[0].range_start, 14);
    }

    #[test]
    fn test_table_provider_without_schema_is_silent() {
        let context = ctx("SELECT id FROM ");
        assert!(TableNameProvider.propose(&context, None).is_empty());
    }

    #[test]
    fn test_columns_scoped_to_referenced_table() {
        let schema = snapshot();
        let context = ctx("SELECT id FROM users WHERE ");
        let suggestions = ColumnNameProvider.propose(&context, Some(&schema));
        let labels: Vec<&str> = suggestions.iter().map(|s| s.label.as_str()).collect();
        assert_eq!(labels, vec!["id", "email"]);
    }

    #[test]
    fn test_columns_from_all_tables_before_from_clause() {
        let schema = snapshot();
        let context = ctx("SELECT ");
        let suggestions = ColumnNameProvider.propose(&context, Some(&schema));
        assert!(suggestions.iter().any(|s| s.label == "total"));
        assert!(suggestions.iter().any(|s| s.label == "id"));
    }

    #[test]
    fn test_value_literals_after_comparison() {
        let context = ctx("SELECT id FROM users WHERE active = ");
        let suggestions = ValueLiteralProvider.propose(&context, None);
        let labels: Vec<&str> = suggestions.iter().map(|s| s.label.as_str()).collect();
        assert_eq!(labels, vec!["NULL", "TRUE", "FALSE"]);
    }

    #[test]
    fn test_value_literals_not_proposed_elsewhere() {
        let context = ctx("SELECT id FROM users ");
        assert!(ValueLiteralProvider.propose(&context, None).is_empty());
    }
}
