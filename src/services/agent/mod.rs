//! Natural-language to SQL through an external text-generation collaborator.
//!
//! The core never generates SQL itself; it assembles the prompt (schema
//! rendered as markdown plus the dialect name), calls the collaborator,
//! and hands the returned SQL back to the caller to run as a raw query.

mod client;
mod types;

pub use client::{Agent, AgentBuilder};
pub use types::{ContentBlock, Message};

use anyhow::Result;
use async_trait::async_trait;

use crate::config::AgentConfig;
use crate::error::{CoreError, CoreResult};
use crate::services::database::SchemaSnapshot;

const SQL_SYSTEM_PROMPT: &str = r#"You are a SQL generation assistant. Convert the user's request into a single SQL statement for the given database.

RULES:
1. Return ONLY the SQL statement - no explanations, no markdown, no quotes
2. Use only tables and columns that appear in the provided schema
3. Match the SQL syntax of the named dialect
4. Prefer explicit column lists over SELECT *
5. If the request cannot be answered from the schema, return a SELECT that comes closest
"#;

/// Everything the collaborator needs to produce SQL.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub natural_language: String,
    pub schema_markdown: String,
    pub dialect: String,
}

/// Seam for the external text-generation collaborator.
#[async_trait]
pub trait SqlGenerator: Send + Sync {
    async fn generate_sql(&self, request: &GenerationRequest) -> CoreResult<String>;
}

#[async_trait]
impl SqlGenerator for Agent {
    async fn generate_sql(&self, request: &GenerationRequest) -> CoreResult<String> {
        let prompt = build_generation_prompt(request);
        let text = self
            .complete_text(prompt)
            .await
            .map_err(|e| CoreError::backend(format!("SQL generation failed: {}", e)))?;
        Ok(strip_sql_fences(&text))
    }
}

/// Build a SQL generation agent from configuration.
pub fn build_sql_agent(config: &AgentConfig) -> Result<Agent> {
    Agent::builder()
        .model(config.model.clone())
        .max_tokens(config.max_tokens)
        .system_prompt(SQL_SYSTEM_PROMPT.to_string())
        .build()
}

pub fn build_generation_prompt(request: &GenerationRequest) -> String {
    let mut prompt = format!(
        "Write a {} SQL statement for this request:\n{}",
        request.dialect, request.natural_language
    );

    if !request.schema_markdown.is_empty() {
        prompt.push_str("\n\nDatabase schema:\n");
        prompt.push_str(&request.schema_markdown);
    }

    prompt
}

/// Models wrap SQL in markdown fences despite instructions; strip them.
pub fn strip_sql_fences(text: &str) -> String {
    let trimmed = text.trim();
    let without_open = trimmed
        .strip_prefix("```sql")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    let without_close = without_open.strip_suffix("```").unwrap_or(without_open);
    without_close.trim().to_string()
}

/// Render a schema snapshot as markdown for model consumption.
pub fn schema_markdown(snapshot: &SchemaSnapshot) -> String {
    let mut output = String::new();

    output.push_str(&format!(
        "# Database Schema ({} tables)\n\n",
        snapshot.table_count
    ));

    for table in &snapshot.tables {
        output.push_str(&format!("## Table: {}\n", table.qualified_name()));
        output.push_str(&format!("Type: {}\n", table.table_type));
        if let Some(ref comment) = table.comment {
            output.push_str(&format!("Description: {}\n", comment));
        }
        output.push('\n');

        output.push_str("### Columns:\n");
        for column in &table.columns {
            let nullable = if column.is_nullable { "NULL" } else { "NOT NULL" };
            output.push_str(&format!(
                "- **{}**: {} {}\n",
                column.name, column.data_type, nullable
            ));
        }
        output.push('\n');

        if !table.primary_keys.is_empty() {
            output.push_str(&format!(
                "### Primary Key: {}\n\n",
                table.primary_keys.join(", ")
            ));
        }

        if !table.foreign_keys.is_empty() {
            output.push_str("### Foreign Keys:\n");
            for fk in &table.foreign_keys {
                output.push_str(&format!(
                    "- **{}** -> {}.{}\n",
                    fk.column, fk.referenced_table, fk.referenced_column
                ));
            }
            output.push('\n');
        }

        output.push_str("---\n\n");
    }

    output
}
