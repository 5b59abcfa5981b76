//! Transport boundary facade.
//!
//! [`QueryCore`] wires configuration, dialect adapter, schema cache,
//! permission store, completion engine, and the NL-to-SQL collaborator
//! into the operation set consumed by the GraphQL/UI layer.

use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use crate::config::CoreConfig;
use crate::error::{CoreError, CoreResult};
use crate::services::agent::{self, GenerationRequest, SqlGenerator};
use crate::services::completion::{CompletionEngine, Suggestion};
use crate::services::database::{
    self, DialectAdapter, ExecutionGateway, NamedParam, PermissionMode, PermissionStore,
    QueryRequest, QueryResult, SchemaHeader, TableMeta, TableSample,
};
use crate::services::export;
use crate::services::schema_cache::SchemaCache;
use crate::services::sql::{self, StatementLocator, StatementSpan};
use crate::services::storage::{HistoryStore, QueryHistoryEntry};

const SAMPLE_ROW_LIMIT: usize = 5;

/// SQL produced by the external text-generation collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedSql {
    pub sql: String,
}

pub struct QueryCore {
    adapter: Arc<dyn DialectAdapter>,
    cache: Arc<SchemaCache>,
    permissions: Arc<PermissionStore>,
    gateway: ExecutionGateway,
    engine: CompletionEngine,
    locator: Mutex<StatementLocator>,
    generator: Option<Arc<dyn SqlGenerator>>,
    history: Option<HistoryStore>,
}

impl QueryCore {
    /// Connect to the configured backend and assemble the core.
    pub async fn connect(config: &CoreConfig) -> CoreResult<Self> {
        let adapter = database::connect(config).await?;

        let history = match &config.history_path {
            Some(path) => HistoryStore::open(path).await,
            None => HistoryStore::open_default().await,
        };
        let history = match history {
            Ok(store) => Some(store),
            Err(e) => {
                tracing::warn!("Query history disabled: {}", e);
                None
            }
        };

        let generator = match &config.agent {
            Some(agent_config) => match agent::build_sql_agent(agent_config) {
                Ok(agent) => Some(Arc::new(agent) as Arc<dyn SqlGenerator>),
                Err(e) => {
                    tracing::warn!("SQL generation disabled: {}", e);
                    None
                }
            },
            None => None,
        };

        Ok(Self::assemble(config, adapter, history, generator))
    }

    /// Assemble around an existing adapter without connecting. Used by the
    /// transport layer's tests and anywhere a live backend is unwanted.
    pub fn with_adapter(config: &CoreConfig, adapter: Arc<dyn DialectAdapter>) -> Self {
        Self::assemble(config, adapter, None, None)
    }

    pub fn with_generator(mut self, generator: Arc<dyn SqlGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    fn assemble(
        config: &CoreConfig,
        adapter: Arc<dyn DialectAdapter>,
        history: Option<HistoryStore>,
        generator: Option<Arc<dyn SqlGenerator>>,
    ) -> Self {
        let permissions = Arc::new(PermissionStore::new(config.initial_permission_mode));
        let cache = Arc::new(SchemaCache::new(adapter.clone()));

        let mut gateway = ExecutionGateway::new(adapter.clone(), permissions.clone())
            .with_statement_timeout(config.statement_timeout());
        if let Some(store) = &history {
            gateway = gateway.with_history(store.history());
        }

        Self {
            adapter,
            cache,
            permissions,
            gateway,
            engine: CompletionEngine::new(),
            locator: Mutex::new(StatementLocator::new()),
            generator,
            history,
        }
    }

    // ========== Query execution ==========

    pub async fn run_query(&self, query: &str) -> QueryResult {
        self.gateway
            .execute(QueryRequest::Raw(query.to_string()))
            .await
    }

    pub async fn run_template_query(
        &self,
        template: &str,
        parameters: Vec<NamedParam>,
    ) -> QueryResult {
        self.gateway
            .execute(QueryRequest::Template {
                template: template.to_string(),
                parameters,
            })
            .await
    }

    // ========== Permission mode ==========

    /// Set the process-wide permission mode from its wire string.
    pub fn update_permission_mode(&self, mode: &str) -> CoreResult<bool> {
        let parsed = PermissionMode::parse(mode)?;
        self.permissions.set(parsed);
        Ok(true)
    }

    pub fn permission_mode(&self) -> PermissionMode {
        self.permissions.get()
    }

    // ========== Schema ==========

    pub fn invalidate_schema_cache(&self) -> bool {
        self.cache.invalidate();
        true
    }

    pub async fn schema_version(&self) -> CoreResult<SchemaHeader> {
        self.cache.header().await
    }

    /// Browse the schema with live sample rows per table.
    pub async fn schema_with_data(
        &self,
        table_search: Option<&str>,
        column_search: Option<&str>,
        limit: Option<usize>,
    ) -> CoreResult<Vec<TableSample>> {
        let snapshot = self.cache.read().await?;

        let tables: Vec<TableMeta> = snapshot
            .tables
            .iter()
            .filter(|t| matches_search(&t.name, table_search))
            .filter(|t| {
                column_search
                    .is_none_or(|needle| t.columns.iter().any(|c| contains_ci(&c.name, needle)))
            })
            .take(limit.unwrap_or(usize::MAX))
            .cloned()
            .collect();

        let samples = futures::future::join_all(tables.into_iter().map(|table| async move {
            let sql = format!(
                "SELECT * FROM {} LIMIT {}",
                self.quoted_table(&table),
                SAMPLE_ROW_LIMIT
            );
            let result = self.gateway.execute(QueryRequest::Raw(sql)).await;
            let sample_rows = if result.is_ok() {
                result.rows
            } else {
                tracing::debug!(
                    "Sampling {} failed: {}",
                    table.qualified_name(),
                    result.error.as_deref().unwrap_or("unknown")
                );
                Vec::new()
            };
            TableSample { table, sample_rows }
        }))
        .await;

        Ok(samples)
    }

    fn quoted_table(&self, table: &TableMeta) -> String {
        let dialect = self.adapter.dialect();
        if table.schema.is_empty() {
            dialect.quote_ident(&table.name)
        } else {
            format!(
                "{}.{}",
                dialect.quote_ident(&table.schema),
                dialect.quote_ident(&table.name)
            )
        }
    }

    // ========== Completion ==========

    /// Complete at the cursor from cached schema state only; never touches
    /// the backend.
    pub fn complete(&self, text: &str, cursor_offset: usize) -> Vec<Suggestion> {
        let snapshot = self.cache.peek();
        self.engine.complete(text, cursor_offset, snapshot.as_deref())
    }

    // ========== Natural language ==========

    pub async fn generate_sql_from_natural_language(
        &self,
        natural_language: &str,
    ) -> CoreResult<GeneratedSql> {
        let generator = self
            .generator
            .as_ref()
            .ok_or_else(|| CoreError::validation("No SQL generation agent is configured"))?;

        let snapshot = self.cache.read().await?;
        let request = GenerationRequest {
            natural_language: natural_language.to_string(),
            schema_markdown: agent::schema_markdown(&snapshot),
            dialect: self.adapter.dialect().as_str().to_string(),
        };

        let sql = generator.generate_sql(&request).await?;
        Ok(GeneratedSql { sql })
    }

    // ========== Editor support ==========

    pub fn format_sql(&self, sql: &str) -> String {
        sql::format_sql(sql)
    }

    pub fn statement_ranges(&self, text: &str) -> Vec<StatementSpan> {
        self.locator.lock().unwrap().locate(text)
    }

    // ========== Export and history ==========

    pub fn export_csv(&self, result: &QueryResult) -> CoreResult<String> {
        export::export_to_csv(result).map_err(|e| CoreError::backend(format!("CSV export failed: {}", e)))
    }

    pub fn export_json(&self, result: &QueryResult) -> CoreResult<String> {
        export::export_to_json(result)
            .map_err(|e| CoreError::backend(format!("JSON export failed: {}", e)))
    }

    pub async fn recent_history(&self, limit: u32) -> CoreResult<Vec<QueryHistoryEntry>> {
        match &self.history {
            Some(store) => store
                .history()
                .recent(limit)
                .await
                .map_err(|e| CoreError::backend(e.to_string())),
            None => Ok(Vec::new()),
        }
    }
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

fn matches_search(name: &str, search: Option<&str>) -> bool {
    search.is_none_or(|needle| contains_ci(name, needle))
}
