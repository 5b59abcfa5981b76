//! Permission-gated execution gateway.
//!
//! Resolves raw or template requests, classifies the statement's effect,
//! checks the permission mode before any backend work, and dispatches
//! through the dialect adapter with wall-clock timing. Query-execution
//! failures never escape as errors; they come back as a result with the
//! error fields set and zero rows.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::{CoreError, CoreResult};
use crate::services::storage::QueryHistoryRepository;

use super::adapter::DialectAdapter;
use super::permission::{PermissionMode, PermissionStore};
use super::template::resolve_template;
use super::types::{ParamValue, QueryRequest, QueryResult, StatementEffect};

pub struct ExecutionGateway {
    adapter: Arc<dyn DialectAdapter>,
    permissions: Arc<PermissionStore>,
    history: Option<QueryHistoryRepository>,
    statement_timeout: Option<Duration>,
}

impl ExecutionGateway {
    pub fn new(adapter: Arc<dyn DialectAdapter>, permissions: Arc<PermissionStore>) -> Self {
        Self {
            adapter,
            permissions,
            history: None,
            statement_timeout: None,
        }
    }

    pub fn with_statement_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.statement_timeout = timeout;
        self
    }

    pub fn with_history(mut self, history: QueryHistoryRepository) -> Self {
        self.history = Some(history);
        self
    }

    /// Run one request to completion and report the structured result.
    pub async fn execute(&self, request: QueryRequest) -> QueryResult {
        let started = Instant::now();

        let (sql, values) = match resolve_request(&request) {
            Ok(resolved) => resolved,
            Err(e) => return QueryResult::failure(e.to_string(), elapsed_ms(started)),
        };

        let sql = sql.trim();
        if sql.is_empty() {
            return QueryResult::failure("Empty query", elapsed_ms(started));
        }

        let effect = classify_statement(sql);
        // Mode observed once; a concurrent flip does not land mid-request
        let mode = self.permissions.get();
        if mode == PermissionMode::ReadOnly && effect == StatementEffect::Write {
            let error =
                CoreError::permission("write statement rejected while in READ_ONLY mode");
            let result = QueryResult::failure(error.to_string(), elapsed_ms(started));
            self.record(sql, &result).await;
            return result;
        }

        let outcome = self
            .adapter
            .execute(sql, &values, effect, self.statement_timeout)
            .await;
        let elapsed = elapsed_ms(started);

        let result = match outcome {
            Ok(output) => QueryResult::success(output, elapsed),
            Err(e) => {
                tracing::error!("Query failed: {}", e);
                QueryResult::failure(e.to_string(), elapsed)
            }
        };

        self.record(sql, &result).await;
        result
    }

    async fn record(&self, sql: &str, result: &QueryResult) {
        if let Some(history) = &self.history {
            let row_count = result.is_ok().then_some(result.row_count as i64);
            if let Err(e) = history
                .record(
                    sql,
                    self.adapter.dialect().as_str(),
                    result.total_time_ms as i64,
                    row_count,
                    result.is_ok(),
                    result.error.as_deref(),
                )
                .await
            {
                tracing::warn!("Failed to record query history: {}", e);
            }
        }
    }
}

fn resolve_request(request: &QueryRequest) -> CoreResult<(String, Vec<ParamValue>)> {
    match request {
        QueryRequest::Raw(sql) => Ok((sql.clone(), Vec::new())),
        QueryRequest::Template {
            template,
            parameters,
        } => {
            let values = resolve_template(template, parameters)?;
            Ok((template.clone(), values))
        }
    }
}

/// Classify a statement's effect by its leading verb.
///
/// Unknown verbs classify as writes so the READ_ONLY gate fails safe.
pub fn classify_statement(sql: &str) -> StatementEffect {
    match leading_word(sql).to_ascii_lowercase().as_str() {
        "select" | "with" | "show" | "explain" | "values" | "pragma" => StatementEffect::Read,
        _ => StatementEffect::Write,
    }
}

/// First word of the statement, skipping leading whitespace and comments.
fn leading_word(sql: &str) -> &str {
    let mut rest = sql.trim_start();
    loop {
        if let Some(stripped) = rest.strip_prefix("--") {
            rest = stripped
                .split_once('\n')
                .map(|(_, tail)| tail)
                .unwrap_or("")
                .trim_start();
        } else if let Some(stripped) = rest.strip_prefix("/*") {
            rest = stripped
                .split_once("*/")
                .map(|(_, tail)| tail)
                .unwrap_or("")
                .trim_start();
        } else {
            break;
        }
    }
    let end = rest
        .find(|c: char| !c.is_ascii_alphanumeric() && c != '_')
        .unwrap_or(rest.len());
    &rest[..end]
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::database::adapter::Dialect;
    use crate::services::database::types::{NamedParam, StatementOutput, TableMeta};
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Debug, Clone)]
    struct RecordedCall {
        sql: String,
        params: Vec<ParamValue>,
        effect: StatementEffect,
    }

    /// Adapter double that records calls and replays a canned response.
    struct SpyAdapter {
        calls: Mutex<Vec<RecordedCall>>,
        response: Mutex<CoreResult<StatementOutput>>,
    }

    impl SpyAdapter {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                calls: Mutex::new(Vec::new()),
                response: Mutex::new(Ok(StatementOutput::default())),
            })
        }

        fn with_response(response: CoreResult<StatementOutput>) -> Arc<Self> {
            let spy = Self::new();
            *spy.response.lock().unwrap() = response;
            spy
        }

        fn calls(&self) -> Vec<RecordedCall> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl DialectAdapter for SpyAdapter {
        fn dialect(&self) -> Dialect {
            Dialect::Sqlite
        }

        async fn ping(&self) -> CoreResult<()> {
            Ok(())
        }

        async fn introspect(&self) -> CoreResult<Vec<TableMeta>> {
            Ok(Vec::new())
        }

        async fn execute(
            &self,
            sql: &str,
            params: &[ParamValue],
            effect: StatementEffect,
            _timeout: Option<Duration>,
        ) -> CoreResult<StatementOutput> {
            self.calls.lock().unwrap().push(RecordedCall {
                sql: sql.to_string(),
                params: params.to_vec(),
                effect,
            });
            self.response.lock().unwrap().clone()
        }
    }

    fn gateway(adapter: Arc<SpyAdapter>, mode: PermissionMode) -> ExecutionGateway {
        ExecutionGateway::new(adapter, Arc::new(PermissionStore::new(mode)))
    }

    #[test]
    fn test_classify_reads_and_writes() {
        assert_eq!(classify_statement("SELECT 1"), StatementEffect::Read);
        assert_eq!(
            classify_statement("  with x as (select 1) select * from x"),
            StatementEffect::Read
        );
        assert_eq!(
            classify_statement("-- note\nEXPLAIN SELECT 1"),
            StatementEffect::Read
        );
        assert_eq!(
            classify_statement("/* hint */ DELETE FROM t"),
            StatementEffect::Write
        );
        assert_eq!(classify_statement("INSERT INTO t VALUES (1)"), StatementEffect::Write);
        assert_eq!(classify_statement("DROP TABLE t"), StatementEffect::Write);
        assert_eq!(classify_statement("frobnicate"), StatementEffect::Write);
    }

    #[async_std::test]
    async fn test_read_only_blocks_write_before_dispatch() {
        let spy = SpyAdapter::new();
        let gateway = gateway(spy.clone(), PermissionMode::ReadOnly);

        let result = gateway
            .execute(QueryRequest::Raw("DELETE FROM t".to_string()))
            .await;

        assert_eq!(result.errors_count, 1);
        assert!(result.rows.is_empty());
        assert!(result.error.as_deref().unwrap().contains("READ_ONLY"));
        assert!(spy.calls().is_empty());
    }

    #[async_std::test]
    async fn test_read_allowed_under_read_only() {
        let spy = SpyAdapter::new();
        let gateway = gateway(spy.clone(), PermissionMode::ReadOnly);

        let result = gateway
            .execute(QueryRequest::Raw("SELECT * FROM t".to_string()))
            .await;

        assert!(result.is_ok());
        assert_eq!(spy.calls().len(), 1);
        assert_eq!(spy.calls()[0].effect, StatementEffect::Read);
    }

    #[async_std::test]
    async fn test_mode_flip_enables_writes() {
        let spy = SpyAdapter::new();
        let permissions = Arc::new(PermissionStore::new(PermissionMode::ReadOnly));
        let gateway = ExecutionGateway::new(spy.clone(), permissions.clone());

        let denied = gateway
            .execute(QueryRequest::Raw("UPDATE t SET x = 1".to_string()))
            .await;
        assert_eq!(denied.errors_count, 1);

        permissions.set(PermissionMode::ReadWrite);
        let allowed = gateway
            .execute(QueryRequest::Raw("UPDATE t SET x = 1".to_string()))
            .await;
        assert_eq!(allowed.errors_count, 0);
        assert_eq!(spy.calls().len(), 1);
        assert_eq!(spy.calls()[0].effect, StatementEffect::Write);
    }

    #[async_std::test]
    async fn test_template_binds_values_without_interpolation() {
        let spy = SpyAdapter::new();
        let gateway = gateway(spy.clone(), PermissionMode::ReadOnly);

        gateway
            .execute(QueryRequest::Template {
                template: "SELECT * FROM t WHERE id = :id".to_string(),
                parameters: vec![NamedParam::new("id", ParamValue::Int(5))],
            })
            .await;

        let calls = spy.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].params, vec![ParamValue::Int(5)]);
        // The bound value never appears in the SQL text
        assert!(calls[0].sql.contains(":id"));
        assert!(!calls[0].sql.contains('5'));
    }

    #[async_std::test]
    async fn test_template_parameter_mismatch_is_error_result() {
        let spy = SpyAdapter::new();
        let gateway = gateway(spy.clone(), PermissionMode::ReadWrite);

        let result = gateway
            .execute(QueryRequest::Template {
                template: "SELECT * FROM t WHERE id = :id".to_string(),
                parameters: vec![],
            })
            .await;

        assert_eq!(result.errors_count, 1);
        assert!(result.error.as_deref().unwrap().contains("validation"));
        assert!(spy.calls().is_empty());
    }

    #[async_std::test]
    async fn test_backend_failure_folds_into_result() {
        let spy = SpyAdapter::with_response(Err(CoreError::backend("syntax error near FORM")));
        let gateway = gateway(spy.clone(), PermissionMode::ReadOnly);

        let result = gateway
            .execute(QueryRequest::Raw("SELECT * FORM t".to_string()))
            .await;

        assert_eq!(result.errors_count, 1);
        assert_eq!(result.row_count, 0);
        assert!(result.rows.is_empty());
        assert!(result.error.as_deref().unwrap().contains("syntax error"));
    }

    #[async_std::test]
    async fn test_cancelled_execution_reports_cancelled() {
        let spy = SpyAdapter::with_response(Err(CoreError::cancelled("statement exceeded 100ms")));
        let gateway = gateway(spy.clone(), PermissionMode::ReadOnly);

        let result = gateway
            .execute(QueryRequest::Raw("SELECT pg_sleep(60)".to_string()))
            .await;

        assert_eq!(result.errors_count, 1);
        assert!(result.error.as_deref().unwrap().contains("cancelled"));
    }

    #[async_std::test]
    async fn test_empty_query_is_rejected() {
        let spy = SpyAdapter::new();
        let gateway = gateway(spy.clone(), PermissionMode::ReadWrite);

        let result = gateway.execute(QueryRequest::Raw("   ".to_string())).await;

        assert_eq!(result.errors_count, 1);
        assert!(spy.calls().is_empty());
    }
}
