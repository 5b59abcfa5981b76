//! Versioned cache of the introspected database structure.
//!
//! Owns the current [`SchemaSnapshot`]. Snapshots are immutable once
//! published and handed out as `Arc`s, so readers always see a consistent
//! whole. `invalidate()` is non-blocking and always wins: once it returns,
//! no reader observes the pre-invalidate snapshot, and a rebuild that was
//! already in flight is discarded and re-run.

use std::sync::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;

use crate::error::CoreResult;
use crate::services::database::{DialectAdapter, SchemaHeader, SchemaSnapshot};

pub struct SchemaCache {
    adapter: Arc<dyn DialectAdapter>,
    /// Published snapshot; cleared by `invalidate`
    slot: Mutex<Option<Arc<SchemaSnapshot>>>,
    /// Serializes introspection: at most one rebuild per cache generation
    build_lock: async_lock::Mutex<()>,
    version: AtomicU64,
    epoch: AtomicU64,
}

impl SchemaCache {
    pub fn new(adapter: Arc<dyn DialectAdapter>) -> Self {
        Self {
            adapter,
            slot: Mutex::new(None),
            build_lock: async_lock::Mutex::new(()),
            version: AtomicU64::new(0),
            epoch: AtomicU64::new(0),
        }
    }

    /// Current snapshot, introspecting the backend if none is published.
    pub async fn read(&self) -> CoreResult<Arc<SchemaSnapshot>> {
        if let Some(snapshot) = self.peek() {
            return Ok(snapshot);
        }

        let _build = self.build_lock.lock().await;
        loop {
            // Another caller may have published while we waited for the lock
            if let Some(snapshot) = self.peek() {
                return Ok(snapshot);
            }

            let epoch = self.epoch.load(Ordering::SeqCst);
            let tables = self.adapter.introspect().await?;

            let mut slot = self.slot.lock().unwrap();
            if self.epoch.load(Ordering::SeqCst) == epoch {
                let snapshot = Arc::new(SchemaSnapshot {
                    version: self.version.fetch_add(1, Ordering::SeqCst) + 1,
                    last_modified: Utc::now(),
                    table_count: tables.len(),
                    tables,
                });
                *slot = Some(snapshot.clone());
                tracing::debug!(
                    "Published schema snapshot v{} ({} tables)",
                    snapshot.version,
                    snapshot.table_count
                );
                return Ok(snapshot);
            }
            // Invalidated while introspecting; the result is stale, rebuild
            drop(slot);
        }
    }

    /// Published snapshot without triggering introspection. The completion
    /// path uses this so it never blocks on the backend.
    pub fn peek(&self) -> Option<Arc<SchemaSnapshot>> {
        self.slot.lock().unwrap().clone()
    }

    /// Discard the current snapshot. The next `read()` rebuilds.
    pub fn invalidate(&self) {
        self.epoch.fetch_add(1, Ordering::SeqCst);
        self.slot.lock().unwrap().take();
        tracing::info!("Schema cache invalidated");
    }

    /// Header of the current snapshot, building it if necessary.
    pub async fn header(&self) -> CoreResult<SchemaHeader> {
        Ok(self.read().await?.header())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoreError;
    use crate::services::database::adapter::Dialect;
    use crate::services::database::types::{
        ParamValue, StatementEffect, StatementOutput, TableMeta,
    };
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    struct FixtureAdapter {
        introspect_calls: AtomicUsize,
        fail_remaining: AtomicUsize,
        delay: Option<Duration>,
    }

    impl FixtureAdapter {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                introspect_calls: AtomicUsize::new(0),
                fail_remaining: AtomicUsize::new(0),
                delay: None,
            })
        }

        fn failing_once() -> Arc<Self> {
            let adapter = Self::new();
            adapter.fail_remaining.store(1, Ordering::SeqCst);
            adapter
        }

        fn slow(delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                introspect_calls: AtomicUsize::new(0),
                fail_remaining: AtomicUsize::new(0),
                delay: Some(delay),
            })
        }

        fn calls(&self) -> usize {
            self.introspect_calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl DialectAdapter for FixtureAdapter {
        fn dialect(&self) -> Dialect {
            Dialect::Sqlite
        }

        async fn ping(&self) -> CoreResult<()> {
            Ok(())
        }

        async fn introspect(&self) -> CoreResult<Vec<TableMeta>> {
            self.introspect_calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                async_std::task::sleep(delay).await;
            }
            if self
                .fail_remaining
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
            {
                return Err(CoreError::backend("introspection unavailable"));
            }
            Ok(vec![TableMeta {
                catalog: None,
                schema: "main".to_string(),
                name: "users".to_string(),
                table_type: "BASE TABLE".to_string(),
                comment: None,
                columns: vec![],
                primary_keys: vec![],
                foreign_keys: vec![],
            }])
        }

        async fn execute(
            &self,
            _sql: &str,
            _params: &[ParamValue],
            _effect: StatementEffect,
            _timeout: Option<Duration>,
        ) -> CoreResult<StatementOutput> {
            Ok(StatementOutput::default())
        }
    }

    #[async_std::test]
    async fn test_read_is_idempotent_without_invalidation() {
        let adapter = FixtureAdapter::new();
        let cache = SchemaCache::new(adapter.clone());

        let first = cache.read().await.unwrap();
        let second = cache.read().await.unwrap();

        assert_eq!(first.version, second.version);
        assert_eq!(first.table_count, second.table_count);
        assert_eq!(adapter.calls(), 1);
    }

    #[async_std::test]
    async fn test_invalidate_bumps_version_on_next_read() {
        let adapter = FixtureAdapter::new();
        let cache = SchemaCache::new(adapter.clone());

        let before = cache.read().await.unwrap();
        cache.invalidate();
        assert!(cache.peek().is_none());

        let after = cache.read().await.unwrap();
        assert!(after.version > before.version);
        assert_eq!(adapter.calls(), 2);
    }

    #[async_std::test]
    async fn test_introspection_failure_propagates_then_retries() {
        let adapter = FixtureAdapter::failing_once();
        let cache = SchemaCache::new(adapter.clone());

        let err = cache.read().await.unwrap_err();
        assert!(matches!(err, CoreError::Backend(_)));

        let snapshot = cache.read().await.unwrap();
        assert_eq!(snapshot.table_count, 1);
    }

    #[async_std::test]
    async fn test_concurrent_reads_share_one_introspection() {
        let adapter = FixtureAdapter::slow(Duration::from_millis(50));
        let cache = Arc::new(SchemaCache::new(adapter.clone()));

        let a = {
            let cache = cache.clone();
            async_std::task::spawn(async move { cache.read().await })
        };
        let b = {
            let cache = cache.clone();
            async_std::task::spawn(async move { cache.read().await })
        };

        let (a, b) = (a.await.unwrap(), b.await.unwrap());
        assert_eq!(a.version, b.version);
        assert_eq!(adapter.calls(), 1);
    }

    #[async_std::test]
    async fn test_header_matches_snapshot() {
        let adapter = FixtureAdapter::new();
        let cache = SchemaCache::new(adapter);

        let snapshot = cache.read().await.unwrap();
        let header = cache.header().await.unwrap();
        assert_eq!(header.version, snapshot.version);
        assert_eq!(header.table_count, snapshot.table_count);
    }
}
