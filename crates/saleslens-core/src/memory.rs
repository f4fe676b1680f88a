//! In-memory backend
//!
//! Loads the full record set from a [`RecordSource`] into an immutable
//! snapshot and answers queries with a linear scan through the
//! pipeline stages.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, info};
use tokio::sync::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;

use crate::error::{QueryError, QueryResult};
use crate::model::{FilterOptions, Transaction};
use crate::pipeline;
use crate::request::{FilterCriteria, QuerySpec};
use crate::{ensure_live, QueryBackend, QueryOutcome};

// ==================== Record Sources ====================

/// Supplies the full record set for the in-memory backend
#[async_trait]
pub trait RecordSource: Send + Sync {
    /// Load every record from the source
    async fn load(&self) -> QueryResult<Vec<Transaction>>;
}

/// Shared reference to a record source
pub type SourceRef = Arc<dyn RecordSource>;

/// Reads records from a JSON file holding an array of transactions
pub struct JsonFileSource {
    path: PathBuf,
}

impl JsonFileSource {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

#[async_trait]
impl RecordSource for JsonFileSource {
    async fn load(&self) -> QueryResult<Vec<Transaction>> {
        let content = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| QueryError::Source {
                message: format!("Failed to read {}: {}", self.path.display(), e),
            })?;
        let records: Vec<Transaction> =
            serde_json::from_str(&content).map_err(|e| QueryError::Source {
                message: format!("Failed to parse {}: {}", self.path.display(), e),
            })?;
        Ok(records)
    }
}

/// Serves a fixed record set. Used in tests and demos.
pub struct StaticSource {
    records: Vec<Transaction>,
}

impl StaticSource {
    pub fn new(records: Vec<Transaction>) -> Self {
        Self { records }
    }
}

#[async_trait]
impl RecordSource for StaticSource {
    async fn load(&self) -> QueryResult<Vec<Transaction>> {
        Ok(self.records.clone())
    }
}

// ==================== Memory Backend ====================

/// Linear-scan backend over an in-memory snapshot.
///
/// Queries against an unloaded backend fail with
/// [`QueryError::NotLoaded`]; loading never happens implicitly.
pub struct MemoryBackend {
    source: SourceRef,
    snapshot: RwLock<Option<Arc<Vec<Transaction>>>>,
    load_guard: Mutex<()>,
}

impl MemoryBackend {
    pub fn new(source: SourceRef) -> Self {
        Self {
            source,
            snapshot: RwLock::new(None),
            load_guard: Mutex::new(()),
        }
    }

    /// Load the record set if not already loaded. Concurrent callers
    /// share a single load; repeat calls are no-ops.
    pub async fn load(&self) -> QueryResult<usize> {
        let _guard = self.load_guard.lock().await;
        if let Some(existing) = self.snapshot.read().await.as_ref() {
            return Ok(existing.len());
        }
        let records = self.source.load().await?;
        let count = records.len();
        *self.snapshot.write().await = Some(Arc::new(records));
        info!("Loaded {} transaction records", count);
        Ok(count)
    }

    /// Replace the snapshot with a fresh read from the source. A
    /// failed reload keeps the previous snapshot.
    pub async fn reload(&self) -> QueryResult<usize> {
        let _guard = self.load_guard.lock().await;
        let records = self.source.load().await?;
        let count = records.len();
        *self.snapshot.write().await = Some(Arc::new(records));
        info!("Reloaded {} transaction records", count);
        Ok(count)
    }

    /// Drop the snapshot, returning the backend to the unloaded state
    pub async fn clear(&self) {
        let _guard = self.load_guard.lock().await;
        *self.snapshot.write().await = None;
    }

    pub async fn is_loaded(&self) -> bool {
        self.snapshot.read().await.is_some()
    }

    async fn current(&self) -> QueryResult<Arc<Vec<Transaction>>> {
        self.snapshot
            .read()
            .await
            .as_ref()
            .cloned()
            .ok_or(QueryError::NotLoaded)
    }
}

#[async_trait]
impl QueryBackend for MemoryBackend {
    async fn execute(
        &self,
        spec: &QuerySpec,
        cancel: &CancellationToken,
    ) -> QueryResult<QueryOutcome> {
        let snapshot = self.current().await?;
        ensure_live(cancel)?;

        let rows: Vec<&Transaction> = snapshot.iter().collect();
        let rows = pipeline::search(rows, spec.term.as_deref());
        ensure_live(cancel)?;

        let mut rows = pipeline::filter(rows, &spec.filters);
        ensure_live(cancel)?;

        let stats = pipeline::aggregate(&rows);
        ensure_live(cancel)?;

        if let Some(field) = spec.sort_by {
            pipeline::sort_rows(&mut rows, field, spec.sort_order);
        }
        ensure_live(cancel)?;

        let total = rows.len();
        let window = pipeline::page_window(total, spec.page, spec.page_size);
        let items: Vec<Transaction> = rows[window.start..window.end]
            .iter()
            .map(|tx| (*tx).clone())
            .collect();
        debug!(
            "Memory scan matched {} of {} records, returning page {}",
            total,
            snapshot.len(),
            window.page
        );

        Ok(QueryOutcome {
            items,
            total_items: total as u64,
            stats,
        })
    }

    async fn filter_options(
        &self,
        term: Option<&str>,
        filters: &FilterCriteria,
        cancel: &CancellationToken,
    ) -> QueryResult<FilterOptions> {
        let snapshot = self.current().await?;
        ensure_live(cancel)?;

        let rows: Vec<&Transaction> = snapshot.iter().collect();
        let rows = pipeline::search(rows, term);
        let rows = pipeline::filter(rows, filters);
        ensure_live(cancel)?;

        Ok(pipeline::collect_options(&rows))
    }
}

// ==================== Tests ====================

#[cfg(test)]
mod tests {
    use super::*;

    struct FailingSource;

    #[async_trait]
    impl RecordSource for FailingSource {
        async fn load(&self) -> QueryResult<Vec<Transaction>> {
            Err(QueryError::Source {
                message: "unreachable source".to_string(),
            })
        }
    }

    fn sample() -> Vec<Transaction> {
        vec![
            Transaction {
                transaction_id: "TX-1".to_string(),
                customer_name: "John".to_string(),
                quantity: 5,
                ..Transaction::default()
            },
            Transaction {
                transaction_id: "TX-2".to_string(),
                customer_name: "Alice".to_string(),
                quantity: 2,
                ..Transaction::default()
            },
        ]
    }

    #[tokio::test]
    async fn test_json_file_source_reads_records() {
        let path = std::env::temp_dir().join("saleslens-source-test.json");
        std::fs::write(
            &path,
            r#"[{"transactionId": "TX-1", "customerName": "John"}]"#,
        )
        .unwrap();
        let records = JsonFileSource::new(path.clone()).load().await.unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].transaction_id, "TX-1");
    }

    #[tokio::test]
    async fn test_json_file_source_missing_file_is_source_error() {
        let path = std::env::temp_dir().join("saleslens-no-such-file.json");
        let err = JsonFileSource::new(path).load().await.unwrap_err();
        assert!(matches!(err, QueryError::Source { .. }));
    }

    #[tokio::test]
    async fn test_query_before_load_fails() {
        let backend = MemoryBackend::new(Arc::new(StaticSource::new(sample())));
        let spec = QuerySpec::from_request(&Default::default()).unwrap();
        let err = backend
            .execute(&spec, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, QueryError::NotLoaded));
    }

    #[tokio::test]
    async fn test_load_is_idempotent() {
        let backend = MemoryBackend::new(Arc::new(StaticSource::new(sample())));
        assert_eq!(backend.load().await.unwrap(), 2);
        assert_eq!(backend.load().await.unwrap(), 2);
        assert!(backend.is_loaded().await);
    }

    #[tokio::test]
    async fn test_clear_returns_to_unloaded() {
        let backend = MemoryBackend::new(Arc::new(StaticSource::new(sample())));
        backend.load().await.unwrap();
        backend.clear().await;
        assert!(!backend.is_loaded().await);
    }

    #[tokio::test]
    async fn test_failed_load_leaves_unloaded() {
        let backend = MemoryBackend::new(Arc::new(FailingSource));
        assert!(backend.load().await.is_err());
        assert!(!backend.is_loaded().await);
    }

    #[tokio::test]
    async fn test_execute_scans_snapshot() {
        let backend = MemoryBackend::new(Arc::new(StaticSource::new(sample())));
        backend.load().await.unwrap();
        let spec = QuerySpec::from_request(&Default::default()).unwrap();
        let outcome = backend
            .execute(&spec, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(outcome.total_items, 2);
        assert_eq!(outcome.stats.total_units, 7);
    }

    #[tokio::test]
    async fn test_cancelled_token_aborts() {
        let backend = MemoryBackend::new(Arc::new(StaticSource::new(sample())));
        backend.load().await.unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let spec = QuerySpec::from_request(&Default::default()).unwrap();
        let err = backend.execute(&spec, &cancel).await.unwrap_err();
        assert!(matches!(err, QueryError::Cancelled));
    }
}
