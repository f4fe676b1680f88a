//! Core transaction query engine for saleslens
//!
//! This crate provides the query pipeline (search, filter, aggregate,
//! sort, paginate), the backend abstraction, and the in-memory
//! linear-scan backend. Any backend implementing [`QueryBackend`]
//! must produce results indistinguishable from the linear scan.

pub mod error;
pub mod memory;
pub mod model;
pub mod pipeline;
pub mod request;

use std::sync::Arc;

use async_trait::async_trait;
use log::debug;
use tokio_util::sync::CancellationToken;

pub use error::{ErrorCode, ErrorSeverity, QueryError, QueryResult, Violation};
pub use model::{
    AgeSpan, AggregateStats, FilterOptions, PageResult, Pagination, Transaction,
};
pub use request::{
    AgeRange, DateRange, FilterCriteria, FilterOptionsRequest, QueryRequest, QuerySpec,
    SortField, SortOrder, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE, MAX_SEARCH_LEN,
};

// ==================== Backend Abstraction ====================

/// Raw result of a backend query, before pagination metadata is
/// assembled
#[derive(Debug, Clone, PartialEq)]
pub struct QueryOutcome {
    /// Records on the requested page, in final order
    pub items: Vec<Transaction>,
    /// Total matching records before pagination
    pub total_items: u64,
    /// Aggregate statistics over all matching records
    pub stats: AggregateStats,
}

/// A query backend. Implementations must agree on observable output:
/// the same request against the same record set yields identical
/// items, totals, and statistics.
#[async_trait]
pub trait QueryBackend: Send + Sync {
    /// Execute a validated query
    async fn execute(
        &self,
        spec: &QuerySpec,
        cancel: &CancellationToken,
    ) -> QueryResult<QueryOutcome>;

    /// List distinct filterable values for the record set restricted
    /// by `term` and `filters`
    async fn filter_options(
        &self,
        term: Option<&str>,
        filters: &FilterCriteria,
        cancel: &CancellationToken,
    ) -> QueryResult<FilterOptions>;
}

/// Shared reference to a query backend
pub type BackendRef = Arc<dyn QueryBackend>;

/// Fail fast when the token has been cancelled
pub fn ensure_live(cancel: &CancellationToken) -> QueryResult<()> {
    if cancel.is_cancelled() {
        return Err(QueryError::Cancelled);
    }
    Ok(())
}

// ==================== Query Engine ====================

/// Front door for queries. Validates requests, dispatches to the
/// configured backend, and assembles the final page result.
pub struct QueryEngine {
    backend: BackendRef,
}

impl QueryEngine {
    pub fn new(backend: BackendRef) -> Self {
        Self { backend }
    }

    /// Run a query without external cancellation
    pub async fn query(&self, request: &QueryRequest) -> QueryResult<PageResult> {
        self.query_with_cancel(request, &CancellationToken::new())
            .await
    }

    /// Run a query, aborting early if `cancel` fires
    pub async fn query_with_cancel(
        &self,
        request: &QueryRequest,
        cancel: &CancellationToken,
    ) -> QueryResult<PageResult> {
        let spec = QuerySpec::from_request(request)?;
        debug!(
            "Executing query: term={:?} sort={:?} page={}/{}",
            spec.term, spec.sort_by, spec.page, spec.page_size
        );
        let outcome = self.backend.execute(&spec, cancel).await?;

        let window = pipeline::page_window(outcome.total_items as usize, spec.page, spec.page_size);
        let pagination = pipeline::pagination_meta(&window, outcome.total_items as usize);
        Ok(PageResult {
            items: outcome.items,
            pagination,
            aggregate_stats: outcome.stats,
        })
    }

    /// List distinct filterable values for the restricted record set
    pub async fn filter_options(
        &self,
        request: &FilterOptionsRequest,
        cancel: &CancellationToken,
    ) -> QueryResult<FilterOptions> {
        // run the same validation the query path uses on the shared fields
        let spec = QuerySpec::from_request(&QueryRequest {
            search: request.search.clone(),
            filters: request.filters.clone(),
            ..QueryRequest::default()
        })?;
        self.backend
            .filter_options(spec.term.as_deref(), &spec.filters, cancel)
            .await
    }
}

// ==================== Tests ====================
