//! Indexed transaction store backend for saleslens
//!
//! Builds per-field indexes over the record set at load time and
//! answers each request with a single store query: probe the most
//! selective index for candidates, re-check the full predicate, then
//! sort and window the match set with the same comparator and page
//! arithmetic the linear scan uses.

pub mod error;
pub mod index;
pub mod query;

use std::sync::Arc;

use async_trait::async_trait;
use log::debug;
use tokio_util::sync::CancellationToken;

use saleslens_core::model::{AggregateStats, FilterOptions, Transaction};
use saleslens_core::{
    ensure_live, pipeline, FilterCriteria, QueryBackend, QueryOutcome, QueryResult, QuerySpec,
};

pub use error::{StoreError, StoreResult};
pub use index::{IndexKey, IndexTree, RowId};
pub use query::{Field, StoreQuery, MEMBER_FIELDS};

/// Rows scanned between cancellation checks
const CANCEL_CHECK_INTERVAL: usize = 1024;

// ==================== Transaction Store ====================

/// An immutable, fully-indexed record collection
pub struct TransactionStore {
    rows: Vec<Transaction>,
    /// Precomputed lowercase customer names, aligned with `rows`
    lowered_names: Vec<String>,
    region_idx: IndexTree,
    gender_idx: IndexTree,
    category_idx: IndexTree,
    payment_idx: IndexTree,
    /// Multi-entry: one posting per tag per row
    tags_idx: IndexTree,
    age_idx: IndexTree,
    date_idx: IndexTree,
}

impl TransactionStore {
    /// Index a record set. Row ids are positions in the input vector,
    /// so index postings inherit source order.
    pub fn build(rows: Vec<Transaction>) -> Self {
        let mut store = Self {
            lowered_names: rows.iter().map(|tx| tx.customer_name.to_lowercase()).collect(),
            rows,
            region_idx: IndexTree::new(),
            gender_idx: IndexTree::new(),
            category_idx: IndexTree::new(),
            payment_idx: IndexTree::new(),
            tags_idx: IndexTree::new(),
            age_idx: IndexTree::new(),
            date_idx: IndexTree::new(),
        };
        for (row, tx) in store.rows.iter().enumerate() {
            store
                .region_idx
                .insert(IndexKey::from_str_key(&tx.customer_region), row);
            store
                .gender_idx
                .insert(IndexKey::from_str_key(&tx.gender), row);
            store
                .category_idx
                .insert(IndexKey::from_str_key(&tx.product_category), row);
            store
                .payment_idx
                .insert(IndexKey::from_str_key(&tx.payment_method), row);
            for tag in &tx.tags {
                store.tags_idx.insert(IndexKey::from_str_key(tag), row);
            }
            if let Some(age) = tx.age {
                store.age_idx.insert(IndexKey::from_age(age), row);
            }
            store.date_idx.insert(IndexKey::from_date(tx.date), row);
        }
        store
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn member_index(&self, field: Field) -> &IndexTree {
        match field {
            Field::CustomerRegion => &self.region_idx,
            Field::Gender => &self.gender_idx,
            Field::ProductCategory => &self.category_idx,
            Field::PaymentMethod => &self.payment_idx,
        }
    }

    /// Union of postings for several keys in one index, sorted and
    /// deduplicated
    fn union_lookup(tree: &IndexTree, keys: impl Iterator<Item = IndexKey>) -> Vec<RowId> {
        let mut rows: Vec<RowId> = keys.flat_map(|k| tree.lookup_eq(&k)).collect();
        rows.sort_unstable();
        rows.dedup();
        rows
    }

    /// Candidate rows from the best single index probe. `None` means
    /// no usable index, fall back to a full scan.
    fn candidates(&self, query: &StoreQuery) -> Option<Vec<RowId>> {
        if let Some((field, accepted)) = query.member_of.first() {
            let tree = self.member_index(*field);
            return Some(Self::union_lookup(
                tree,
                accepted.iter().map(IndexKey::from_str_key),
            ));
        }
        if !query.tags_any.is_empty() {
            return Some(Self::union_lookup(
                &self.tags_idx,
                query.tags_any.iter().map(IndexKey::from_str_key),
            ));
        }
        if let Some((start, end)) = query.date {
            return Some(self.date_idx.lookup_range(
                start.map(IndexKey::from_date).as_ref(),
                end.map(IndexKey::from_date).as_ref(),
            ));
        }
        if let Some((min, max)) = query.age {
            return Some(self.age_idx.lookup_range(
                min.map(IndexKey::from_age).as_ref(),
                max.map(IndexKey::from_age).as_ref(),
            ));
        }
        None
    }

    /// All rows matching the query, in ascending row order
    pub fn find(&self, query: &StoreQuery, cancel: &CancellationToken) -> StoreResult<Vec<RowId>> {
        let candidates = self.candidates(query);
        let used_index = candidates.is_some();
        let candidates = candidates.unwrap_or_else(|| (0..self.rows.len()).collect());
        debug!(
            "Store scan: {} candidates of {} rows (indexed: {})",
            candidates.len(),
            self.rows.len(),
            used_index
        );

        let mut hits = Vec::new();
        for (scanned, row) in candidates.into_iter().enumerate() {
            if scanned % CANCEL_CHECK_INTERVAL == 0 && cancel.is_cancelled() {
                return Err(StoreError::Cancelled);
            }
            let tx = self.rows.get(row).ok_or_else(|| StoreError::Corrupted {
                message: format!("index points at row {} but store has {} rows", row, self.rows.len()),
            })?;
            if query.matches(tx, &self.lowered_names[row]) {
                hits.push(row);
            }
        }
        Ok(hits)
    }

    /// Aggregate statistics over a set of row ids
    pub fn aggregate(&self, ids: &[RowId]) -> AggregateStats {
        let mut stats = AggregateStats::default();
        for &row in ids {
            let tx = &self.rows[row];
            stats.total_units += u64::from(tx.quantity);
            stats.total_amount += tx.gross_amount();
            stats.total_discount += tx.discount();
            stats.record_count += 1;
        }
        stats
    }

    /// Sort a match set and materialize the `[start, end)` window.
    /// Ascending row ids act as the tiebreak because the sort is
    /// stable, matching the linear scan's source-order ties.
    pub fn page_of_ids(&self, ids: &[RowId], query: &StoreQuery, start: usize, end: usize) -> Vec<Transaction> {
        let mut ordered: Vec<RowId> = ids.to_vec();
        if let Some(field) = query.sort_by {
            match query.sort_order {
                saleslens_core::SortOrder::Asc => {
                    ordered.sort_by(|&a, &b| pipeline::compare(field, &self.rows[a], &self.rows[b]))
                }
                saleslens_core::SortOrder::Desc => ordered.sort_by(|&a, &b| {
                    pipeline::compare(field, &self.rows[a], &self.rows[b]).reverse()
                }),
            }
        }
        ordered[start.min(ordered.len())..end.min(ordered.len())]
            .iter()
            .map(|&row| self.rows[row].clone())
            .collect()
    }

    /// Distinct filterable values over the rows matching the query
    pub fn distinct(&self, query: &StoreQuery, cancel: &CancellationToken) -> StoreResult<FilterOptions> {
        let ids = self.find(query, cancel)?;
        let rows: Vec<&Transaction> = ids.iter().map(|&row| &self.rows[row]).collect();
        Ok(pipeline::collect_options(&rows))
    }
}

// ==================== Store Backend ====================

/// Query backend answering from a [`TransactionStore`]
pub struct StoreBackend {
    store: Arc<TransactionStore>,
}

impl StoreBackend {
    pub fn new(store: Arc<TransactionStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl QueryBackend for StoreBackend {
    async fn execute(
        &self,
        spec: &QuerySpec,
        cancel: &CancellationToken,
    ) -> QueryResult<QueryOutcome> {
        ensure_live(cancel)?;
        let query = StoreQuery::from_spec(spec);
        let ids = self.store.find(&query, cancel)?;
        ensure_live(cancel)?;

        let stats = self.store.aggregate(&ids);
        let window = pipeline::page_window(ids.len(), spec.page, spec.page_size);
        let items = self.store.page_of_ids(&ids, &query, window.start, window.end);

        Ok(QueryOutcome {
            items,
            total_items: ids.len() as u64,
            stats,
        })
    }

    async fn filter_options(
        &self,
        term: Option<&str>,
        filters: &FilterCriteria,
        cancel: &CancellationToken,
    ) -> QueryResult<FilterOptions> {
        ensure_live(cancel)?;
        let query = StoreQuery {
            text: pipeline::normalize_term(term),
            member_of: query::MEMBER_FIELDS
                .into_iter()
                .filter_map(|field| {
                    let accepted = match field {
                        Field::CustomerRegion => &filters.customer_region,
                        Field::Gender => &filters.gender,
                        Field::ProductCategory => &filters.product_category,
                        Field::PaymentMethod => &filters.payment_method,
                    };
                    (!accepted.is_empty()).then(|| (field, accepted.clone()))
                })
                .collect(),
            tags_any: filters.tags.clone(),
            age: filters
                .age_range
                .map(|r| (r.min, r.max))
                .filter(|(min, max)| min.is_some() || max.is_some()),
            date: filters
                .date_range
                .map(|r| (r.start, r.end))
                .filter(|(start, end)| start.is_some() || end.is_some()),
            sort_by: None,
            sort_order: saleslens_core::SortOrder::Asc,
        };
        Ok(self.store.distinct(&query, cancel)?)
    }
}

// ==================== Tests ====================

#[cfg(test)]
mod tests {
    use super::*;
    use saleslens_core::model::parse_timestamp;
    use saleslens_core::QueryRequest;

    fn record(id: &str, name: &str, region: &str, tags: &[&str], age: Option<u32>, date: &str) -> Transaction {
        Transaction {
            transaction_id: id.to_string(),
            customer_name: name.to_string(),
            customer_region: region.to_string(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            age,
            date: parse_timestamp(date).unwrap(),
            ..Transaction::default()
        }
    }

    fn store() -> TransactionStore {
        TransactionStore::build(vec![
            record("TX-1", "John", "North", &["vip"], Some(34), "2024-03-01"),
            record("TX-2", "Alice", "East", &[], Some(28), "2024-03-05"),
            record("TX-3", "Bob", "North", &["vip", "bulk"], None, "2024-02-20"),
            record("TX-4", "Carol", "South", &[], Some(45), "2024-03-05"),
        ])
    }

    fn spec(request: QueryRequest) -> QuerySpec {
        QuerySpec::from_request(&request).unwrap()
    }

    #[test]
    fn test_find_without_constraints_returns_all() {
        let store = store();
        let query = StoreQuery::from_spec(&spec(QueryRequest::default()));
        let ids = store.find(&query, &CancellationToken::new()).unwrap();
        assert_eq!(ids, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_find_uses_region_index() {
        let store = store();
        let query = StoreQuery::from_spec(&spec(QueryRequest {
            filters: FilterCriteria {
                customer_region: vec!["North".to_string()],
                ..FilterCriteria::default()
            },
            ..QueryRequest::default()
        }));
        let ids = store.find(&query, &CancellationToken::new()).unwrap();
        assert_eq!(ids, vec![0, 2]);
    }

    #[test]
    fn test_candidates_rechecked_against_full_predicate() {
        let store = store();
        // region index narrows to rows 0 and 2, search keeps only row 0
        let query = StoreQuery::from_spec(&spec(QueryRequest {
            search: Some("john".to_string()),
            filters: FilterCriteria {
                customer_region: vec!["North".to_string()],
                ..FilterCriteria::default()
            },
            ..QueryRequest::default()
        }));
        let ids = store.find(&query, &CancellationToken::new()).unwrap();
        assert_eq!(ids, vec![0]);
    }

    #[test]
    fn test_tag_index_union_dedups() {
        let store = store();
        let query = StoreQuery::from_spec(&spec(QueryRequest {
            filters: FilterCriteria {
                tags: vec!["vip".to_string(), "bulk".to_string()],
                ..FilterCriteria::default()
            },
            ..QueryRequest::default()
        }));
        let ids = store.find(&query, &CancellationToken::new()).unwrap();
        // TX-3 carries both tags but appears once
        assert_eq!(ids, vec![0, 2]);
    }

    #[test]
    fn test_date_range_index_lookup() {
        let store = store();
        let query = StoreQuery::from_spec(&spec(QueryRequest {
            filters: FilterCriteria {
                date_range: Some(saleslens_core::DateRange {
                    start: parse_timestamp("2024-03-01"),
                    end: None,
                }),
                ..FilterCriteria::default()
            },
            ..QueryRequest::default()
        }));
        let ids = store.find(&query, &CancellationToken::new()).unwrap();
        assert_eq!(ids, vec![0, 1, 3]);
    }

    #[test]
    fn test_stale_index_posting_reports_corruption() {
        let mut store = store();
        // A posting past the end of the row vector means the index and
        // the rows have diverged
        store.region_idx.insert(IndexKey::from_str_key("North"), 99);
        let query = StoreQuery::from_spec(&spec(QueryRequest {
            filters: FilterCriteria {
                customer_region: vec!["North".to_string()],
                ..FilterCriteria::default()
            },
            ..QueryRequest::default()
        }));
        assert!(matches!(
            store.find(&query, &CancellationToken::new()),
            Err(StoreError::Corrupted { .. })
        ));
    }

    #[test]
    fn test_cancelled_find_aborts() {
        let store = store();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let query = StoreQuery::from_spec(&spec(QueryRequest::default()));
        assert!(matches!(
            store.find(&query, &cancel),
            Err(StoreError::Cancelled)
        ));
    }

    #[test]
    fn test_page_of_ids_sorts_with_row_order_tiebreak() {
        let store = store();
        let query = StoreQuery::from_spec(&spec(QueryRequest {
            sort_by: Some("date".to_string()),
            ..QueryRequest::default()
        }));
        let items = store.page_of_ids(&[0, 1, 2, 3], &query, 0, 4);
        let ids: Vec<&str> = items.iter().map(|t| t.transaction_id.as_str()).collect();
        // TX-2 and TX-4 tie on date, lower row id first
        assert_eq!(ids, vec!["TX-2", "TX-4", "TX-1", "TX-3"]);
    }

    #[tokio::test]
    async fn test_backend_execute_pages() {
        let backend = StoreBackend::new(Arc::new(store()));
        let request = QueryRequest {
            page: Some(2),
            page_size: Some(3),
            ..QueryRequest::default()
        };
        let outcome = backend
            .execute(&spec(request), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(outcome.total_items, 4);
        assert_eq!(outcome.items.len(), 1);
        assert_eq!(outcome.items[0].transaction_id, "TX-4");
    }

    #[tokio::test]
    async fn test_backend_filter_options() {
        let backend = StoreBackend::new(Arc::new(store()));
        let filters = FilterCriteria {
            customer_region: vec!["North".to_string()],
            ..FilterCriteria::default()
        };
        let options = backend
            .filter_options(None, &filters, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(options.customer_regions, vec!["North"]);
        assert_eq!(options.tags, vec!["bulk", "vip"]);
    }
}
