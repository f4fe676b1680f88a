//! Query pipeline stages
//!
//! Pure functions implementing search, filter, aggregate, sort, and
//! pagination over borrowed records. Both backends route their results
//! through the same comparator and window arithmetic so their output
//! stays byte-for-byte identical.

use std::cmp::Ordering;
use std::collections::BTreeSet;

use crate::model::{AgeSpan, AggregateStats, FilterOptions, Pagination, Transaction};
use crate::request::{FilterCriteria, SortField, SortOrder, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};

// ==================== Search ====================

/// Normalize a search term: trim, lowercase, drop if blank
pub fn normalize_term(term: Option<&str>) -> Option<String> {
    match term.map(str::trim) {
        None | Some("") => None,
        Some(t) => Some(t.to_lowercase()),
    }
}

/// Search predicate. The lowered term matches a lowercased customer
/// name or, verbatim, a phone number.
pub fn matches_term(tx: &Transaction, lowered: &str) -> bool {
    tx.customer_name.to_lowercase().contains(lowered) || tx.phone_number.contains(lowered)
}

/// Restrict `rows` to records matching the search term. A blank or
/// absent term returns the input unchanged.
pub fn search<'a>(rows: Vec<&'a Transaction>, term: Option<&str>) -> Vec<&'a Transaction> {
    match normalize_term(term) {
        None => rows,
        Some(lowered) => rows
            .into_iter()
            .filter(|tx| matches_term(tx, &lowered))
            .collect(),
    }
}

// ==================== Filter ====================

fn member_of(value: &str, accepted: &[String]) -> bool {
    accepted.is_empty() || accepted.iter().any(|a| a == value)
}

fn tags_intersect(tags: &[String], wanted: &[String]) -> bool {
    wanted.is_empty() || tags.iter().any(|t| wanted.iter().any(|w| w == t))
}

/// Age predicate. A record without an age never matches a bounded
/// range.
pub fn age_in_range(age: Option<u32>, min: Option<u32>, max: Option<u32>) -> bool {
    if min.is_none() && max.is_none() {
        return true;
    }
    match age {
        None => false,
        Some(a) => min.map_or(true, |m| a >= m) && max.map_or(true, |m| a <= m),
    }
}

/// Filter predicate combining every criterion conjunctively
pub fn matches_filters(tx: &Transaction, filters: &FilterCriteria) -> bool {
    if !member_of(&tx.customer_region, &filters.customer_region) {
        return false;
    }
    if !member_of(&tx.gender, &filters.gender) {
        return false;
    }
    if !member_of(&tx.product_category, &filters.product_category) {
        return false;
    }
    if !member_of(&tx.payment_method, &filters.payment_method) {
        return false;
    }
    if !tags_intersect(&tx.tags, &filters.tags) {
        return false;
    }
    if let Some(range) = &filters.age_range {
        if !age_in_range(tx.age, range.min, range.max) {
            return false;
        }
    }
    if let Some(range) = &filters.date_range {
        if let Some(start) = range.start {
            if tx.date < start {
                return false;
            }
        }
        if let Some(end) = range.end {
            if tx.date > end {
                return false;
            }
        }
    }
    true
}

/// Restrict `rows` to records matching all filter criteria
pub fn filter<'a>(rows: Vec<&'a Transaction>, filters: &FilterCriteria) -> Vec<&'a Transaction> {
    if filters.is_empty() {
        return rows;
    }
    rows.into_iter()
        .filter(|tx| matches_filters(tx, filters))
        .collect()
}

// ==================== Aggregate ====================

/// Aggregate statistics over the full filtered set, before pagination
pub fn aggregate(rows: &[&Transaction]) -> AggregateStats {
    let mut stats = AggregateStats::default();
    for tx in rows {
        stats.total_units += u64::from(tx.quantity);
        stats.total_amount += tx.gross_amount();
        stats.total_discount += tx.discount();
        stats.record_count += 1;
    }
    stats
}

// ==================== Sort ====================

/// Compare two records on a sort field, ascending. Ties preserve the
/// original relative order because callers use a stable sort.
pub fn compare(field: SortField, a: &Transaction, b: &Transaction) -> Ordering {
    match field {
        SortField::Date => a.date.cmp(&b.date),
        SortField::Quantity => a.quantity.cmp(&b.quantity),
        SortField::CustomerName => a
            .customer_name
            .to_lowercase()
            .cmp(&b.customer_name.to_lowercase()),
    }
}

/// Stable in-place sort of borrowed rows
pub fn sort_rows(rows: &mut [&Transaction], field: SortField, order: SortOrder) {
    match order {
        SortOrder::Asc => rows.sort_by(|a, b| compare(field, a, b)),
        SortOrder::Desc => rows.sort_by(|a, b| compare(field, a, b).reverse()),
    }
}

// ==================== Paginate ====================

/// A resolved page window over a result set of `total` rows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    /// Effective page number after clamping
    pub page: u64,
    /// Effective page size
    pub page_size: u64,
    /// Slice start offset (0-based, inclusive)
    pub start: usize,
    /// Slice end offset (0-based, exclusive)
    pub end: usize,
    /// Total number of pages
    pub total_pages: u64,
}

/// Resolve the page window for `total` rows.
///
/// Out-of-range inputs are normalized rather than rejected: page
/// floors at 1 and clamps to the last page, size defaults to 10 and
/// caps at 100.
pub fn page_window(total: usize, page: u64, page_size: u64) -> PageWindow {
    let page_size = if page_size == 0 {
        DEFAULT_PAGE_SIZE
    } else {
        page_size.min(MAX_PAGE_SIZE)
    };
    let total_pages = (total as u64).div_ceil(page_size);
    let page = page.max(1).min(total_pages.max(1));
    let start = ((page - 1) * page_size) as usize;
    let start = start.min(total);
    let end = (start + page_size as usize).min(total);
    PageWindow {
        page,
        page_size,
        start,
        end,
        total_pages,
    }
}

/// Build pagination metadata from a resolved window
pub fn pagination_meta(window: &PageWindow, total: usize) -> Pagination {
    let empty = window.start >= window.end;
    Pagination {
        current_page: window.page,
        page_size: window.page_size,
        total_items: total as u64,
        total_pages: window.total_pages,
        has_next_page: window.page < window.total_pages,
        has_previous_page: window.page > 1,
        start_index: if empty { 0 } else { window.start as u64 + 1 },
        end_index: if empty { 0 } else { window.end as u64 },
    }
}

// ==================== Filter Options ====================

/// Collect the distinct filterable values present in `rows`.
///
/// Empty string values are skipped. Lists come back sorted so the
/// output is deterministic regardless of record order.
pub fn collect_options(rows: &[&Transaction]) -> FilterOptions {
    let mut regions = BTreeSet::new();
    let mut genders = BTreeSet::new();
    let mut categories = BTreeSet::new();
    let mut tags = BTreeSet::new();
    let mut methods = BTreeSet::new();
    let mut ages: Option<AgeSpan> = None;

    for tx in rows {
        if !tx.customer_region.is_empty() {
            regions.insert(tx.customer_region.clone());
        }
        if !tx.gender.is_empty() {
            genders.insert(tx.gender.clone());
        }
        if !tx.product_category.is_empty() {
            categories.insert(tx.product_category.clone());
        }
        if !tx.payment_method.is_empty() {
            methods.insert(tx.payment_method.clone());
        }
        for tag in &tx.tags {
            if !tag.is_empty() {
                tags.insert(tag.clone());
            }
        }
        if let Some(age) = tx.age {
            ages = Some(match ages {
                None => AgeSpan { min: age, max: age },
                Some(span) => AgeSpan {
                    min: span.min.min(age),
                    max: span.max.max(age),
                },
            });
        }
    }

    FilterOptions {
        customer_regions: regions.into_iter().collect(),
        genders: genders.into_iter().collect(),
        product_categories: categories.into_iter().collect(),
        tags: tags.into_iter().collect(),
        payment_methods: methods.into_iter().collect(),
        age_range: ages,
    }
}

// ==================== Tests ====================
