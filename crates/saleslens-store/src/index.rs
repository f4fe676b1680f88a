//! BTreeMap-based index structures
//!
//! Indexes map field values to sorted lists of row identifiers, so
//! every lookup yields rows in deterministic source order.

use std::collections::BTreeMap;
use std::ops::Bound;

use chrono::{DateTime, Utc};

/// Position of a row in the store's record vector
pub type RowId = usize;

/// Index key for a single field value.
///
/// Ordering is deterministic: Int < Str.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum IndexKey {
    /// Integer value (ages, timestamps)
    Int(i64),
    /// String value
    Str(String),
}

impl IndexKey {
    /// Key for a string field value
    pub fn from_str_key(v: impl Into<String>) -> Self {
        IndexKey::Str(v.into())
    }

    /// Key for an age value
    pub fn from_age(v: u32) -> Self {
        IndexKey::Int(i64::from(v))
    }

    /// Key for a timestamp, at millisecond precision
    pub fn from_date(v: DateTime<Utc>) -> Self {
        IndexKey::Int(v.timestamp_millis())
    }
}

/// A single-field index. Row ids under each key are kept sorted
/// ascending.
#[derive(Debug, Default)]
pub struct IndexTree {
    tree: BTreeMap<IndexKey, Vec<RowId>>,
}

impl IndexTree {
    pub fn new() -> Self {
        Self {
            tree: BTreeMap::new(),
        }
    }

    /// Insert a row under a key. Rows must be inserted in ascending
    /// id order to keep postings sorted.
    pub fn insert(&mut self, key: IndexKey, row: RowId) {
        self.tree.entry(key).or_default().push(row);
    }

    /// Rows holding exactly `key`
    pub fn lookup_eq(&self, key: &IndexKey) -> Vec<RowId> {
        self.tree.get(key).cloned().unwrap_or_default()
    }

    /// Rows whose key falls in the inclusive range. Either bound may
    /// be open. Results come back sorted ascending with no duplicates.
    pub fn lookup_range(&self, min: Option<&IndexKey>, max: Option<&IndexKey>) -> Vec<RowId> {
        let lower = min.map_or(Bound::Unbounded, |k| Bound::Included(k.clone()));
        let upper = max.map_or(Bound::Unbounded, |k| Bound::Included(k.clone()));
        let mut rows: Vec<RowId> = self
            .tree
            .range((lower, upper))
            .flat_map(|(_, ids)| ids.iter().copied())
            .collect();
        rows.sort_unstable();
        rows
    }

    /// Number of distinct keys
    pub fn len(&self) -> usize {
        self.tree.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }
}

// ==================== Tests ====================
