//! Store query representation
//!
//! A [`StoreQuery`] is the single conjunctive query the store executes
//! per request. It carries every criterion so candidate rows from an
//! index probe can be re-checked against the full predicate.

use chrono::{DateTime, Utc};
use saleslens_core::{QuerySpec, SortField, SortOrder, Transaction};

/// Indexed membership fields
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    CustomerRegion,
    Gender,
    ProductCategory,
    PaymentMethod,
}

impl Field {
    /// The record value this field indexes
    pub fn value_of<'a>(&self, tx: &'a Transaction) -> &'a str {
        match self {
            Field::CustomerRegion => &tx.customer_region,
            Field::Gender => &tx.gender,
            Field::ProductCategory => &tx.product_category,
            Field::PaymentMethod => &tx.payment_method,
        }
    }
}

/// Fixed probe order for membership fields
pub const MEMBER_FIELDS: [Field; 4] = [
    Field::CustomerRegion,
    Field::Gender,
    Field::ProductCategory,
    Field::PaymentMethod,
];

/// A fully-resolved store query
#[derive(Debug, Clone)]
pub struct StoreQuery {
    /// Lowercased search term
    pub text: Option<String>,
    /// Membership constraints, one entry per constrained field
    pub member_of: Vec<(Field, Vec<String>)>,
    /// Row matches when it carries at least one of these tags
    pub tags_any: Vec<String>,
    /// Inclusive age bounds
    pub age: Option<(Option<u32>, Option<u32>)>,
    /// Inclusive date bounds
    pub date: Option<(Option<DateTime<Utc>>, Option<DateTime<Utc>>)>,
    /// Sort field
    pub sort_by: Option<SortField>,
    /// Sort direction
    pub sort_order: SortOrder,
}

impl StoreQuery {
    /// Translate a validated query into store form. Pagination is not
    /// part of the store query; the backend windows the sorted match
    /// set so both backends share the same page arithmetic.
    pub fn from_spec(spec: &QuerySpec) -> Self {
        let mut member_of = Vec::new();
        for field in MEMBER_FIELDS {
            let accepted = match field {
                Field::CustomerRegion => &spec.filters.customer_region,
                Field::Gender => &spec.filters.gender,
                Field::ProductCategory => &spec.filters.product_category,
                Field::PaymentMethod => &spec.filters.payment_method,
            };
            if !accepted.is_empty() {
                member_of.push((field, accepted.clone()));
            }
        }

        Self {
            text: spec.term.as_deref().map(str::to_lowercase),
            member_of,
            tags_any: spec.filters.tags.clone(),
            age: spec
                .filters
                .age_range
                .map(|r| (r.min, r.max))
                .filter(|(min, max)| min.is_some() || max.is_some()),
            date: spec
                .filters
                .date_range
                .map(|r| (r.start, r.end))
                .filter(|(start, end)| start.is_some() || end.is_some()),
            sort_by: spec.sort_by,
            sort_order: spec.sort_order,
        }
    }

    /// Full predicate check for a candidate row. Index probes narrow
    /// the candidate set; this decides membership.
    pub fn matches(&self, tx: &Transaction, lowered_name: &str) -> bool {
        if let Some(text) = &self.text {
            if !lowered_name.contains(text.as_str()) && !tx.phone_number.contains(text.as_str()) {
                return false;
            }
        }
        for (field, accepted) in &self.member_of {
            let value = field.value_of(tx);
            if !accepted.iter().any(|a| a == value) {
                return false;
            }
        }
        if !self.tags_any.is_empty()
            && !tx.tags.iter().any(|t| self.tags_any.iter().any(|w| w == t))
        {
            return false;
        }
        if let Some((min, max)) = self.age {
            match tx.age {
                None => return false,
                Some(a) => {
                    if min.map_or(false, |m| a < m) || max.map_or(false, |m| a > m) {
                        return false;
                    }
                }
            }
        }
        if let Some((start, end)) = self.date {
            if start.map_or(false, |s| tx.date < s) || end.map_or(false, |e| tx.date > e) {
                return false;
            }
        }
        true
    }
}

// ==================== Tests ====================

#[cfg(test)]
mod tests {
    use super::*;
    use saleslens_core::{AgeRange, FilterCriteria, QueryRequest};

    fn spec(request: QueryRequest) -> QuerySpec {
        QuerySpec::from_request(&request).unwrap()
    }

    #[test]
    fn test_empty_spec_has_no_constraints() {
        let q = StoreQuery::from_spec(&spec(QueryRequest::default()));
        assert!(q.text.is_none());
        assert!(q.member_of.is_empty());
        assert!(q.tags_any.is_empty());
        assert!(q.age.is_none());
    }

    #[test]
    fn test_unbounded_age_range_dropped() {
        let q = StoreQuery::from_spec(&spec(QueryRequest {
            filters: FilterCriteria {
                age_range: Some(AgeRange::default()),
                ..FilterCriteria::default()
            },
            ..QueryRequest::default()
        }));
        assert!(q.age.is_none());
    }

    #[test]
    fn test_matches_residual_predicate() {
        let q = StoreQuery::from_spec(&spec(QueryRequest {
            search: Some("john".to_string()),
            filters: FilterCriteria {
                customer_region: vec!["North".to_string()],
                ..FilterCriteria::default()
            },
            ..QueryRequest::default()
        }));
        let tx = Transaction {
            customer_name: "John Carter".to_string(),
            customer_region: "North".to_string(),
            ..Transaction::default()
        };
        assert!(q.matches(&tx, &tx.customer_name.to_lowercase()));

        let other = Transaction {
            customer_name: "John Carter".to_string(),
            customer_region: "South".to_string(),
            ..Transaction::default()
        };
        assert!(!q.matches(&other, &other.customer_name.to_lowercase()));
    }
}
