//! Query request types and validation
//!
//! Raw requests arrive with every field optional. Validation turns a
//! [`QueryRequest`] into a [`QuerySpec`] with defaults applied, or
//! rejects it with the full list of violations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{QueryError, QueryResult, Violation};
use crate::model::parse_timestamp;

/// Default number of records per page
pub const DEFAULT_PAGE_SIZE: u64 = 10;
/// Maximum accepted page size
pub const MAX_PAGE_SIZE: u64 = 100;
/// Maximum accepted search term length in characters
pub const MAX_SEARCH_LEN: usize = 100;

// ==================== Request Types ====================

/// Inclusive age bounds. Either side may be open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AgeRange {
    pub min: Option<u32>,
    pub max: Option<u32>,
}

/// Inclusive date bounds. Either side may be open. Bounds that fail to
/// parse are treated as absent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DateRange {
    #[serde(deserialize_with = "deserialize_lenient_bound")]
    pub start: Option<DateTime<Utc>>,
    #[serde(deserialize_with = "deserialize_lenient_bound")]
    pub end: Option<DateTime<Utc>>,
}

fn deserialize_lenient_bound<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.as_deref().and_then(parse_timestamp))
}

/// Filter criteria for a query. Empty lists and absent ranges match
/// everything.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FilterCriteria {
    /// Accepted customer regions
    pub customer_region: Vec<String>,
    /// Accepted gender labels
    pub gender: Vec<String>,
    /// Accepted product categories
    pub product_category: Vec<String>,
    /// Record matches when it carries at least one of these tags
    pub tags: Vec<String>,
    /// Accepted payment methods
    pub payment_method: Vec<String>,
    /// Inclusive age bounds
    pub age_range: Option<AgeRange>,
    /// Inclusive date bounds
    pub date_range: Option<DateRange>,
}

impl FilterCriteria {
    /// True when no criterion is set
    pub fn is_empty(&self) -> bool {
        self.customer_region.is_empty()
            && self.gender.is_empty()
            && self.product_category.is_empty()
            && self.tags.is_empty()
            && self.payment_method.is_empty()
            && self.age_range.is_none()
            && self.date_range.is_none()
    }
}

/// Raw query request as received over the wire
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QueryRequest {
    /// Search term matched against customer name and phone number
    pub search: Option<String>,
    /// Filter criteria
    pub filters: FilterCriteria,
    /// Sort field name
    pub sort_by: Option<String>,
    /// Sort direction name
    pub sort_order: Option<String>,
    /// Requested page (1-based)
    pub page: Option<i64>,
    /// Requested page size
    pub page_size: Option<i64>,
}

/// Request body for the filter options listing
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FilterOptionsRequest {
    /// Search term restricting the record set
    pub search: Option<String>,
    /// Filter criteria restricting the record set
    pub filters: FilterCriteria,
}

// ==================== Sort Types ====================

/// Sortable fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortField {
    Date,
    Quantity,
    CustomerName,
}

impl SortField {
    /// The direction used when the request names a field without a
    /// direction
    pub fn default_order(&self) -> SortOrder {
        match self {
            SortField::Date => SortOrder::Desc,
            SortField::Quantity => SortOrder::Asc,
            SortField::CustomerName => SortOrder::Asc,
        }
    }
}

impl std::str::FromStr for SortField {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "date" => Ok(SortField::Date),
            "quantity" => Ok(SortField::Quantity),
            "customerName" => Ok(SortField::CustomerName),
            _ => Err(format!("Invalid sort field: {}", s)),
        }
    }
}

impl std::fmt::Display for SortField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SortField::Date => write!(f, "date"),
            SortField::Quantity => write!(f, "quantity"),
            SortField::CustomerName => write!(f, "customerName"),
        }
    }
}

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    Desc,
}

impl std::str::FromStr for SortOrder {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "asc" => Ok(SortOrder::Asc),
            "desc" => Ok(SortOrder::Desc),
            _ => Err(format!("Invalid sort order: {}", s)),
        }
    }
}

impl std::fmt::Display for SortOrder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SortOrder::Asc => write!(f, "asc"),
            SortOrder::Desc => write!(f, "desc"),
        }
    }
}

// ==================== Validated Query ====================

/// A validated query with all defaults applied
#[derive(Debug, Clone, PartialEq)]
pub struct QuerySpec {
    /// Trimmed search term, absent when blank
    pub term: Option<String>,
    /// Filter criteria
    pub filters: FilterCriteria,
    /// Sort field, absent to keep source order
    pub sort_by: Option<SortField>,
    /// Effective sort direction
    pub sort_order: SortOrder,
    /// Page number (1-based)
    pub page: u64,
    /// Page size
    pub page_size: u64,
}

impl QuerySpec {
    /// Validate a raw request, collecting every violation rather than
    /// stopping at the first.
    pub fn from_request(request: &QueryRequest) -> QueryResult<Self> {
        let mut violations = Vec::new();

        let term = match request.search.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(t) if t.chars().count() > MAX_SEARCH_LEN => {
                violations.push(Violation::new(
                    "search",
                    format!("must be at most {} characters", MAX_SEARCH_LEN),
                ));
                None
            }
            Some(t) => Some(t.to_string()),
        };

        let sort_by = match request.sort_by.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(name) => match name.parse::<SortField>() {
                Ok(field) => Some(field),
                Err(_) => {
                    violations.push(Violation::new(
                        "sortBy",
                        "must be one of: date, quantity, customerName",
                    ));
                    None
                }
            },
        };

        let explicit_order = match request.sort_order.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(name) => match name.parse::<SortOrder>() {
                Ok(order) => Some(order),
                Err(_) => {
                    violations.push(Violation::new("sortOrder", "must be 'asc' or 'desc'"));
                    None
                }
            },
        };
        let sort_order = explicit_order
            .or_else(|| sort_by.map(|f| f.default_order()))
            .unwrap_or(SortOrder::Asc);

        let page = match request.page {
            None => 1,
            Some(p) if p >= 1 => p as u64,
            Some(_) => {
                violations.push(Violation::new("page", "must be >= 1"));
                1
            }
        };

        let page_size = match request.page_size {
            None => DEFAULT_PAGE_SIZE,
            Some(s) if s >= 1 && s as u64 <= MAX_PAGE_SIZE => s as u64,
            Some(_) => {
                violations.push(Violation::new(
                    "pageSize",
                    format!("must be between 1 and {}", MAX_PAGE_SIZE),
                ));
                DEFAULT_PAGE_SIZE
            }
        };

        if let Some(range) = &request.filters.age_range {
            if let (Some(min), Some(max)) = (range.min, range.max) {
                if min > max {
                    violations.push(Violation::new("ageRange", "min must not exceed max"));
                }
            }
        }

        if !violations.is_empty() {
            return Err(QueryError::Validation { violations });
        }

        Ok(Self {
            term,
            filters: request.filters.clone(),
            sort_by,
            sort_order,
            page,
            page_size,
        })
    }
}

// ==================== Tests ====================
