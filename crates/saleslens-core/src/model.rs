//! Core data models for transaction records and query results

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};

/// A single sales transaction record.
///
/// String fields default to empty and numeric amounts to `None` when
/// missing from the source data, so partially-filled records still
/// deserialize. Unparsable dates fall back to the Unix epoch so the
/// record keeps a stable, deterministic sort position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Transaction {
    /// Unique transaction identifier
    pub transaction_id: String,
    /// Customer identifier
    pub customer_id: String,
    /// Customer display name
    pub customer_name: String,
    /// Customer phone number
    pub phone_number: String,
    /// Customer age, if known
    pub age: Option<u32>,
    /// Customer gender label
    pub gender: String,
    /// Customer region label
    pub customer_region: String,
    /// Product identifier
    pub product_id: String,
    /// Product category label
    pub product_category: String,
    /// Product name
    pub product_name: String,
    /// Payment method label
    pub payment_method: String,
    /// Employee who recorded the sale
    pub employee_name: String,
    /// Free-form tags attached to the record
    pub tags: Vec<String>,
    /// Units sold
    pub quantity: u32,
    /// Amount before discount
    pub total_amount: Option<Decimal>,
    /// Amount after discount
    pub final_amount: Option<Decimal>,
    /// Transaction timestamp
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub date: DateTime<Utc>,
}

impl Default for Transaction {
    fn default() -> Self {
        Self {
            transaction_id: String::new(),
            customer_id: String::new(),
            customer_name: String::new(),
            phone_number: String::new(),
            age: None,
            gender: String::new(),
            customer_region: String::new(),
            product_id: String::new(),
            product_category: String::new(),
            product_name: String::new(),
            payment_method: String::new(),
            employee_name: String::new(),
            tags: Vec::new(),
            quantity: 0,
            total_amount: None,
            final_amount: None,
            date: DateTime::UNIX_EPOCH,
        }
    }
}

impl Transaction {
    /// Amount used for revenue aggregation. Prefers the pre-discount
    /// total and falls back to the final amount when the total is
    /// missing.
    pub fn gross_amount(&self) -> Decimal {
        self.total_amount
            .or(self.final_amount)
            .unwrap_or_default()
    }

    /// Discount granted on this record. Zero unless both amounts are
    /// present.
    pub fn discount(&self) -> Decimal {
        match (self.total_amount, self.final_amount) {
            (Some(total), Some(final_amount)) => total - final_amount,
            _ => Decimal::ZERO,
        }
    }
}

/// Parse a timestamp string in any of the accepted formats.
///
/// Accepts RFC 3339, `YYYY-MM-DD HH:MM:SS`, and bare `YYYY-MM-DD`.
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S") {
        return Some(dt.and_utc());
    }
    if let Ok(d) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return d.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc());
    }
    None
}

/// Lenient timestamp deserializer.
///
/// Accepts timestamp strings, integer epoch milliseconds, or null.
/// Anything unparsable maps to the Unix epoch instead of failing the
/// whole record.
fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawTimestamp {
        Text(String),
        Millis(i64),
        Missing(Option<()>),
    }

    let fallback = DateTime::UNIX_EPOCH;
    let parsed = match RawTimestamp::deserialize(deserializer)? {
        RawTimestamp::Text(s) => parse_timestamp(&s),
        RawTimestamp::Millis(ms) => DateTime::from_timestamp_millis(ms),
        RawTimestamp::Missing(_) => None,
    };
    Ok(parsed.unwrap_or(fallback))
}

/// Aggregate statistics over a filtered result set
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateStats {
    /// Sum of quantities
    pub total_units: u64,
    /// Sum of gross amounts
    pub total_amount: Decimal,
    /// Sum of discounts
    pub total_discount: Decimal,
    /// Number of matching records
    pub record_count: u64,
}

/// Pagination metadata for a result page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    /// Current page number (1-based)
    pub current_page: u64,
    /// Requested page size
    pub page_size: u64,
    /// Total matching records before pagination
    pub total_items: u64,
    /// Total number of pages
    pub total_pages: u64,
    /// Whether a next page exists
    pub has_next_page: bool,
    /// Whether a previous page exists
    pub has_previous_page: bool,
    /// 1-based index of the first record on this page (0 when empty)
    pub start_index: u64,
    /// 1-based index of the last record on this page (0 when empty)
    pub end_index: u64,
}

/// One page of query results plus aggregate statistics over the full
/// filtered set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageResult {
    /// Records on this page
    pub items: Vec<Transaction>,
    /// Pagination metadata
    pub pagination: Pagination,
    /// Statistics over all matching records, not just this page
    pub aggregate_stats: AggregateStats,
}

/// Span of observed customer ages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgeSpan {
    pub min: u32,
    pub max: u32,
}

/// Distinct filterable values present in a record set
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterOptions {
    /// Distinct customer regions, sorted
    pub customer_regions: Vec<String>,
    /// Distinct gender labels, sorted
    pub genders: Vec<String>,
    /// Distinct product categories, sorted
    pub product_categories: Vec<String>,
    /// Distinct tags, sorted
    pub tags: Vec<String>,
    /// Distinct payment methods, sorted
    pub payment_methods: Vec<String>,
    /// Observed age span, if any record carries an age
    pub age_range: Option<AgeSpan>,
}

// ==================== Tests ====================

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str_exact(s).unwrap()
    }

    #[test]
    fn test_deserialize_full_record() {
        let json = r#"{
            "transactionId": "TX-1",
            "customerName": "John Carter",
            "phoneNumber": "555-0101",
            "age": 34,
            "gender": "male",
            "customerRegion": "North",
            "productCategory": "Electronics",
            "productName": "Headphones",
            "paymentMethod": "card",
            "tags": ["vip"],
            "quantity": 5,
            "totalAmount": "120.50",
            "finalAmount": "99.99",
            "date": "2024-03-01T10:30:00Z"
        }"#;
        let tx: Transaction = serde_json::from_str(json).unwrap();
        assert_eq!(tx.customer_name, "John Carter");
        assert_eq!(tx.quantity, 5);
        assert_eq!(tx.total_amount, Some(dec("120.50")));
        assert_eq!(tx.date.to_rfc3339(), "2024-03-01T10:30:00+00:00");
    }

    #[test]
    fn test_deserialize_partial_record_uses_defaults() {
        let tx: Transaction = serde_json::from_str(r#"{"transactionId": "TX-2"}"#).unwrap();
        assert_eq!(tx.transaction_id, "TX-2");
        assert_eq!(tx.customer_name, "");
        assert_eq!(tx.quantity, 0);
        assert_eq!(tx.age, None);
        assert_eq!(tx.total_amount, None);
        assert_eq!(tx.date, DateTime::UNIX_EPOCH);
    }

    #[test]
    fn test_unparsable_date_falls_back_to_epoch() {
        let tx: Transaction =
            serde_json::from_str(r#"{"transactionId": "TX-3", "date": "not a date"}"#).unwrap();
        assert_eq!(tx.date, DateTime::UNIX_EPOCH);
    }

    #[test]
    fn test_date_formats() {
        assert!(parse_timestamp("2024-03-01T10:30:00Z").is_some());
        assert!(parse_timestamp("2024-03-01 10:30:00").is_some());
        let day = parse_timestamp("2024-03-01").unwrap();
        assert_eq!(day.to_rfc3339(), "2024-03-01T00:00:00+00:00");
        assert!(parse_timestamp("03/01/2024").is_none());
        assert!(parse_timestamp("").is_none());
    }

    #[test]
    fn test_epoch_millis_date() {
        let tx: Transaction =
            serde_json::from_str(r#"{"transactionId": "TX-4", "date": 1709287800000}"#).unwrap();
        assert_eq!(tx.date.to_rfc3339(), "2024-03-01T10:10:00+00:00");
    }

    #[test]
    fn test_gross_amount_prefers_total() {
        let tx = Transaction {
            total_amount: Some(dec("120.50")),
            final_amount: Some(dec("99.99")),
            ..Transaction::default()
        };
        assert_eq!(tx.gross_amount(), dec("120.50"));
        assert_eq!(tx.discount(), dec("20.51"));
    }

    #[test]
    fn test_gross_amount_falls_back_to_final() {
        let tx = Transaction {
            total_amount: None,
            final_amount: Some(dec("99.99")),
            ..Transaction::default()
        };
        assert_eq!(tx.gross_amount(), dec("99.99"));
        assert_eq!(tx.discount(), Decimal::ZERO);
    }

    #[test]
    fn test_missing_amounts_are_zero() {
        let tx = Transaction::default();
        assert_eq!(tx.gross_amount(), Decimal::ZERO);
        assert_eq!(tx.discount(), Decimal::ZERO);
    }

    #[test]
    fn test_serialize_camel_case() {
        let tx = Transaction {
            transaction_id: "TX-5".to_string(),
            customer_name: "Alice".to_string(),
            ..Transaction::default()
        };
        let value = serde_json::to_value(&tx).unwrap();
        assert_eq!(value.get("transactionId").unwrap(), "TX-5");
        assert!(value.get("id").is_none());
        assert!(value.get("customerName").is_some());
        assert!(value.get("customer_name").is_none());
    }
}
