//! Error types for saleslens-core
//!
//! This module provides error handling for the query pipeline, including
//! error codes, validation violation lists, and severity levels.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error codes for programmatic error handling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Request validation failed
    ValidationError,
    /// Dataset not loaded
    NotLoaded,
    /// Record source failed
    SourceError,
    /// Indexed store failed
    StoreError,
    /// Query was cancelled
    Cancelled,
    /// Internal error
    InternalError,
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorCode::ValidationError => write!(f, "VALIDATION_ERROR"),
            ErrorCode::NotLoaded => write!(f, "NOT_LOADED"),
            ErrorCode::SourceError => write!(f, "SOURCE_ERROR"),
            ErrorCode::StoreError => write!(f, "STORE_ERROR"),
            ErrorCode::Cancelled => write!(f, "CANCELLED"),
            ErrorCode::InternalError => write!(f, "INTERNAL_ERROR"),
        }
    }
}

/// Error severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorSeverity {
    /// Debug information
    Debug,
    /// Informational
    Info,
    /// Warning - operation may be affected
    Warning,
    /// Error - operation failed
    Error,
    /// Critical - application may be unstable
    Critical,
}

impl std::fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorSeverity::Debug => write!(f, "debug"),
            ErrorSeverity::Info => write!(f, "info"),
            ErrorSeverity::Warning => write!(f, "warning"),
            ErrorSeverity::Error => write!(f, "error"),
            ErrorSeverity::Critical => write!(f, "critical"),
        }
    }
}

/// A single request validation failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    /// Request field that failed validation
    pub field: String,
    /// Human-readable reason
    pub message: String,
}

impl Violation {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

fn format_violations(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Main error type for saleslens-core
#[derive(Error, Debug)]
pub enum QueryError {
    #[error("Validation failed: {}", format_violations(violations))]
    Validation { violations: Vec<Violation> },

    #[error("Dataset not loaded")]
    NotLoaded,

    #[error("Record source error: {message}")]
    Source { message: String },

    #[error("Store error: {message}")]
    Store { message: String },

    #[error("Query cancelled")]
    Cancelled,

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl QueryError {
    /// Build a validation error from a single violation
    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        QueryError::Validation {
            violations: vec![Violation::new(field, message)],
        }
    }

    /// Get the error code
    pub fn code(&self) -> ErrorCode {
        match self {
            QueryError::Validation { .. } => ErrorCode::ValidationError,
            QueryError::NotLoaded => ErrorCode::NotLoaded,
            QueryError::Source { .. } => ErrorCode::SourceError,
            QueryError::Store { .. } => ErrorCode::StoreError,
            QueryError::Cancelled => ErrorCode::Cancelled,
            QueryError::Internal { .. } => ErrorCode::InternalError,
        }
    }

    /// Get the severity level
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            QueryError::Validation { .. } => ErrorSeverity::Warning,
            QueryError::NotLoaded => ErrorSeverity::Warning,
            QueryError::Source { .. } => ErrorSeverity::Error,
            QueryError::Store { .. } => ErrorSeverity::Error,
            QueryError::Cancelled => ErrorSeverity::Info,
            QueryError::Internal { .. } => ErrorSeverity::Critical,
        }
    }

    /// Validation violations, if any
    pub fn violations(&self) -> &[Violation] {
        match self {
            QueryError::Validation { violations } => violations,
            _ => &[],
        }
    }
}

/// Result type alias for core operations
pub type QueryResult<T> = Result<T, QueryError>;

// ==================== Tests ====================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(QueryError::NotLoaded.code(), ErrorCode::NotLoaded);
        assert_eq!(QueryError::Cancelled.code(), ErrorCode::Cancelled);
        assert_eq!(
            QueryError::invalid("page", "must be >= 1").code(),
            ErrorCode::ValidationError
        );
    }

    #[test]
    fn test_error_code_display() {
        assert_eq!(ErrorCode::ValidationError.to_string(), "VALIDATION_ERROR");
        assert_eq!(ErrorCode::NotLoaded.to_string(), "NOT_LOADED");
        assert_eq!(ErrorCode::Cancelled.to_string(), "CANCELLED");
    }

    #[test]
    fn test_validation_display_joins_violations() {
        let err = QueryError::Validation {
            violations: vec![
                Violation::new("page", "must be >= 1"),
                Violation::new("pageSize", "must be between 1 and 100"),
            ],
        };
        let text = err.to_string();
        assert!(text.contains("page: must be >= 1"));
        assert!(text.contains("pageSize: must be between 1 and 100"));
    }

    #[test]
    fn test_severity() {
        assert_eq!(QueryError::Cancelled.severity(), ErrorSeverity::Info);
        assert_eq!(
            QueryError::Internal {
                message: "boom".to_string()
            }
            .severity(),
            ErrorSeverity::Critical
        );
    }
}
