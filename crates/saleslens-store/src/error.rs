//! Error types for the indexed store

use saleslens_core::QueryError;
use thiserror::Error;

/// Errors raised by the indexed store
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Store query cancelled")]
    Cancelled,

    #[error("Store corrupted: {message}")]
    Corrupted { message: String },
}

impl From<StoreError> for QueryError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Cancelled => QueryError::Cancelled,
            StoreError::Corrupted { message } => QueryError::Store { message },
        }
    }
}

/// Result type alias for store operations
pub type StoreResult<T> = Result<T, StoreError>;
