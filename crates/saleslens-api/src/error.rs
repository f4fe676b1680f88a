//! Error types for saleslens-api

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use saleslens_core::{ErrorCode, QueryError};
use serde_json::json;
use thiserror::Error;

/// API-level error, carrying the HTTP mapping for each failure
#[derive(Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    Query(#[from] QueryError),

    #[error("Request timed out")]
    Timeout,
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Query(err) => match err.code() {
                ErrorCode::ValidationError => StatusCode::BAD_REQUEST,
                ErrorCode::NotLoaded => StatusCode::SERVICE_UNAVAILABLE,
                ErrorCode::SourceError => StatusCode::BAD_GATEWAY,
                ErrorCode::StoreError => StatusCode::BAD_GATEWAY,
                ErrorCode::Cancelled => StatusCode::REQUEST_TIMEOUT,
                ErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::Timeout => StatusCode::REQUEST_TIMEOUT,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            ApiError::Query(err) => {
                let mut error = json!({
                    "code": err.code().to_string(),
                    "message": err.to_string(),
                });
                let violations = err.violations();
                if !violations.is_empty() {
                    error["violations"] = json!(violations);
                }
                json!({ "error": error })
            }
            ApiError::Timeout => json!({
                "error": {
                    "code": "CANCELLED",
                    "message": "Request timed out",
                }
            }),
        };
        (status, Json(body)).into_response()
    }
}

// ==================== Tests ====================
