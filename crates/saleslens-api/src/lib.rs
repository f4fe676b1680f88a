//! HTTP JSON API server
//!
//! Thin transport layer over the query engine:
//! - POST /api/transactions/query: run a query
//! - POST /api/transactions/filter-options: list filterable values
//! - POST /api/reload: reload the in-memory snapshot
//! - GET /api/health: liveness probe

pub mod error;

use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use log::{error, info, warn};
use tokio::net::TcpListener;
use tokio_util::sync::{CancellationToken, DropGuard};
use tower_http::cors::CorsLayer;

use saleslens_config::Config;
use saleslens_core::memory::MemoryBackend;
use saleslens_core::{
    FilterOptions, FilterOptionsRequest, PageResult, QueryEngine, QueryRequest,
};

pub use error::ApiError;

/// Application state
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<QueryEngine>,
    /// Present when the memory backend is active; needed for reload
    pub memory: Option<Arc<MemoryBackend>>,
    pub config: Config,
}

/// Create the application router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health_check))
        .route("/api/transactions/query", post(api_query))
        .route("/api/transactions/filter-options", post(api_filter_options))
        .route("/api/reload", post(api_reload))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Health check endpoint
async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

/// Cancel the query when the configured timeout elapses.
///
/// The returned guard cancels the token when dropped, so the timer task
/// exits as soon as the request finishes instead of sleeping out the
/// full timeout.
fn deadline_token(config: &Config) -> (CancellationToken, DropGuard) {
    let cancel = CancellationToken::new();
    let timeout = Duration::from_millis(config.query.timeout_ms);
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::select! {
            _ = trigger.cancelled() => {}
            _ = tokio::time::sleep(timeout) => trigger.cancel(),
        }
    });
    let guard = cancel.clone().drop_guard();
    (cancel, guard)
}

/// Run a transaction query
async fn api_query(
    State(state): State<AppState>,
    Json(request): Json<QueryRequest>,
) -> Result<Json<PageResult>, ApiError> {
    let (cancel, _deadline) = deadline_token(&state.config);
    let result = state.engine.query_with_cancel(&request, &cancel).await;
    if let Err(err) = &result {
        warn!("Query failed: [{}] {}", err.code(), err);
    }
    Ok(Json(result?))
}

/// List distinct filterable values
async fn api_filter_options(
    State(state): State<AppState>,
    Json(request): Json<FilterOptionsRequest>,
) -> Result<Json<FilterOptions>, ApiError> {
    let (cancel, _deadline) = deadline_token(&state.config);
    let options = state.engine.filter_options(&request, &cancel).await?;
    Ok(Json(options))
}

/// Reload the record snapshot from its source
async fn api_reload(State(state): State<AppState>) -> Json<serde_json::Value> {
    match &state.memory {
        None => Json(serde_json::json!({
            "success": false,
            "message": "Reload is only available with the memory backend",
        })),
        Some(memory) => match memory.reload().await {
            Ok(count) => {
                info!("Reloaded {} records via API", count);
                Json(serde_json::json!({
                    "success": true,
                    "message": format!("Reloaded {} records", count),
                }))
            }
            Err(e) => {
                error!("Reload failed: {}", e);
                Json(serde_json::json!({
                    "success": false,
                    "message": e.to_string(),
                }))
            }
        },
    }
}

/// Bind and serve until the process is stopped
pub async fn start_server(state: AppState) -> anyhow::Result<()> {
    let addr = format!("{}:{}", state.config.server.host, state.config.server.port);
    let router = create_router(state);

    let listener = TcpListener::bind(&addr).await?;
    info!("Starting saleslens server on http://{}", addr);
    info!("  POST /api/transactions/query");
    info!("  POST /api/transactions/filter-options");
    info!("  POST /api/reload");
    info!("  GET  /api/health");

    axum::serve(listener, router).await?;
    info!("Server stopped");
    Ok(())
}

// ==================== Tests ====================

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use saleslens_core::memory::StaticSource;
    use saleslens_core::Transaction;
    use tower::ServiceExt;

    async fn test_state() -> AppState {
        let records = vec![
            Transaction {
                transaction_id: "TX-1".to_string(),
                customer_name: "John".to_string(),
                quantity: 5,
                ..Transaction::default()
            },
            Transaction {
                transaction_id: "TX-2".to_string(),
                customer_name: "Alice".to_string(),
                quantity: 2,
                ..Transaction::default()
            },
        ];
        let memory = Arc::new(MemoryBackend::new(Arc::new(StaticSource::new(records))));
        memory.load().await.unwrap();
        AppState {
            engine: Arc::new(QueryEngine::new(memory.clone())),
            memory: Some(memory),
            config: Config::default(),
        }
    }

    async fn send(router: Router, uri: &str, body: &str) -> (StatusCode, serde_json::Value) {
        let response = router
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(uri)
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_health() {
        let router = create_router(test_state().await);
        let response = router
            .oneshot(
                Request::builder()
                    .uri("/api/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_query_endpoint() {
        let router = create_router(test_state().await);
        let (status, body) = send(router, "/api/transactions/query", "{}").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["pagination"]["totalItems"], 2);
        assert_eq!(body["aggregateStats"]["totalUnits"], 7);
    }

    #[tokio::test]
    async fn test_invalid_query_returns_400_with_violations() {
        let router = create_router(test_state().await);
        let (status, body) = send(router, "/api/transactions/query", r#"{"page": 0}"#).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
        assert_eq!(body["error"]["violations"][0]["field"], "page");
    }

    #[tokio::test]
    async fn test_filter_options_endpoint() {
        let router = create_router(test_state().await);
        let (status, body) = send(router, "/api/transactions/filter-options", "{}").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["customerRegions"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_reload_endpoint() {
        let router = create_router(test_state().await);
        let (status, body) = send(router, "/api/reload", "").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
    }

    #[tokio::test]
    async fn test_deadline_fires_after_timeout() {
        let mut config = Config::default();
        config.query.timeout_ms = 10;
        let (cancel, _guard) = deadline_token(&config);
        assert!(!cancel.is_cancelled());
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(cancel.is_cancelled());
    }

    #[tokio::test]
    async fn test_deadline_timer_released_when_guard_drops() {
        let config = Config::default();
        let (cancel, guard) = deadline_token(&config);
        drop(guard);
        // The timer task observes the cancelled token and exits without
        // waiting out the configured timeout.
        cancel.cancelled().await;
        assert!(cancel.is_cancelled());
    }
}
