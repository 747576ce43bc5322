//! Liveness and database health probes. Not behind authentication.

use axum::extract::State;
use serde_json::{Value, json};

use crate::http::error::AppError;
use crate::http::response::ApiResponse;
use crate::state::AppState;

/// GET /health
pub async fn health() -> ApiResponse<Value> {
    ApiResponse::success(json!({
        "status": "ok",
        "service": "carebot",
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

/// GET /health/db - 503 when the database does not answer.
pub async fn health_db(State(state): State<AppState>) -> Result<ApiResponse<Value>, AppError> {
    if let Err(e) = state.db_pool.ping().await {
        tracing::warn!(error = %e, "Database health check failed");
        return Err(AppError::Unavailable("Database connection failed".to_string()));
    }

    let active_sessions = state.sessions.active_count().await.map_err(|e| {
        tracing::warn!(error = %e, "Session count failed during health check");
        AppError::Unavailable("Database connection failed".to_string())
    })?;

    Ok(ApiResponse::success(json!({
        "database": "connected",
        "activeSessions": active_sessions,
        "timestamp": chrono::Utc::now().to_rfc3339(),
    })))
}
