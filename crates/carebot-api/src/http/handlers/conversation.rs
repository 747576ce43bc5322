//! Conversation HTTP handlers.
//!
//! Endpoints:
//! - GET    /api/conversations/stats
//! - GET    /api/conversations/{sessionId}
//! - DELETE /api/conversations/{sessionId}
//! - GET    /api/conversations/patients/{patientId}?limit=

use axum::extract::{Path, Query, State};
use serde_json::{Value, json};

use crate::http::error::AppError;
use crate::http::extractors::auth::Authenticated;
use crate::http::extractors::query::HistoryQuery;
use crate::http::response::ApiResponse;
use crate::state::AppState;

pub async fn get_stats(
    State(state): State<AppState>,
    _auth: Authenticated,
) -> Result<ApiResponse<Value>, AppError> {
    let stats = state.chat_service.get_stats().await?;
    Ok(ApiResponse::success(json!({ "stats": stats })))
}

pub async fn get_conversation(
    State(state): State<AppState>,
    _auth: Authenticated,
    Path(session_id): Path<String>,
) -> Result<ApiResponse<Value>, AppError> {
    let Some(found) = state
        .chat_service
        .get_conversation_history(&session_id)
        .await?
    else {
        return Err(AppError::NotFound("Conversation not found".to_string()));
    };

    Ok(ApiResponse::success(json!({
        "conversation": found.conversation,
        "messages": found.messages,
    })))
}

pub async fn end_conversation(
    State(state): State<AppState>,
    _auth: Authenticated,
    Path(session_id): Path<String>,
) -> Result<ApiResponse<Value>, AppError> {
    state.chat_service.end_conversation(&session_id).await?;
    Ok(ApiResponse::success(json!({ "message": "Conversation ended" })))
}

pub async fn get_patient_history(
    State(state): State<AppState>,
    _auth: Authenticated,
    Path(patient_id): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> Result<ApiResponse<Value>, AppError> {
    let conversations = state
        .chat_service
        .get_patient_history(&patient_id, query.limit()?)
        .await?;
    Ok(ApiResponse::success(json!({ "conversations": conversations })))
}
