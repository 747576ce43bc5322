//! Practitioner onboarding handlers.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::http::error::AppError;
use crate::http::extractors::auth::Authenticated;
use crate::http::response::ApiResponse;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OnboardRequest {
    pub practitioner_id: String,
    #[serde(default)]
    pub organization_id: Option<String>,
}

/// GET /api/users/{userId}/practitioner
pub async fn get_practitioner(
    State(state): State<AppState>,
    _auth: Authenticated,
    Path(user_id): Path<String>,
) -> Result<ApiResponse<Value>, AppError> {
    match state.practitioner_service.get_practitioner(&user_id).await? {
        Some(mapping) => Ok(ApiResponse::success(json!({ "mapping": mapping }))),
        None => Err(AppError::NotFound(
            "No practitioner linked to this user".to_string(),
        )),
    }
}

/// PUT /api/users/{userId}/practitioner - 409 when already linked under another organization.
pub async fn onboard_practitioner(
    State(state): State<AppState>,
    _auth: Authenticated,
    Path(user_id): Path<String>,
    payload: Result<Json<OnboardRequest>, JsonRejection>,
) -> Result<ApiResponse<Value>, AppError> {
    let Json(body) = payload.map_err(|e| AppError::Validation(e.body_text()))?;
    let onboarding = state
        .practitioner_service
        .onboard(
            &user_id,
            &body.practitioner_id,
            body.organization_id.as_deref(),
        )
        .await?;

    Ok(ApiResponse::success(json!({
        "mapping": onboarding.mapping,
        "roleAssigned": onboarding.role_assigned,
    })))
}
