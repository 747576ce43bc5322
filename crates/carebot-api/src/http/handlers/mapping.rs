//! User ↔ patient mapping handlers.

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
pub struct AddPatientRequest {
    pub patient_id: String,
    #[serde(default)]
    pub is_primary: bool,
}

/// GET /api/users/{userId}/patients
pub async fn list_patients(
    State(state): State<AppState>,
    _auth: Authenticated,
    Path(user_id): Path<String>,
) -> Result<ApiResponse<Value>, AppError> {
    let patients = state.mapping_service.list_patients(&user_id).await?;
    Ok(ApiResponse::success(json!({ "patients": patients })))
}

/// POST /api/users/{userId}/patients
pub async fn add_patient(
    State(state): State<AppState>,
    _auth: Authenticated,
    Path(user_id): Path<String>,
    payload: Result<Json<AddPatientRequest>, JsonRejection>,
) -> Result<ApiResponse<Value>, AppError> {
    let Json(body) = payload.map_err(|e| AppError::Validation(e.body_text()))?;
    let mapping = state
        .mapping_service
        .add_patient_to_user(&user_id, &body.patient_id, body.is_primary)
        .await?;
    Ok(ApiResponse::created(json!({ "mapping": mapping })))
}

/// GET /api/users/{userId}/patients/primary
pub async fn get_primary_patient(
    State(state): State<AppState>,
    _auth: Authenticated,
    Path(user_id): Path<String>,
) -> Result<ApiResponse<Value>, AppError> {
    match state.mapping_service.get_primary_patient(&user_id).await? {
        Some(patient_id) => Ok(ApiResponse::success(json!({ "patientId": patient_id }))),
        None => Err(AppError::NotFound("No primary patient set".to_string())),
    }
}

/// GET /api/users/{userId}/patients/{patientId}/primary
pub async fn is_primary(
    State(state): State<AppState>,
    _auth: Authenticated,
    Path((user_id, patient_id)): Path<(String, String)>,
) -> Result<ApiResponse<Value>, AppError> {
    let is_primary = state.mapping_service.is_primary(&user_id, &patient_id).await?;
    Ok(ApiResponse::success(json!({ "isPrimary": is_primary })))
}

/// PUT /api/users/{userId}/patients/{patientId}/primary
pub async fn set_primary_patient(
    State(state): State<AppState>,
    _auth: Authenticated,
    Path((user_id, patient_id)): Path<(String, String)>,
) -> Result<ApiResponse<Value>, AppError> {
    let mapping = state
        .mapping_service
        .set_primary_patient(&user_id, &patient_id)
        .await?;
    Ok(ApiResponse::success(json!({ "mapping": mapping })))
}

/// GET /api/users/{userId}/patients/{patientId}/access
pub async fn has_access(
    State(state): State<AppState>,
    _auth: Authenticated,
    Path((user_id, patient_id)): Path<(String, String)>,
) -> Result<ApiResponse<Value>, AppError> {
    let has_access = state
        .mapping_service
        .has_access_to_patient(&user_id, &patient_id)
        .await?;
    Ok(ApiResponse::success(json!({ "hasAccess": has_access })))
}

/// DELETE /api/users/{userId}/patients/{patientId}
pub async fn remove_patient(
    State(state): State<AppState>,
    _auth: Authenticated,
    Path((user_id, patient_id)): Path<(String, String)>,
) -> Result<ApiResponse<Value>, AppError> {
    state
        .mapping_service
        .remove_patient(&user_id, &patient_id)
        .await?;
    Ok(ApiResponse::success(json!({ "message": "Patient removed from user" })))
}

/// DELETE /api/users/{userId}/patients/primary
///
/// The static `primary` route wins over `{patientId}`, so a patient whose id
/// is literally `primary` is removed here.
pub async fn remove_patient_named_primary(
    State(state): State<AppState>,
    auth: Authenticated,
    Path(user_id): Path<String>,
) -> Result<ApiResponse<Value>, AppError> {
    remove_patient(State(state), auth, Path((user_id, "primary".to_string()))).await
}

/// GET /api/patients/{patientId}/users
pub async fn list_users(
    State(state): State<AppState>,
    _auth: Authenticated,
    Path(patient_id): Path<String>,
) -> Result<ApiResponse<Value>, AppError> {
    let users = state.mapping_service.list_users(&patient_id).await?;
    Ok(ApiResponse::success(json!({ "users": users })))
}
