//! Application error type mapping to HTTP status codes and the error envelope.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use carebot_types::error::{ChatError, MappingError, SessionError};

/// Application-level error that maps to HTTP responses.
#[derive(Debug)]
pub enum AppError {
    Validation(String),
    NotFound(String),
    Unauthorized(String),
    Conflict(String),
    /// A dependency (the database) is unreachable.
    Unavailable(String),
    Internal(String),
}

impl AppError {
    fn parts(&self) -> (StatusCode, &'static str, &str) {
        match self {
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg),
            AppError::Unavailable(msg) => {
                (StatusCode::SERVICE_UNAVAILABLE, "SERVICE_UNAVAILABLE", msg)
            }
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", msg),
        }
    }
}

impl From<ChatError> for AppError {
    fn from(e: ChatError) -> Self {
        match e {
            ChatError::Validation(msg) => AppError::Validation(msg),
            ChatError::NotFound(msg) => AppError::NotFound(msg),
            ChatError::Ai(msg) => AppError::Internal(msg),
            ChatError::Repository(e) => AppError::Internal(e.to_string()),
            ChatError::Session(e) => AppError::from(e),
        }
    }
}

impl From<MappingError> for AppError {
    fn from(e: MappingError) -> Self {
        match e {
            MappingError::Validation(msg) => AppError::Validation(msg),
            MappingError::NotFound(msg) => AppError::NotFound(msg),
            MappingError::Conflict(msg) => AppError::Conflict(msg),
            MappingError::Repository(e) => AppError::Internal(e.to_string()),
        }
    }
}

impl From<SessionError> for AppError {
    fn from(e: SessionError) -> Self {
        AppError::Internal(e.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = self.parts();

        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), code, "{message}");
        }

        let body = json!({
            "success": false,
            "error": code,
            "message": message,
            "timestamp": chrono::Utc::now().to_rfc3339(),
        });

        (
            status,
            [(axum::http::header::CONTENT_TYPE, "application/json")],
            body.to_string(),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use carebot_types::error::RepositoryError;

    #[test]
    fn test_chat_error_mapping() {
        assert!(matches!(
            AppError::from(ChatError::Validation("empty".into())),
            AppError::Validation(_)
        ));
        assert!(matches!(
            AppError::from(ChatError::NotFound("gone".into())),
            AppError::NotFound(_)
        ));
        assert!(matches!(
            AppError::from(ChatError::Ai("busy".into())),
            AppError::Internal(_)
        ));
        assert!(matches!(
            AppError::from(ChatError::Repository(RepositoryError::Connection)),
            AppError::Internal(_)
        ));
    }

    #[test]
    fn test_mapping_conflict_is_409() {
        let err = AppError::from(MappingError::Conflict("org mismatch".into()));
        assert_eq!(err.into_response().status(), StatusCode::CONFLICT);
    }

    #[test]
    fn test_status_codes() {
        let cases = [
            (AppError::Validation(String::new()), StatusCode::BAD_REQUEST),
            (AppError::NotFound(String::new()), StatusCode::NOT_FOUND),
            (AppError::Unauthorized(String::new()), StatusCode::UNAUTHORIZED),
            (AppError::Unavailable(String::new()), StatusCode::SERVICE_UNAVAILABLE),
            (AppError::Internal(String::new()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(err.into_response().status(), status);
        }
    }
}
