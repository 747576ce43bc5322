//! Axum router configuration with middleware.
//!
//! Routes: `/health`, `/health/db`, `/ws`, and the JSON API under `/api`.
//! Middleware: CORS (from the configured origin list) and request tracing.

use axum::Router;
use axum::http::HeaderValue;
use axum::routing::get;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::http::handlers::{conversation, health, mapping, practitioner, ws};
use crate::state::AppState;

/// Build the complete router with all routes and middleware.
pub fn build_router(state: AppState, cors_origin: &str) -> Router {
    let api_routes = Router::new()
        // Conversations
        .route("/conversations/stats", get(conversation::get_stats))
        .route(
            "/conversations/{session_id}",
            get(conversation::get_conversation).delete(conversation::end_conversation),
        )
        .route(
            "/conversations/patients/{patient_id}",
            get(conversation::get_patient_history),
        )
        // User ↔ patient mappings
        .route(
            "/users/{user_id}/patients",
            get(mapping::list_patients).post(mapping::add_patient),
        )
        .route(
            "/users/{user_id}/patients/primary",
            get(mapping::get_primary_patient).delete(mapping::remove_patient_named_primary),
        )
        .route(
            "/users/{user_id}/patients/{patient_id}",
            axum::routing::delete(mapping::remove_patient),
        )
        .route(
            "/users/{user_id}/patients/{patient_id}/primary",
            get(mapping::is_primary).put(mapping::set_primary_patient),
        )
        .route(
            "/users/{user_id}/patients/{patient_id}/access",
            get(mapping::has_access),
        )
        .route("/patients/{patient_id}/users", get(mapping::list_users))
        // Practitioners
        .route(
            "/users/{user_id}/practitioner",
            get(practitioner::get_practitioner).put(practitioner::onboard_practitioner),
        );

    Router::new()
        .nest("/api", api_routes)
        .route("/health", get(health::health))
        .route("/health/db", get(health::health_db))
        .route("/ws", get(ws::ws_handler))
        .layer(cors_layer(cors_origin))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// `*` allows any origin; otherwise a comma-separated origin list.
fn cors_layer(cors_origin: &str) -> CorsLayer {
    let base = CorsLayer::new().allow_methods(Any).allow_headers(Any);

    if cors_origin.trim() == "*" {
        return base.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = cors_origin
        .split(',')
        .map(str::trim)
        .filter(|o| !o.is_empty())
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = o, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    base.allow_origin(AllowOrigin::list(origins))
}
