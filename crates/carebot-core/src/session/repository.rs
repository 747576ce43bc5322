//! SessionRepository trait definition.
//!
//! Sessions are stored as opaque JSON payloads keyed by session id, each with
//! an absolute expiry. Callers pass `now` explicitly so expiry decisions are
//! made against one clock reading per operation.

use carebot_types::error::RepositoryError;
use chrono::{DateTime, Utc};

/// Repository trait for session persistence.
///
/// Implementations live in carebot-infra (e.g., `SqliteSessionRepository`).
pub trait SessionRepository: Send + Sync {
    /// Insert or replace the payload and expiry for `session_id`.
    fn upsert(
        &self,
        session_id: &str,
        data: &serde_json::Value,
        expires_at: DateTime<Utc>,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Payload for `session_id` if it expires strictly after `now`.
    fn get_live(
        &self,
        session_id: &str,
        now: DateTime<Utc>,
    ) -> impl std::future::Future<Output = Result<Option<serde_json::Value>, RepositoryError>> + Send;

    /// Remove the row. A missing row is not an error.
    fn delete(
        &self,
        session_id: &str,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Delete every row with `expires_at <= now`, returning how many.
    fn delete_expired(
        &self,
        now: DateTime<Utc>,
    ) -> impl std::future::Future<Output = Result<u64, RepositoryError>> + Send;

    /// Push the expiry of a live row out by `seconds`. Returns whether a row
    /// was extended.
    fn extend(
        &self,
        session_id: &str,
        seconds: i64,
        now: DateTime<Utc>,
    ) -> impl std::future::Future<Output = Result<bool, RepositoryError>> + Send;

    /// Number of rows that expire after `now`.
    fn count_live(
        &self,
        now: DateTime<Utc>,
    ) -> impl std::future::Future<Output = Result<u64, RepositoryError>> + Send;
}
