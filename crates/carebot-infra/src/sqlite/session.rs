//! SQLite session repository implementation.
//!
//! Payloads are stored as JSON text; `expires_at` is integer Unix
//! milliseconds so expiry checks are plain integer comparisons.

use carebot_core::session::repository::SessionRepository;
use carebot_types::error::RepositoryError;
use chrono::{DateTime, Utc};

use super::pool::DatabasePool;
use super::query_error;

/// SQLite-backed implementation of `SessionRepository`.
pub struct SqliteSessionRepository {
    pool: DatabasePool,
}

impl SqliteSessionRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

impl SessionRepository for SqliteSessionRepository {
    async fn upsert(
        &self,
        session_id: &str,
        data: &serde_json::Value,
        expires_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"INSERT INTO sessions (session_id, data, expires_at)
               VALUES (?, ?, ?)
               ON CONFLICT(session_id) DO UPDATE SET
                   data = excluded.data,
                   expires_at = excluded.expires_at"#,
        )
        .bind(session_id)
        .bind(data.to_string())
        .bind(expires_at.timestamp_millis())
        .execute(&self.pool.writer)
        .await
        .map_err(query_error)?;

        Ok(())
    }

    async fn get_live(
        &self,
        session_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<serde_json::Value>, RepositoryError> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT data FROM sessions WHERE session_id = ? AND expires_at > ?")
                .bind(session_id)
                .bind(now.timestamp_millis())
                .fetch_optional(&self.pool.reader)
                .await
                .map_err(query_error)?;

        row.map(|(data,)| {
            serde_json::from_str(&data)
                .map_err(|e| RepositoryError::Query(format!("invalid session data: {e}")))
        })
        .transpose()
    }

    async fn delete(&self, session_id: &str) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM sessions WHERE session_id = ?")
            .bind(session_id)
            .execute(&self.pool.writer)
            .await
            .map_err(query_error)?;

        Ok(())
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64, RepositoryError> {
        let result = sqlx::query("DELETE FROM sessions WHERE expires_at <= ?")
            .bind(now.timestamp_millis())
            .execute(&self.pool.writer)
            .await
            .map_err(query_error)?;

        Ok(result.rows_affected())
    }

    async fn extend(
        &self,
        session_id: &str,
        seconds: i64,
        now: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            "UPDATE sessions SET expires_at = expires_at + ? WHERE session_id = ? AND expires_at > ?",
        )
        .bind(seconds.saturating_mul(1000))
        .bind(session_id)
        .bind(now.timestamp_millis())
        .execute(&self.pool.writer)
        .await
        .map_err(query_error)?;

        Ok(result.rows_affected() > 0)
    }

    async fn count_live(&self, now: DateTime<Utc>) -> Result<u64, RepositoryError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM sessions WHERE expires_at > ?")
            .bind(now.timestamp_millis())
            .fetch_one(&self.pool.reader)
            .await
            .map_err(query_error)?;

        Ok(count as u64)
    }
}
