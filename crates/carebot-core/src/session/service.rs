//! Session service applying TTL rules over a `SessionRepository`.

use carebot_types::error::SessionError;
use carebot_types::session::{DEFAULT_SESSION_TTL_SECS, SessionState};
use chrono::{Duration, Utc};
use tracing::debug;

use super::repository::SessionRepository;

/// Reads and writes session state with expiry.
///
/// A session whose expiry is at or before the current time is treated as
/// absent, whether or not the sweeper has removed its row yet.
pub struct SessionService<R: SessionRepository> {
    repo: R,
    default_ttl_secs: i64,
}

impl<R: SessionRepository> SessionService<R> {
    pub fn new(repo: R) -> Self {
        Self {
            repo,
            default_ttl_secs: DEFAULT_SESSION_TTL_SECS,
        }
    }

    /// Override the TTL used when `set` is called without one.
    pub fn with_default_ttl(mut self, ttl_secs: i64) -> Self {
        self.default_ttl_secs = ttl_secs;
        self
    }

    /// Store `state` under `session_id`, expiring `ttl_secs` from now.
    pub async fn set(
        &self,
        session_id: &str,
        state: &SessionState,
        ttl_secs: Option<i64>,
    ) -> Result<(), SessionError> {
        let ttl = ttl_secs.unwrap_or(self.default_ttl_secs);
        let expires_at = Duration::try_seconds(ttl)
            .and_then(|d| Utc::now().checked_add_signed(d))
            .ok_or(SessionError::InvalidTtl(ttl))?;
        let data = serde_json::to_value(state)
            .map_err(|e| SessionError::Serialization(e.to_string()))?;

        self.repo.upsert(session_id, &data, expires_at).await?;
        Ok(())
    }

    /// Load a live session. Purges all expired rows first.
    pub async fn get(&self, session_id: &str) -> Result<Option<SessionState>, SessionError> {
        let now = Utc::now();
        let purged = self.repo.delete_expired(now).await?;
        if purged > 0 {
            debug!(purged, "Purged expired sessions on read");
        }

        match self.repo.get_live(session_id, now).await? {
            Some(data) => {
                let state = serde_json::from_value(data)
                    .map_err(|e| SessionError::Serialization(e.to_string()))?;
                Ok(Some(state))
            }
            None => Ok(None),
        }
    }

    pub async fn delete(&self, session_id: &str) -> Result<(), SessionError> {
        self.repo.delete(session_id).await?;
        Ok(())
    }

    /// Push a live session's expiry out by `seconds`.
    ///
    /// Returns `false` when the session is missing or already expired.
    pub async fn extend(&self, session_id: &str, seconds: i64) -> Result<bool, SessionError> {
        Ok(self.repo.extend(session_id, seconds, Utc::now()).await?)
    }

    /// Number of sessions that have not expired.
    pub async fn active_count(&self) -> Result<u64, SessionError> {
        Ok(self.repo.count_live(Utc::now()).await?)
    }

    /// Delete expired sessions, returning how many were removed.
    pub async fn cleanup_expired(&self) -> Result<u64, SessionError> {
        Ok(self.repo.delete_expired(Utc::now()).await?)
    }
}
