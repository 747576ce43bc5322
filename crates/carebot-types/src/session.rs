//! Chat session state.
//!
//! A session is the transient, TTL-bounded record of one client's chat
//! connection, keyed by an opaque client-supplied id. It is stored as a JSON
//! blob next to an expiry timestamp; the durable record of the chat lives in
//! the conversation tables instead.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Default session lifetime: 30 minutes.
pub const DEFAULT_SESSION_TTL_SECS: i64 = 1800;

/// Payload stored for a live session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
    pub session_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patient_id: Option<String>,
    pub start_time: DateTime<Utc>,
    #[serde(default)]
    pub message_count: u32,
    pub last_activity: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<serde_json::Value>,
}

impl SessionState {
    /// A fresh session starting now with no messages.
    pub fn new(session_id: impl Into<String>, patient_id: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            session_id: session_id.into(),
            patient_id,
            start_time: now,
            message_count: 0,
            last_activity: now,
            context: None,
        }
    }

    /// Record one processed message.
    pub fn record_message(&mut self) {
        self.message_count += 1;
        self.last_activity = Utc::now();
    }
}
