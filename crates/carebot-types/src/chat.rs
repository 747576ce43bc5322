//! Conversation and message types for carebot.
//!
//! A conversation is the durable, non-expiring record of a chat session's
//! turns. There is exactly one conversation per session id; messages are
//! append-only and owned by their conversation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use std::fmt;
use std::str::FromStr;

// Chat messages carry the same roles as LLM messages.
pub use crate::llm::MessageRole;

/// Lifecycle status of a conversation.
///
/// Maps to the CHECK constraint in the SQLite schema:
/// `CHECK (status IN ('active', 'ended'))`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversationStatus {
    #[default]
    Active,
    Ended,
}

impl fmt::Display for ConversationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConversationStatus::Active => write!(f, "active"),
            ConversationStatus::Ended => write!(f, "ended"),
        }
    }
}

impl FromStr for ConversationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "active" => Ok(ConversationStatus::Active),
            "ended" => Ok(ConversationStatus::Ended),
            other => Err(format!("invalid conversation status: '{other}'")),
        }
    }
}

/// The durable record of one session's chat.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: Uuid,
    pub session_id: String,
    pub patient_id: Option<String>,
    pub start_time: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub status: ConversationStatus,
    pub metadata: serde_json::Value,
}

/// A single persisted chat turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub role: MessageRole,
    pub content: String,
    pub metadata: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    /// A new message stamped now, with a time-ordered id.
    pub fn new(
        conversation_id: Uuid,
        role: MessageRole,
        content: impl Into<String>,
        metadata: Option<serde_json::Value>,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            conversation_id,
            role,
            content: content.into(),
            metadata: metadata.unwrap_or_else(|| serde_json::json!({})),
            timestamp: Utc::now(),
        }
    }
}

/// A conversation together with its full, ordered message list.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationWithMessages {
    pub conversation: Conversation,
    pub messages: Vec<ChatMessage>,
}

/// A patient chat message as received from a client.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncomingMessage {
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

impl IncomingMessage {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            metadata: None,
        }
    }
}

/// The assistant's answer to one processed message.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatReply {
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub conversation_id: Uuid,
}

/// Aggregate numbers for the stats endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatStats {
    pub active_sessions: u64,
    pub ai_provider: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversation_status_roundtrip() {
        for status in [ConversationStatus::Active, ConversationStatus::Ended] {
            let parsed: ConversationStatus = status.to_string().parse().unwrap();
            assert_eq!(status, parsed);
        }
    }

    #[test]
    fn test_conversation_status_serde() {
        let json = serde_json::to_string(&ConversationStatus::Ended).unwrap();
        assert_eq!(json, "\"ended\"");
    }

    #[test]
    fn test_incoming_message_metadata_optional() {
        let msg: IncomingMessage = serde_json::from_str(r#"{"content":"hi"}"#).unwrap();
        assert_eq!(msg.content, "hi");
        assert!(msg.metadata.is_none());
    }

    #[test]
    fn test_chat_reply_serializes_camel_case() {
        let reply = ChatReply {
            message: "hello".to_string(),
            timestamp: Utc::now(),
            conversation_id: Uuid::now_v7(),
        };
        let json = serde_json::to_value(&reply).unwrap();
        assert!(json.get("conversationId").is_some());
    }

    #[test]
    fn test_chat_message_new_defaults_metadata() {
        let conv = Uuid::now_v7();
        let msg = ChatMessage::new(conv, MessageRole::Assistant, "hello", None);
        assert_eq!(msg.conversation_id, conv);
        assert_eq!(msg.metadata, serde_json::json!({}));
    }

    #[test]
    fn test_chat_message_serialize() {
        let msg = ChatMessage {
            id: Uuid::now_v7(),
            conversation_id: Uuid::now_v7(),
            role: MessageRole::User,
            content: "I have a headache".to_string(),
            metadata: serde_json::json!({}),
            timestamp: Utc::now(),
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"role\":\"user\""));
        assert!(json.contains("\"conversationId\""));
    }
}
