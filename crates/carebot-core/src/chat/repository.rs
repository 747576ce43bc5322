//! ConversationRepository trait definition.
//!
//! Conversations are keyed by a unique session id; messages are append-only
//! and ordered by timestamp (id breaks ties). Follows the RPITIT pattern of
//! the other repository ports.

use carebot_types::chat::{ChatMessage, Conversation, ConversationStatus, ConversationWithMessages};
use carebot_types::error::RepositoryError;
use uuid::Uuid;

/// Repository trait for conversation and message persistence.
///
/// Implementations live in carebot-infra (e.g., `SqliteConversationRepository`).
pub trait ConversationRepository: Send + Sync {
    /// Insert a new active conversation.
    ///
    /// Returns `RepositoryError::Conflict` if one already exists for
    /// `session_id`.
    fn create(
        &self,
        session_id: &str,
        patient_id: Option<&str>,
    ) -> impl std::future::Future<Output = Result<Conversation, RepositoryError>> + Send;

    /// Return the conversation for `session_id`, creating it if absent.
    ///
    /// Concurrent callers for the same session converge on one row.
    fn get_or_create(
        &self,
        session_id: &str,
        patient_id: Option<&str>,
    ) -> impl std::future::Future<Output = Result<Conversation, RepositoryError>> + Send;

    fn find_by_session_id(
        &self,
        session_id: &str,
    ) -> impl std::future::Future<Output = Result<Option<Conversation>, RepositoryError>> + Send;

    /// Append a message and bump the conversation's `last_activity` in one
    /// transaction.
    ///
    /// Returns `RepositoryError::NotFound` (and writes nothing) when the
    /// conversation does not exist.
    fn add_message(
        &self,
        message: &ChatMessage,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Messages of a conversation, oldest first.
    fn get_messages(
        &self,
        conversation_id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Vec<ChatMessage>, RepositoryError>> + Send;

    fn get_with_messages(
        &self,
        session_id: &str,
    ) -> impl std::future::Future<Output = Result<Option<ConversationWithMessages>, RepositoryError>>
    + Send;

    /// Set the status of the session's conversation. Returns whether a row
    /// matched.
    fn update_status(
        &self,
        session_id: &str,
        status: ConversationStatus,
    ) -> impl std::future::Future<Output = Result<bool, RepositoryError>> + Send;

    /// A patient's conversations, most recent activity first.
    fn get_patient_history(
        &self,
        patient_id: &str,
        limit: u32,
    ) -> impl std::future::Future<Output = Result<Vec<Conversation>, RepositoryError>> + Send;

    fn get_message_count(
        &self,
        conversation_id: &Uuid,
    ) -> impl std::future::Future<Output = Result<u64, RepositoryError>> + Send;
}
