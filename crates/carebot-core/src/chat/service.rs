//! Chat service orchestrating one patient chat turn.
//!
//! ChatService coordinates the ConversationRepository, the SessionService and
//! the AiAssistant: it persists the patient's message, replays the
//! conversation to the provider, persists the reply and keeps the session's
//! counters current.

use std::sync::Arc;

use carebot_types::chat::{
    ChatMessage, ChatReply, ChatStats, Conversation, ConversationStatus, ConversationWithMessages,
    IncomingMessage, MessageRole,
};
use carebot_types::error::ChatError;
use carebot_types::llm::Message;
use carebot_types::session::SessionState;
use tracing::{debug, info, warn};

use super::repository::ConversationRepository;
use crate::llm::assistant::AiAssistant;
use crate::session::repository::SessionRepository;
use crate::session::service::SessionService;

/// Default number of conversations returned by patient history.
pub const DEFAULT_HISTORY_LIMIT: u32 = 10;
/// Upper bound on conversations returned by patient history.
pub const MAX_HISTORY_LIMIT: u32 = 100;

/// Clamp a requested history limit to `1..=MAX_HISTORY_LIMIT`.
pub fn clamp_history_limit(limit: Option<u32>) -> u32 {
    limit
        .unwrap_or(DEFAULT_HISTORY_LIMIT)
        .clamp(1, MAX_HISTORY_LIMIT)
}

/// Orchestrates the chat lifecycle for a session.
///
/// Generic over `ConversationRepository` and `SessionRepository` so
/// carebot-core never depends on carebot-infra.
pub struct ChatService<C: ConversationRepository, S: SessionRepository> {
    conversations: C,
    sessions: Arc<SessionService<S>>,
    assistant: AiAssistant,
}

impl<C: ConversationRepository, S: SessionRepository> ChatService<C, S> {
    pub fn new(conversations: C, sessions: Arc<SessionService<S>>, assistant: AiAssistant) -> Self {
        Self {
            conversations,
            sessions,
            assistant,
        }
    }

    pub fn sessions(&self) -> &Arc<SessionService<S>> {
        &self.sessions
    }

    pub fn assistant(&self) -> &AiAssistant {
        &self.assistant
    }

    /// Load or create the session and its conversation for a new connection.
    pub async fn start_session(
        &self,
        session_id: &str,
        patient_id: Option<&str>,
    ) -> Result<(SessionState, Conversation), ChatError> {
        require_session_id(session_id)?;

        let session = match self.sessions.get(session_id).await? {
            Some(existing) => {
                debug!(session_id, "Resuming session");
                existing
            }
            None => {
                let fresh = SessionState::new(session_id, patient_id.map(str::to_string));
                self.sessions.set(session_id, &fresh, None).await?;
                info!(session_id, patient_id = ?patient_id, "Session created");
                fresh
            }
        };

        let patient = patient_id.or(session.patient_id.as_deref());
        let conversation = self.conversations.get_or_create(session_id, patient).await?;

        Ok((session, conversation))
    }

    /// Process one patient message and return the assistant's reply.
    ///
    /// Empty content is rejected before anything is written. When the
    /// provider fails the user message stays persisted and
    /// `ChatError::Ai` carries the patient-facing text.
    pub async fn process_message(
        &self,
        session_id: &str,
        incoming: IncomingMessage,
        patient_id: Option<&str>,
    ) -> Result<ChatReply, ChatError> {
        require_session_id(session_id)?;
        if incoming.content.trim().is_empty() {
            return Err(ChatError::Validation(
                "Message content cannot be empty".to_string(),
            ));
        }

        let conversation = self
            .conversations
            .get_or_create(session_id, patient_id)
            .await?;

        let user_message = ChatMessage::new(
            conversation.id,
            MessageRole::User,
            incoming.content.clone(),
            incoming.metadata,
        );
        self.conversations.add_message(&user_message).await?;

        let history: Vec<Message> = self
            .conversations
            .get_messages(&conversation.id)
            .await?
            .into_iter()
            .filter(|m| m.id != user_message.id && m.role != MessageRole::System)
            .map(|m| Message {
                role: m.role,
                content: m.content,
            })
            .collect();

        let reply = self
            .assistant
            .chat_with_ai(&incoming.content, &history)
            .await;
        let Some(text) = reply.response.filter(|_| reply.success) else {
            let message = reply
                .error
                .unwrap_or_else(|| "AI assistant returned no response".to_string());
            warn!(session_id, conversation_id = %conversation.id, "Chat turn failed at provider");
            return Err(ChatError::Ai(message));
        };

        let assistant_message = ChatMessage::new(
            conversation.id,
            MessageRole::Assistant,
            text,
            Some(serde_json::json!({
                "ai_provider": self.assistant.provider_name(),
                "model": self.assistant.model(),
            })),
        );
        self.conversations.add_message(&assistant_message).await?;

        let mut session = match self.sessions.get(session_id).await? {
            Some(session) => session,
            None => SessionState::new(session_id, patient_id.map(str::to_string)),
        };
        session.record_message();
        self.sessions.set(session_id, &session, None).await?;

        info!(
            session_id,
            conversation_id = %conversation.id,
            message_count = session.message_count,
            "Chat turn completed"
        );

        Ok(ChatReply {
            message: assistant_message.content,
            timestamp: assistant_message.timestamp,
            conversation_id: conversation.id,
        })
    }

    /// The session's conversation with all messages, oldest first.
    pub async fn get_conversation_history(
        &self,
        session_id: &str,
    ) -> Result<Option<ConversationWithMessages>, ChatError> {
        Ok(self.conversations.get_with_messages(session_id).await?)
    }

    /// A patient's conversations, most recent activity first.
    pub async fn get_patient_history(
        &self,
        patient_id: &str,
        limit: Option<u32>,
    ) -> Result<Vec<Conversation>, ChatError> {
        if patient_id.trim().is_empty() {
            return Err(ChatError::Validation("patientId is required".to_string()));
        }
        Ok(self
            .conversations
            .get_patient_history(patient_id, clamp_history_limit(limit))
            .await?)
    }

    /// Mark the conversation ended and drop its session.
    ///
    /// Ending an already ended conversation succeeds.
    pub async fn end_conversation(&self, session_id: &str) -> Result<(), ChatError> {
        let Some(conversation) = self.conversations.find_by_session_id(session_id).await? else {
            return Err(ChatError::NotFound(format!(
                "Conversation not found for session '{session_id}'"
            )));
        };

        if conversation.status != ConversationStatus::Ended {
            self.conversations
                .update_status(session_id, ConversationStatus::Ended)
                .await?;
        }
        self.sessions.delete(session_id).await?;

        info!(session_id, conversation_id = %conversation.id, "Conversation ended");
        Ok(())
    }

    pub async fn get_stats(&self) -> Result<ChatStats, ChatError> {
        Ok(ChatStats {
            active_sessions: self.sessions.active_count().await?,
            ai_provider: self.assistant.provider_name().to_string(),
        })
    }
}

fn require_session_id(session_id: &str) -> Result<(), ChatError> {
    if session_id.trim().is_empty() {
        return Err(ChatError::Validation("sessionId is required".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::assistant::{BUSY_MESSAGE, NOT_CONFIGURED_MESSAGE};
    use crate::llm::box_provider::BoxLlmProvider;
    use crate::test_support::{
        InMemoryConversationRepository, InMemorySessionRepository, ScriptedProvider,
    };

    type TestService = ChatService<InMemoryConversationRepository, InMemorySessionRepository>;

    fn service_with(provider: Option<ScriptedProvider>) -> (TestService, InMemoryConversationRepository) {
        let conversations = InMemoryConversationRepository::default();
        let sessions = Arc::new(SessionService::new(InMemorySessionRepository::default()));
        let assistant = AiAssistant::new(provider.map(BoxLlmProvider::new), "gemini");
        (
            ChatService::new(conversations.clone(), sessions, assistant),
            conversations,
        )
    }

    fn service() -> (TestService, InMemoryConversationRepository) {
        service_with(Some(ScriptedProvider::replying("Try resting in a dark room.")))
    }

    #[tokio::test]
    async fn test_process_message_end_to_end() {
        let (svc, repo) = service();
        let reply = svc
            .process_message("s1", IncomingMessage::text("I have a headache"), Some("p1"))
            .await
            .unwrap();

        assert_eq!(reply.message, "Try resting in a dark room.");

        let history = svc.get_conversation_history("s1").await.unwrap().unwrap();
        assert_eq!(history.conversation.id, reply.conversation_id);
        assert_eq!(history.conversation.patient_id.as_deref(), Some("p1"));
        assert_eq!(history.messages.len(), 2);
        assert_eq!(history.messages[0].role, MessageRole::User);
        assert_eq!(history.messages[0].content, "I have a headache");
        assert_eq!(history.messages[1].role, MessageRole::Assistant);
        assert_eq!(history.messages[1].metadata["ai_provider"], "gemini");
        assert_eq!(history.messages[1].metadata["model"], "scripted-model");

        let session = svc.sessions().get("s1").await.unwrap().unwrap();
        assert_eq!(session.message_count, 1);
        assert_eq!(repo.message_writes(), 2);
    }

    #[tokio::test]
    async fn test_history_excludes_current_message() {
        let provider = ScriptedProvider::replying("ok");
        let seen = provider.requests();
        let (svc, _) = service_with(Some(provider));

        svc.process_message("s1", IncomingMessage::text("first"), None)
            .await
            .unwrap();
        svc.process_message("s1", IncomingMessage::text("second"), None)
            .await
            .unwrap();

        let requests = seen.lock().unwrap();
        let last = &requests[1];
        let contents: Vec<&str> = last.messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["first", "ok", "second"]);
    }

    #[tokio::test]
    async fn test_empty_message_writes_nothing() {
        let (svc, repo) = service();
        for content in ["", "   ", "\n\t"] {
            let err = svc
                .process_message("s1", IncomingMessage::text(content), None)
                .await
                .unwrap_err();
            assert!(matches!(err, ChatError::Validation(_)));
        }
        assert_eq!(repo.conversation_writes(), 0);
        assert_eq!(repo.message_writes(), 0);
        assert!(svc.sessions().get("s1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_provider_failure_keeps_user_message() {
        let (svc, _) = service_with(Some(ScriptedProvider::rate_limited()));
        let err = svc
            .process_message("s1", IncomingMessage::text("hello"), None)
            .await
            .unwrap_err();
        match err {
            ChatError::Ai(message) => assert_eq!(message, BUSY_MESSAGE),
            other => panic!("expected Ai error, got {other:?}"),
        }

        let history = svc.get_conversation_history("s1").await.unwrap().unwrap();
        assert_eq!(history.messages.len(), 1);
        assert_eq!(history.messages[0].role, MessageRole::User);
    }

    #[tokio::test]
    async fn test_unconfigured_provider() {
        let (svc, _) = service_with(None);
        let err = svc
            .process_message("s1", IncomingMessage::text("hello"), None)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), NOT_CONFIGURED_MESSAGE);
    }

    #[tokio::test]
    async fn test_expired_session_is_recreated_on_message() {
        let (svc, _) = service();
        let stale = SessionState::new("s1", None);
        svc.sessions().set("s1", &stale, Some(-1)).await.unwrap();

        svc.process_message("s1", IncomingMessage::text("hi"), None)
            .await
            .unwrap();
        let session = svc.sessions().get("s1").await.unwrap().unwrap();
        assert_eq!(session.message_count, 1);
    }

    #[tokio::test]
    async fn test_start_session_is_resumable() {
        let (svc, _) = service();
        let (session, conversation) = svc.start_session("s1", Some("p1")).await.unwrap();
        assert_eq!(session.message_count, 0);
        assert_eq!(conversation.status, ConversationStatus::Active);

        svc.process_message("s1", IncomingMessage::text("hi"), Some("p1"))
            .await
            .unwrap();

        let (session, again) = svc.start_session("s1", None).await.unwrap();
        assert_eq!(again.id, conversation.id);
        assert_eq!(session.message_count, 1);
        assert_eq!(session.patient_id.as_deref(), Some("p1"));
    }

    #[tokio::test]
    async fn test_start_session_requires_id() {
        let (svc, _) = service();
        let err = svc.start_session("  ", None).await.unwrap_err();
        assert!(matches!(err, ChatError::Validation(_)));
    }

    #[tokio::test]
    async fn test_end_conversation_twice() {
        let (svc, _) = service();
        svc.process_message("s1", IncomingMessage::text("hi"), None)
            .await
            .unwrap();

        svc.end_conversation("s1").await.unwrap();
        svc.end_conversation("s1").await.unwrap();

        let history = svc.get_conversation_history("s1").await.unwrap().unwrap();
        assert_eq!(history.conversation.status, ConversationStatus::Ended);
        assert!(svc.sessions().get("s1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_end_unknown_conversation() {
        let (svc, _) = service();
        let err = svc.end_conversation("ghost").await.unwrap_err();
        assert!(matches!(err, ChatError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_patient_history_and_stats() {
        let (svc, _) = service();
        svc.process_message("s1", IncomingMessage::text("a"), Some("p1"))
            .await
            .unwrap();
        svc.process_message("s2", IncomingMessage::text("b"), Some("p1"))
            .await
            .unwrap();
        svc.process_message("s3", IncomingMessage::text("c"), Some("p2"))
            .await
            .unwrap();

        let history = svc.get_patient_history("p1", None).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].session_id, "s2");

        let limited = svc.get_patient_history("p1", Some(1)).await.unwrap();
        assert_eq!(limited.len(), 1);

        let stats = svc.get_stats().await.unwrap();
        assert_eq!(stats.active_sessions, 3);
        assert_eq!(stats.ai_provider, "gemini");
    }

    #[test]
    fn test_clamp_history_limit() {
        assert_eq!(clamp_history_limit(None), 10);
        assert_eq!(clamp_history_limit(Some(0)), 1);
        assert_eq!(clamp_history_limit(Some(50)), 50);
        assert_eq!(clamp_history_limit(Some(1_000)), 100);
    }
}
