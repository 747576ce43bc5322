//! WebSocket chat endpoint.
//!
//! `GET /ws?sessionId=…&patientId=…` upgrades to a WebSocket. On connect the
//! session and its conversation are loaded (or created) and a `connected`
//! event is sent. Each socket then processes client frames serially in one
//! task:
//!
//! - `message` → `typing{isTyping:true}`, the chat turn, `typing{isTyping:false}`,
//!   then `response` or `error`
//! - `getHistory` → `history`
//! - `typing` → logged
//! - `ping` → `pong`
//!
//! Malformed frames produce an `error` event and the socket stays open. A
//! WebSocket ping frame is sent every [`HEARTBEAT_INTERVAL`]. Disconnecting
//! leaves the session and conversation in place for resume; a turn already
//! in flight still completes and persists.

use std::fmt::Display;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use chrono::{DateTime, Utc};
use futures_util::{Sink, SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use carebot_types::chat::{ChatMessage, Conversation, IncomingMessage};
use carebot_types::error::ChatError;

use crate::http::extractors::query::WsQuery;
use crate::state::AppState;

pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

const CONNECTED_MESSAGE: &str = "Connected to the healthcare assistant";
const PROCESSING_FAILED_MESSAGE: &str = "Failed to process message";

/// Event sent to the client.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ServerEvent {
    Connected {
        session_id: String,
        conversation_id: Uuid,
        message: String,
        timestamp: DateTime<Utc>,
    },
    Response {
        message: String,
        timestamp: DateTime<Utc>,
        conversation_id: Uuid,
    },
    Typing {
        is_typing: bool,
    },
    Error {
        message: String,
        timestamp: DateTime<Utc>,
    },
    History {
        success: bool,
        conversation: Option<Conversation>,
        messages: Vec<ChatMessage>,
    },
    Pong,
}

impl ServerEvent {
    fn error(message: impl Into<String>) -> Self {
        ServerEvent::Error {
            message: message.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Event received from the client.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ClientEvent {
    Message {
        content: String,
        #[serde(default)]
        metadata: Option<serde_json::Value>,
    },
    Typing {
        #[serde(default)]
        is_typing: bool,
    },
    GetHistory,
    Ping,
}

/// Identity of one connected socket.
#[derive(Debug, Clone)]
pub struct WsSession {
    pub session_id: String,
    pub patient_id: Option<String>,
}

impl WsSession {
    /// Missing or blank `sessionId` gets a freshly generated id.
    pub fn from_query(query: WsQuery) -> Self {
        let session_id = query
            .session_id
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| Uuid::now_v7().to_string());
        let patient_id = query.patient_id.filter(|p| !p.trim().is_empty());
        Self {
            session_id,
            patient_id,
        }
    }
}

/// Upgrade an HTTP request to a chat WebSocket.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Query(query): Query<WsQuery>,
) -> impl IntoResponse {
    let session = WsSession::from_query(query);
    ws.on_upgrade(move |socket| handle_ws_connection(socket, state, session))
}

async fn handle_ws_connection(socket: WebSocket, state: AppState, session: WsSession) {
    let (mut ws_sender, mut ws_receiver) = socket.split();
    let session_id = session.session_id.as_str();

    if !connect(&state, &session, &mut ws_sender).await {
        return;
    }

    let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
    heartbeat.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    // The first tick completes immediately.
    heartbeat.tick().await;

    loop {
        tokio::select! {
            _ = heartbeat.tick() => {
                if ws_sender.send(Message::Ping(Default::default())).await.is_err() {
                    break;
                }
            }

            msg_result = ws_receiver.next() => {
                match msg_result {
                    Some(Ok(Message::Text(text))) => {
                        if !handle_frame(&state, &session, text.as_str(), &mut ws_sender).await {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(err)) => {
                        tracing::debug!(session_id, "WebSocket receive error: {err}");
                        break;
                    }
                    // Binary, ping and pong frames are handled by axum/tungstenite
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    tracing::info!(session_id, "WebSocket disconnected");
}

/// Load or create the session and conversation, then announce `connected`.
///
/// Returns false when the socket should close.
async fn connect<S, E>(state: &AppState, session: &WsSession, sender: &mut S) -> bool
where
    S: Sink<Message, Error = E> + Unpin,
    E: Display,
{
    let session_id = session.session_id.as_str();
    match state
        .chat_service
        .start_session(session_id, session.patient_id.as_deref())
        .await
    {
        Ok((_, conversation)) => {
            tracing::info!(
                session_id,
                conversation_id = %conversation.id,
                patient_id = ?session.patient_id,
                "WebSocket connected"
            );
            send_event(
                sender,
                &ServerEvent::Connected {
                    session_id: session.session_id.clone(),
                    conversation_id: conversation.id,
                    message: CONNECTED_MESSAGE.to_string(),
                    timestamp: Utc::now(),
                },
            )
            .await
        }
        Err(e) => {
            tracing::error!(session_id, error = %e, "Failed to start chat session");
            let _ = send_event(sender, &ServerEvent::error("Failed to start chat session")).await;
            false
        }
    }
}

/// Process one text frame. Returns false once the client is gone.
pub async fn handle_frame<S, E>(
    state: &AppState,
    session: &WsSession,
    text: &str,
    sender: &mut S,
) -> bool
where
    S: Sink<Message, Error = E> + Unpin,
    E: Display,
{
    let session_id = session.session_id.as_str();

    let event: ClientEvent = match serde_json::from_str(text) {
        Ok(event) => event,
        Err(err) => {
            tracing::warn!(session_id, error = %err, "Ignoring malformed WebSocket frame");
            return send_event(sender, &ServerEvent::error("Invalid message format")).await;
        }
    };

    match event {
        ClientEvent::Message { content, metadata } => {
            let _ = send_event(sender, &ServerEvent::Typing { is_typing: true }).await;

            // Runs to completion even when the client has already left.
            let result = state
                .chat_service
                .process_message(
                    session_id,
                    IncomingMessage { content, metadata },
                    session.patient_id.as_deref(),
                )
                .await;

            if !send_event(sender, &ServerEvent::Typing { is_typing: false }).await {
                return false;
            }

            let reply = match result {
                Ok(reply) => ServerEvent::Response {
                    message: reply.message,
                    timestamp: reply.timestamp,
                    conversation_id: reply.conversation_id,
                },
                Err(e) => ServerEvent::error(chat_error_message(session_id, e)),
            };
            send_event(sender, &reply).await
        }
        ClientEvent::GetHistory => {
            let event = match state.chat_service.get_conversation_history(session_id).await {
                Ok(Some(found)) => ServerEvent::History {
                    success: true,
                    conversation: Some(found.conversation),
                    messages: found.messages,
                },
                Ok(None) => ServerEvent::History {
                    success: true,
                    conversation: None,
                    messages: Vec::new(),
                },
                Err(e) => {
                    tracing::error!(session_id, error = %e, "Failed to load history");
                    ServerEvent::error("Failed to load conversation history")
                }
            };
            send_event(sender, &event).await
        }
        ClientEvent::Typing { is_typing } => {
            tracing::debug!(session_id, is_typing, "Client typing indicator");
            true
        }
        ClientEvent::Ping => send_event(sender, &ServerEvent::Pong).await,
    }
}

/// Text shown to the patient for a failed turn.
fn chat_error_message(session_id: &str, err: ChatError) -> String {
    match err {
        ChatError::Validation(msg) | ChatError::Ai(msg) => msg,
        other => {
            tracing::error!(session_id, error = %other, "Chat turn failed");
            PROCESSING_FAILED_MESSAGE.to_string()
        }
    }
}

async fn send_event<S, E>(sender: &mut S, event: &ServerEvent) -> bool
where
    S: Sink<Message, Error = E> + Unpin,
    E: Display,
{
    let json = match serde_json::to_string(event) {
        Ok(json) => json,
        Err(err) => {
            tracing::warn!("Failed to serialize WebSocket event: {err}");
            return true;
        }
    };

    match sender.send(Message::Text(json.into())).await {
        Ok(()) => true,
        Err(err) => {
            tracing::debug!("WebSocket send failed (client disconnecting): {err}");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{test_state, test_state_with};
    use serde_json::{Value, json};
    use std::pin::Pin;
    use std::task::{Context, Poll};

    /// Sink that keeps every frame it is given.
    #[derive(Default)]
    struct RecordingSink(Vec<Message>);

    impl Sink<Message> for RecordingSink {
        type Error = std::convert::Infallible;

        fn poll_ready(self: Pin<&mut Self>, _: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
            Poll::Ready(Ok(()))
        }

        fn start_send(mut self: Pin<&mut Self>, item: Message) -> Result<(), Self::Error> {
            self.0.push(item);
            Ok(())
        }

        fn poll_flush(self: Pin<&mut Self>, _: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
            Poll::Ready(Ok(()))
        }

        fn poll_close(self: Pin<&mut Self>, _: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
            Poll::Ready(Ok(()))
        }
    }

    fn session(id: &str) -> WsSession {
        WsSession {
            session_id: id.to_string(),
            patient_id: Some("patient-1".to_string()),
        }
    }

    fn frames(sent: &[Message]) -> Vec<Value> {
        sent.iter()
            .map(|m| match m {
                Message::Text(text) => serde_json::from_str(text.as_str()).unwrap(),
                other => panic!("unexpected frame {other:?}"),
            })
            .collect()
    }

    #[test]
    fn test_server_event_wire_format() {
        let value = serde_json::to_value(ServerEvent::Typing { is_typing: true }).unwrap();
        assert_eq!(value, json!({"type": "typing", "isTyping": true}));

        let value = serde_json::to_value(ServerEvent::Pong).unwrap();
        assert_eq!(value, json!({"type": "pong"}));
    }

    #[test]
    fn test_client_event_parsing() {
        let event: ClientEvent =
            serde_json::from_str(r#"{"type":"message","content":"hi"}"#).unwrap();
        assert!(matches!(event, ClientEvent::Message { ref content, metadata: None } if content == "hi"));

        let event: ClientEvent = serde_json::from_str(r#"{"type":"getHistory"}"#).unwrap();
        assert!(matches!(event, ClientEvent::GetHistory));

        let event: ClientEvent =
            serde_json::from_str(r#"{"type":"typing","isTyping":true}"#).unwrap();
        assert!(matches!(event, ClientEvent::Typing { is_typing: true }));
    }

    #[test]
    fn test_missing_session_id_is_generated() {
        let s = WsSession::from_query(WsQuery {
            session_id: Some("  ".to_string()),
            patient_id: None,
        });
        assert!(Uuid::parse_str(&s.session_id).is_ok());

        let s = WsSession::from_query(WsQuery {
            session_id: Some("s1".to_string()),
            patient_id: Some("p1".to_string()),
        });
        assert_eq!(s.session_id, "s1");
        assert_eq!(s.patient_id.as_deref(), Some("p1"));
    }

    #[tokio::test]
    async fn test_connect_announces_conversation() {
        let state = test_state().await;
        let mut sent = RecordingSink::default();

        assert!(connect(&state, &session("s1"), &mut sent).await);

        let events = frames(&sent.0);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0]["type"], "connected");
        assert_eq!(events[0]["sessionId"], "s1");
        assert!(events[0]["conversationId"].is_string());
    }

    #[tokio::test]
    async fn test_message_turn_sequence() {
        let state = test_state_with("Rest and drink water.").await;
        let mut sent = RecordingSink::default();

        let frame = r#"{"type":"message","content":"I have a headache"}"#;
        assert!(handle_frame(&state, &session("s1"), frame, &mut sent).await);

        let events = frames(&sent.0);
        let types: Vec<&str> = events.iter().map(|e| e["type"].as_str().unwrap()).collect();
        assert_eq!(types, ["typing", "typing", "response"]);
        assert_eq!(events[0]["isTyping"], true);
        assert_eq!(events[1]["isTyping"], false);
        assert_eq!(events[2]["message"], "Rest and drink water.");
    }

    #[tokio::test]
    async fn test_empty_message_yields_error_event() {
        let state = test_state().await;
        let mut sent = RecordingSink::default();

        let frame = r#"{"type":"message","content":"   "}"#;
        assert!(handle_frame(&state, &session("s1"), frame, &mut sent).await);

        let events = frames(&sent.0);
        let last = events.last().unwrap();
        assert_eq!(last["type"], "error");
        assert_eq!(last["message"], "Message content cannot be empty");
    }

    #[tokio::test]
    async fn test_unconfigured_provider_error_event() {
        let state = test_state().await;
        let mut sent = RecordingSink::default();

        let frame = r#"{"type":"message","content":"hello"}"#;
        assert!(handle_frame(&state, &session("s1"), frame, &mut sent).await);

        let events = frames(&sent.0);
        let last = events.last().unwrap();
        assert_eq!(last["type"], "error");
        assert_eq!(
            last["message"],
            carebot_core::llm::assistant::NOT_CONFIGURED_MESSAGE
        );
    }

    #[tokio::test]
    async fn test_malformed_frame_keeps_socket_open() {
        let state = test_state().await;
        let mut sent = RecordingSink::default();

        assert!(handle_frame(&state, &session("s1"), "not json", &mut sent).await);
        assert!(handle_frame(&state, &session("s1"), r#"{"type":"ping"}"#, &mut sent).await);

        let events = frames(&sent.0);
        assert_eq!(events[0]["type"], "error");
        assert_eq!(events[1]["type"], "pong");
    }

    #[tokio::test]
    async fn test_get_history_after_turn() {
        let state = test_state_with("Noted.").await;
        let mut sent = RecordingSink::default();
        let s = session("s1");

        handle_frame(&state, &s, r#"{"type":"message","content":"hi"}"#, &mut sent).await;
        sent.0.clear();
        handle_frame(&state, &s, r#"{"type":"getHistory"}"#, &mut sent).await;

        let events = frames(&sent.0);
        assert_eq!(events[0]["type"], "history");
        assert_eq!(events[0]["success"], true);
        assert_eq!(events[0]["messages"].as_array().unwrap().len(), 2);
        assert_eq!(events[0]["messages"][0]["role"], "user");
    }

    #[tokio::test]
    async fn test_get_history_unknown_session_is_empty() {
        let state = test_state().await;
        let mut sent = RecordingSink::default();

        handle_frame(&state, &session("nobody"), r#"{"type":"getHistory"}"#, &mut sent).await;

        let events = frames(&sent.0);
        assert_eq!(events[0]["type"], "history");
        assert!(events[0]["conversation"].is_null());
        assert_eq!(events[0]["messages"], json!([]));
    }
}
