//! SQLite conversation repository implementation.
//!
//! Implements `ConversationRepository` from `carebot-core` with raw queries,
//! private Row structs, and the split reader/writer pool. Message appends run
//! in a writer transaction together with the conversation's activity bump.

use carebot_core::chat::repository::ConversationRepository;
use carebot_types::chat::{
    ChatMessage, Conversation, ConversationStatus, ConversationWithMessages, MessageRole,
};
use carebot_types::error::RepositoryError;
use chrono::Utc;
use sqlx::Row;
use uuid::Uuid;

use super::pool::DatabasePool;
use super::{format_datetime, parse_datetime, query_error};

/// SQLite-backed implementation of `ConversationRepository`.
pub struct SqliteConversationRepository {
    pool: DatabasePool,
}

impl SqliteConversationRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }

    async fn messages_for(&self, conversation_id: &Uuid) -> Result<Vec<ChatMessage>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT * FROM messages WHERE conversation_id = ? ORDER BY timestamp ASC, id ASC",
        )
        .bind(conversation_id.to_string())
        .fetch_all(&self.pool.reader)
        .await
        .map_err(query_error)?;

        let mut messages = Vec::with_capacity(rows.len());
        for row in &rows {
            messages.push(MessageRow::from_row(row).map_err(query_error)?.into_message()?);
        }
        Ok(messages)
    }
}

// ---------------------------------------------------------------------------
// Private Row types for SQLite-to-domain mapping
// ---------------------------------------------------------------------------

struct ConversationRow {
    id: String,
    session_id: String,
    patient_id: Option<String>,
    start_time: String,
    last_activity: String,
    status: String,
    metadata: String,
}

impl ConversationRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            session_id: row.try_get("session_id")?,
            patient_id: row.try_get("patient_id")?,
            start_time: row.try_get("start_time")?,
            last_activity: row.try_get("last_activity")?,
            status: row.try_get("status")?,
            metadata: row.try_get("metadata")?,
        })
    }

    fn into_conversation(self) -> Result<Conversation, RepositoryError> {
        let id = Uuid::parse_str(&self.id)
            .map_err(|e| RepositoryError::Query(format!("invalid conversation id: {e}")))?;
        let status: ConversationStatus = self
            .status
            .parse()
            .map_err(|e: String| RepositoryError::Query(e))?;

        Ok(Conversation {
            id,
            session_id: self.session_id,
            patient_id: self.patient_id,
            start_time: parse_datetime(&self.start_time)?,
            last_activity: parse_datetime(&self.last_activity)?,
            status,
            metadata: parse_json(&self.metadata)?,
        })
    }
}

struct MessageRow {
    id: String,
    conversation_id: String,
    role: String,
    content: String,
    metadata: String,
    timestamp: String,
}

impl MessageRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            conversation_id: row.try_get("conversation_id")?,
            role: row.try_get("role")?,
            content: row.try_get("content")?,
            metadata: row.try_get("metadata")?,
            timestamp: row.try_get("timestamp")?,
        })
    }

    fn into_message(self) -> Result<ChatMessage, RepositoryError> {
        let id = Uuid::parse_str(&self.id)
            .map_err(|e| RepositoryError::Query(format!("invalid message id: {e}")))?;
        let conversation_id = Uuid::parse_str(&self.conversation_id)
            .map_err(|e| RepositoryError::Query(format!("invalid conversation_id: {e}")))?;
        let role: MessageRole = self
            .role
            .parse()
            .map_err(|e: String| RepositoryError::Query(e))?;

        Ok(ChatMessage {
            id,
            conversation_id,
            role,
            content: self.content,
            metadata: parse_json(&self.metadata)?,
            timestamp: parse_datetime(&self.timestamp)?,
        })
    }
}

fn parse_json(s: &str) -> Result<serde_json::Value, RepositoryError> {
    serde_json::from_str(s).map_err(|e| RepositoryError::Query(format!("invalid metadata: {e}")))
}

// ---------------------------------------------------------------------------
// ConversationRepository implementation
// ---------------------------------------------------------------------------

impl ConversationRepository for SqliteConversationRepository {
    async fn create(
        &self,
        session_id: &str,
        patient_id: Option<&str>,
    ) -> Result<Conversation, RepositoryError> {
        let now = Utc::now();
        let conversation = Conversation {
            id: Uuid::now_v7(),
            session_id: session_id.to_string(),
            patient_id: patient_id.map(str::to_string),
            start_time: now,
            last_activity: now,
            status: ConversationStatus::Active,
            metadata: serde_json::json!({}),
        };

        sqlx::query(
            r#"INSERT INTO conversations (id, session_id, patient_id, start_time, last_activity, status, metadata)
               VALUES (?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(conversation.id.to_string())
        .bind(&conversation.session_id)
        .bind(&conversation.patient_id)
        .bind(format_datetime(&conversation.start_time))
        .bind(format_datetime(&conversation.last_activity))
        .bind(conversation.status.to_string())
        .bind(conversation.metadata.to_string())
        .execute(&self.pool.writer)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db) if db.is_unique_violation() => RepositoryError::Conflict(
                format!("conversation already exists for session '{session_id}'"),
            ),
            other => query_error(other),
        })?;

        Ok(conversation)
    }

    async fn get_or_create(
        &self,
        session_id: &str,
        patient_id: Option<&str>,
    ) -> Result<Conversation, RepositoryError> {
        let now = format_datetime(&Utc::now());

        sqlx::query(
            r#"INSERT INTO conversations (id, session_id, patient_id, start_time, last_activity, status, metadata)
               VALUES (?, ?, ?, ?, ?, 'active', '{}')
               ON CONFLICT(session_id) DO NOTHING"#,
        )
        .bind(Uuid::now_v7().to_string())
        .bind(session_id)
        .bind(patient_id)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool.writer)
        .await
        .map_err(query_error)?;

        self.find_by_session_id(session_id)
            .await?
            .ok_or(RepositoryError::NotFound)
    }

    async fn find_by_session_id(
        &self,
        session_id: &str,
    ) -> Result<Option<Conversation>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM conversations WHERE session_id = ?")
            .bind(session_id)
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(query_error)?;

        match row {
            Some(row) => {
                let conv_row = ConversationRow::from_row(&row).map_err(query_error)?;
                Ok(Some(conv_row.into_conversation()?))
            }
            None => Ok(None),
        }
    }

    async fn add_message(&self, message: &ChatMessage) -> Result<(), RepositoryError> {
        let mut tx = self.pool.writer.begin().await.map_err(query_error)?;

        let exists: Option<(i64,)> = sqlx::query_as("SELECT 1 FROM conversations WHERE id = ?")
            .bind(message.conversation_id.to_string())
            .fetch_optional(&mut *tx)
            .await
            .map_err(query_error)?;
        if exists.is_none() {
            return Err(RepositoryError::NotFound);
        }

        let timestamp = format_datetime(&message.timestamp);

        sqlx::query(
            r#"INSERT INTO messages (id, conversation_id, role, content, metadata, timestamp)
               VALUES (?, ?, ?, ?, ?, ?)"#,
        )
        .bind(message.id.to_string())
        .bind(message.conversation_id.to_string())
        .bind(message.role.to_string())
        .bind(&message.content)
        .bind(message.metadata.to_string())
        .bind(&timestamp)
        .execute(&mut *tx)
        .await
        .map_err(query_error)?;

        sqlx::query("UPDATE conversations SET last_activity = ? WHERE id = ?")
            .bind(&timestamp)
            .bind(message.conversation_id.to_string())
            .execute(&mut *tx)
            .await
            .map_err(query_error)?;

        tx.commit().await.map_err(query_error)?;

        Ok(())
    }

    async fn get_messages(&self, conversation_id: &Uuid) -> Result<Vec<ChatMessage>, RepositoryError> {
        self.messages_for(conversation_id).await
    }

    async fn get_with_messages(
        &self,
        session_id: &str,
    ) -> Result<Option<ConversationWithMessages>, RepositoryError> {
        let Some(conversation) = self.find_by_session_id(session_id).await? else {
            return Ok(None);
        };
        let messages = self.messages_for(&conversation.id).await?;

        Ok(Some(ConversationWithMessages {
            conversation,
            messages,
        }))
    }

    async fn update_status(
        &self,
        session_id: &str,
        status: ConversationStatus,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query("UPDATE conversations SET status = ? WHERE session_id = ?")
            .bind(status.to_string())
            .bind(session_id)
            .execute(&self.pool.writer)
            .await
            .map_err(query_error)?;

        Ok(result.rows_affected() > 0)
    }

    async fn get_patient_history(
        &self,
        patient_id: &str,
        limit: u32,
    ) -> Result<Vec<Conversation>, RepositoryError> {
        let rows = sqlx::query(
            r#"SELECT * FROM conversations
               WHERE patient_id = ?
               ORDER BY last_activity DESC, id DESC
               LIMIT ?"#,
        )
        .bind(patient_id)
        .bind(i64::from(limit))
        .fetch_all(&self.pool.reader)
        .await
        .map_err(query_error)?;

        let mut conversations = Vec::with_capacity(rows.len());
        for row in &rows {
            let conv_row = ConversationRow::from_row(row).map_err(query_error)?;
            conversations.push(conv_row.into_conversation()?);
        }
        Ok(conversations)
    }

    async fn get_message_count(&self, conversation_id: &Uuid) -> Result<u64, RepositoryError> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM messages WHERE conversation_id = ?")
                .bind(conversation_id.to_string())
                .fetch_one(&self.pool.reader)
                .await
                .map_err(query_error)?;

        Ok(count as u64)
    }
}
