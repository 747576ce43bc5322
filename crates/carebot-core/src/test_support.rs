//! In-memory port implementations shared by the service tests.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use carebot_types::chat::{ChatMessage, Conversation, ConversationStatus, ConversationWithMessages};
use carebot_types::error::{IdentityError, RepositoryError};
use carebot_types::llm::{
    CompletionRequest, CompletionResponse, LlmError, ProviderCapabilities, StopReason, Usage,
};
use carebot_types::mapping::{UserPatientMapping, UserPractitionerMapping};
use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::chat::repository::ConversationRepository;
use crate::llm::provider::LlmProvider;
use crate::mapping::identity::IdentityAdmin;
use crate::mapping::repository::{PatientMappingRepository, PractitionerMappingRepository};
use crate::session::repository::SessionRepository;

// --- Sessions ---

#[derive(Clone, Default)]
pub struct InMemorySessionRepository {
    rows: Arc<Mutex<HashMap<String, (serde_json::Value, DateTime<Utc>)>>>,
    failing_sweeps: Arc<AtomicU32>,
}

impl InMemorySessionRepository {
    pub fn len(&self) -> usize {
        self.rows.lock().unwrap().len()
    }

    /// Make the next `n` calls to `delete_expired` fail.
    pub fn fail_next_sweeps(&self, n: u32) {
        self.failing_sweeps.store(n, Ordering::SeqCst);
    }
}

impl SessionRepository for InMemorySessionRepository {
    async fn upsert(
        &self,
        session_id: &str,
        data: &serde_json::Value,
        expires_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        self.rows
            .lock()
            .unwrap()
            .insert(session_id.to_string(), (data.clone(), expires_at));
        Ok(())
    }

    async fn get_live(
        &self,
        session_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<serde_json::Value>, RepositoryError> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .get(session_id)
            .filter(|(_, expires_at)| *expires_at > now)
            .map(|(data, _)| data.clone()))
    }

    async fn delete(&self, session_id: &str) -> Result<(), RepositoryError> {
        self.rows.lock().unwrap().remove(session_id);
        Ok(())
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64, RepositoryError> {
        let pending = self.failing_sweeps.load(Ordering::SeqCst);
        if pending > 0 {
            self.failing_sweeps.store(pending - 1, Ordering::SeqCst);
            return Err(RepositoryError::Query("database is locked".to_string()));
        }
        let mut rows = self.rows.lock().unwrap();
        let before = rows.len();
        rows.retain(|_, (_, expires_at)| *expires_at > now);
        Ok((before - rows.len()) as u64)
    }

    async fn extend(
        &self,
        session_id: &str,
        seconds: i64,
        now: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        let mut rows = self.rows.lock().unwrap();
        match rows.get_mut(session_id) {
            Some((_, expires_at)) if *expires_at > now => {
                *expires_at += Duration::seconds(seconds);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn count_live(&self, now: DateTime<Utc>) -> Result<u64, RepositoryError> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .values()
            .filter(|(_, expires_at)| *expires_at > now)
            .count() as u64)
    }
}

// --- Conversations ---

#[derive(Default)]
struct ConversationTables {
    conversations: Vec<Conversation>,
    messages: Vec<ChatMessage>,
}

#[derive(Clone, Default)]
pub struct InMemoryConversationRepository {
    tables: Arc<Mutex<ConversationTables>>,
    conversation_writes: Arc<AtomicUsize>,
    message_writes: Arc<AtomicUsize>,
}

impl InMemoryConversationRepository {
    pub fn conversation_writes(&self) -> usize {
        self.conversation_writes.load(Ordering::SeqCst)
    }

    pub fn message_writes(&self) -> usize {
        self.message_writes.load(Ordering::SeqCst)
    }

    fn insert(&self, tables: &mut ConversationTables, session_id: &str, patient_id: Option<&str>) -> Conversation {
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
        tables.conversations.push(conversation.clone());
        self.conversation_writes.fetch_add(1, Ordering::SeqCst);
        conversation
    }
}

fn ordered_messages(tables: &ConversationTables, conversation_id: &Uuid) -> Vec<ChatMessage> {
    let mut messages: Vec<ChatMessage> = tables
        .messages
        .iter()
        .filter(|m| m.conversation_id == *conversation_id)
        .cloned()
        .collect();
    messages.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then(a.id.cmp(&b.id)));
    messages
}

impl ConversationRepository for InMemoryConversationRepository {
    async fn create(
        &self,
        session_id: &str,
        patient_id: Option<&str>,
    ) -> Result<Conversation, RepositoryError> {
        let mut tables = self.tables.lock().unwrap();
        if tables.conversations.iter().any(|c| c.session_id == session_id) {
            return Err(RepositoryError::Conflict(format!(
                "conversation exists for session '{session_id}'"
            )));
        }
        Ok(self.insert(&mut tables, session_id, patient_id))
    }

    async fn get_or_create(
        &self,
        session_id: &str,
        patient_id: Option<&str>,
    ) -> Result<Conversation, RepositoryError> {
        let mut tables = self.tables.lock().unwrap();
        if let Some(existing) = tables.conversations.iter().find(|c| c.session_id == session_id) {
            return Ok(existing.clone());
        }
        Ok(self.insert(&mut tables, session_id, patient_id))
    }

    async fn find_by_session_id(
        &self,
        session_id: &str,
    ) -> Result<Option<Conversation>, RepositoryError> {
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .conversations
            .iter()
            .find(|c| c.session_id == session_id)
            .cloned())
    }

    async fn add_message(&self, message: &ChatMessage) -> Result<(), RepositoryError> {
        let mut tables = self.tables.lock().unwrap();
        let conversation = tables
            .conversations
            .iter_mut()
            .find(|c| c.id == message.conversation_id)
            .ok_or(RepositoryError::NotFound)?;
        conversation.last_activity = message.timestamp;
        tables.messages.push(message.clone());
        self.message_writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn get_messages(&self, conversation_id: &Uuid) -> Result<Vec<ChatMessage>, RepositoryError> {
        let tables = self.tables.lock().unwrap();
        Ok(ordered_messages(&tables, conversation_id))
    }

    async fn get_with_messages(
        &self,
        session_id: &str,
    ) -> Result<Option<ConversationWithMessages>, RepositoryError> {
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .conversations
            .iter()
            .find(|c| c.session_id == session_id)
            .map(|c| ConversationWithMessages {
                conversation: c.clone(),
                messages: ordered_messages(&tables, &c.id),
            }))
    }

    async fn update_status(
        &self,
        session_id: &str,
        status: ConversationStatus,
    ) -> Result<bool, RepositoryError> {
        let mut tables = self.tables.lock().unwrap();
        match tables.conversations.iter_mut().find(|c| c.session_id == session_id) {
            Some(c) => {
                c.status = status;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn get_patient_history(
        &self,
        patient_id: &str,
        limit: u32,
    ) -> Result<Vec<Conversation>, RepositoryError> {
        let tables = self.tables.lock().unwrap();
        let mut found: Vec<Conversation> = tables
            .conversations
            .iter()
            .filter(|c| c.patient_id.as_deref() == Some(patient_id))
            .cloned()
            .collect();
        found.sort_by(|a, b| b.last_activity.cmp(&a.last_activity).then(b.id.cmp(&a.id)));
        found.truncate(limit as usize);
        Ok(found)
    }

    async fn get_message_count(&self, conversation_id: &Uuid) -> Result<u64, RepositoryError> {
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .messages
            .iter()
            .filter(|m| m.conversation_id == *conversation_id)
            .count() as u64)
    }
}

// --- LLM ---

#[derive(Clone)]
enum Script {
    Reply(String),
    RateLimited,
}

/// Provider that returns a fixed outcome and records every request.
pub struct ScriptedProvider {
    script: Script,
    capabilities: ProviderCapabilities,
    requests: Arc<Mutex<Vec<CompletionRequest>>>,
}

impl ScriptedProvider {
    fn with_script(script: Script) -> Self {
        Self {
            script,
            capabilities: ProviderCapabilities {
                max_context_tokens: 128_000,
                max_output_tokens: 4_096,
            },
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn replying(content: &str) -> Self {
        Self::with_script(Script::Reply(content.to_string()))
    }

    pub fn rate_limited() -> Self {
        Self::with_script(Script::RateLimited)
    }

    pub fn requests(&self) -> Arc<Mutex<Vec<CompletionRequest>>> {
        self.requests.clone()
    }
}

impl LlmProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    fn model(&self) -> &str {
        "scripted-model"
    }

    fn capabilities(&self) -> &ProviderCapabilities {
        &self.capabilities
    }

    fn complete(
        &self,
        request: &CompletionRequest,
    ) -> impl Future<Output = Result<CompletionResponse, LlmError>> + Send {
        self.requests.lock().unwrap().push(request.clone());
        let script = self.script.clone();
        async move {
            match script {
                Script::Reply(content) => Ok(CompletionResponse {
                    id: format!("resp-{}", Uuid::now_v7()),
                    content,
                    model: "scripted-model".to_string(),
                    stop_reason: StopReason::EndTurn,
                    usage: Usage::default(),
                }),
                Script::RateLimited => Err(LlmError::RateLimited {
                    retry_after_ms: None,
                }),
            }
        }
    }
}

// --- Mappings ---

#[derive(Clone, Default)]
pub struct InMemoryPatientMappingRepository {
    rows: Arc<Mutex<Vec<UserPatientMapping>>>,
}

impl PatientMappingRepository for InMemoryPatientMappingRepository {
    async fn upsert(
        &self,
        iam_user_id: &str,
        fhir_patient_id: &str,
        is_primary: bool,
    ) -> Result<UserPatientMapping, RepositoryError> {
        let mut rows = self.rows.lock().unwrap();
        let now = Utc::now();
        if is_primary {
            for row in rows.iter_mut().filter(|r| r.iam_user_id == iam_user_id) {
                row.is_primary = false;
            }
        }
        if let Some(row) = rows
            .iter_mut()
            .find(|r| r.iam_user_id == iam_user_id && r.fhir_patient_id == fhir_patient_id)
        {
            row.is_primary = is_primary;
            row.updated_at = now;
            return Ok(row.clone());
        }
        let row = UserPatientMapping {
            iam_user_id: iam_user_id.to_string(),
            fhir_patient_id: fhir_patient_id.to_string(),
            is_primary,
            created_at: now,
            updated_at: now,
        };
        rows.push(row.clone());
        Ok(row)
    }

    async fn find(
        &self,
        iam_user_id: &str,
        fhir_patient_id: &str,
    ) -> Result<Option<UserPatientMapping>, RepositoryError> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.iam_user_id == iam_user_id && r.fhir_patient_id == fhir_patient_id)
            .cloned())
    }

    async fn list_for_user(&self, iam_user_id: &str) -> Result<Vec<UserPatientMapping>, RepositoryError> {
        let mut found: Vec<UserPatientMapping> = self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.iam_user_id == iam_user_id)
            .cloned()
            .collect();
        found.sort_by(|a, b| b.is_primary.cmp(&a.is_primary).then(a.created_at.cmp(&b.created_at)));
        Ok(found)
    }

    async fn list_for_patient(
        &self,
        fhir_patient_id: &str,
    ) -> Result<Vec<UserPatientMapping>, RepositoryError> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.fhir_patient_id == fhir_patient_id)
            .cloned()
            .collect())
    }

    async fn remove(&self, iam_user_id: &str, fhir_patient_id: &str) -> Result<bool, RepositoryError> {
        let mut rows = self.rows.lock().unwrap();
        let before = rows.len();
        rows.retain(|r| !(r.iam_user_id == iam_user_id && r.fhir_patient_id == fhir_patient_id));
        Ok(rows.len() < before)
    }

    async fn set_primary(
        &self,
        iam_user_id: &str,
        fhir_patient_id: &str,
    ) -> Result<Option<UserPatientMapping>, RepositoryError> {
        let mut rows = self.rows.lock().unwrap();
        if !rows
            .iter()
            .any(|r| r.iam_user_id == iam_user_id && r.fhir_patient_id == fhir_patient_id)
        {
            return Ok(None);
        }
        let mut chosen = None;
        for row in rows.iter_mut().filter(|r| r.iam_user_id == iam_user_id) {
            row.is_primary = row.fhir_patient_id == fhir_patient_id;
            if row.is_primary {
                row.updated_at = Utc::now();
                chosen = Some(row.clone());
            }
        }
        Ok(chosen)
    }

    async fn get_primary(&self, iam_user_id: &str) -> Result<Option<UserPatientMapping>, RepositoryError> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.iam_user_id == iam_user_id && r.is_primary)
            .cloned())
    }
}

#[derive(Clone, Default)]
pub struct InMemoryPractitionerMappingRepository {
    rows: Arc<Mutex<HashMap<String, UserPractitionerMapping>>>,
}

impl PractitionerMappingRepository for InMemoryPractitionerMappingRepository {
    async fn upsert(
        &self,
        iam_user_id: &str,
        fhir_practitioner_id: &str,
        organization_id: Option<&str>,
    ) -> Result<UserPractitionerMapping, RepositoryError> {
        let mut rows = self.rows.lock().unwrap();
        let now = Utc::now();
        match rows.get_mut(iam_user_id) {
            Some(row) => {
                if let (Some(stored), Some(requested)) = (row.organization_id.as_deref(), organization_id) {
                    if stored != requested {
                        return Err(RepositoryError::Conflict(format!(
                            "user '{iam_user_id}' already belongs to organization '{stored}'"
                        )));
                    }
                }
                row.fhir_practitioner_id = fhir_practitioner_id.to_string();
                if row.organization_id.is_none() {
                    row.organization_id = organization_id.map(str::to_string);
                }
                row.updated_at = now;
                Ok(row.clone())
            }
            None => {
                let row = UserPractitionerMapping {
                    iam_user_id: iam_user_id.to_string(),
                    fhir_practitioner_id: fhir_practitioner_id.to_string(),
                    organization_id: organization_id.map(str::to_string),
                    created_at: now,
                    updated_at: now,
                };
                rows.insert(iam_user_id.to_string(), row.clone());
                Ok(row)
            }
        }
    }

    async fn find(&self, iam_user_id: &str) -> Result<Option<UserPractitionerMapping>, RepositoryError> {
        Ok(self.rows.lock().unwrap().get(iam_user_id).cloned())
    }
}

/// Identity admin that records calls and either succeeds or fails.
pub struct StubIdentityAdmin {
    succeed: bool,
    calls: Arc<Mutex<Vec<(String, String)>>>,
}

impl StubIdentityAdmin {
    pub fn succeeding() -> Self {
        Self {
            succeed: true,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn failing() -> Self {
        Self {
            succeed: false,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn calls(&self) -> Arc<Mutex<Vec<(String, String)>>> {
        self.calls.clone()
    }
}

impl IdentityAdmin for StubIdentityAdmin {
    async fn assign_realm_role(&self, user_id: &str, role: &str) -> Result<(), IdentityError> {
        self.calls
            .lock()
            .unwrap()
            .push((user_id.to_string(), role.to_string()));
        if self.succeed {
            Ok(())
        } else {
            Err(IdentityError::Request("503 Service Unavailable".to_string()))
        }
    }
}
