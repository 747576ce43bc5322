//! Test fixtures: application state over a throwaway SQLite database.

use carebot_core::llm::assistant::AiAssistant;
use carebot_core::llm::box_provider::BoxLlmProvider;
use carebot_core::llm::provider::LlmProvider;
use carebot_infra::sqlite::pool::DatabasePool;
use carebot_types::config::ServiceConfig;
use carebot_types::llm::{
    CompletionRequest, CompletionResponse, LlmError, ProviderCapabilities, StopReason, Usage,
};

use crate::state::AppState;

/// Provider that answers every request with the same text.
pub struct FixedReplyProvider {
    reply: String,
    capabilities: ProviderCapabilities,
}

impl FixedReplyProvider {
    pub fn new(reply: &str) -> Self {
        Self {
            reply: reply.to_string(),
            capabilities: ProviderCapabilities {
                max_context_tokens: 128_000,
                max_output_tokens: 4096,
            },
        }
    }
}

impl LlmProvider for FixedReplyProvider {
    fn name(&self) -> &str {
        "fixed"
    }

    fn model(&self) -> &str {
        "fixed-model"
    }

    fn capabilities(&self) -> &ProviderCapabilities {
        &self.capabilities
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse, LlmError> {
        Ok(CompletionResponse {
            id: "resp-1".to_string(),
            content: self.reply.clone(),
            model: request.model.clone(),
            stop_reason: StopReason::EndTurn,
            usage: Usage::default(),
        })
    }
}

async fn temp_pool() -> DatabasePool {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite://{}?mode=rwc", dir.path().join("api.db").display());
    // Leak tempdir so it lives for the test
    std::mem::forget(dir);
    DatabasePool::new(&url).await.unwrap()
}

/// State with no AI provider configured.
pub async fn test_state() -> AppState {
    state_with_config(ServiceConfig::default(), AiAssistant::new(None, "gemini")).await
}

/// State whose provider always answers `reply`.
pub async fn test_state_with(reply: &str) -> AppState {
    let assistant = AiAssistant::new(
        Some(BoxLlmProvider::new(FixedReplyProvider::new(reply))),
        "fixed",
    );
    state_with_config(ServiceConfig::default(), assistant).await
}

pub async fn state_with_config(config: ServiceConfig, assistant: AiAssistant) -> AppState {
    AppState::with_pool(&config, temp_pool().await, assistant)
}
