//! LlmProvider trait definition.
//!
//! This is the core abstraction that chat completion backends implement.
//! Uses RPITIT for `complete`; `BoxLlmProvider` provides the object-safe
//! wrapper used for runtime provider selection.

use carebot_types::llm::{CompletionRequest, CompletionResponse, LlmError, ProviderCapabilities};

/// Trait for LLM provider backends (OpenAI, Gemini).
///
/// Uses native async fn in traits (RPITIT, Rust 2024 edition).
/// Implementations live in carebot-infra (e.g., `OpenAiCompatibleProvider`).
pub trait LlmProvider: Send + Sync {
    /// Human-readable provider name (e.g., "openai", "gemini").
    fn name(&self) -> &str;

    /// The model used when a request leaves `model` empty.
    fn model(&self) -> &str;

    /// Context and output limits of the configured model.
    fn capabilities(&self) -> &ProviderCapabilities;

    /// Send a completion request and receive the full response.
    fn complete(
        &self,
        request: &CompletionRequest,
    ) -> impl std::future::Future<Output = Result<CompletionResponse, LlmError>> + Send;
}
