//! AiAssistant -- one-shot chat completion with user-facing failure messages.
//!
//! Wraps the configured provider (if any), applies the history window and the
//! request timeout, and folds every provider failure into one of three
//! messages that are safe to show to a patient.

use std::time::Duration;

use carebot_types::llm::{CompletionRequest, LlmError, Message};
use tracing::{Instrument, field, info_span, warn};

use super::box_provider::BoxLlmProvider;
use super::history::HistoryWindow;

pub const NOT_CONFIGURED_MESSAGE: &str =
    "The AI assistant is not configured. Please contact your care team for assistance.";
pub const BUSY_MESSAGE: &str = "The AI assistant is busy right now. Please try again in a moment.";
pub const GENERIC_FAILURE_MESSAGE: &str =
    "Sorry, I couldn't process your message right now. Please try again.";

/// System prompt sent ahead of every conversation.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a friendly assistant for a healthcare portal. \
    Answer patients' general questions clearly and briefly. You do not diagnose conditions or \
    prescribe treatment; for anything urgent or specific to the patient, advise them to contact \
    their care team or emergency services.";

/// Outcome of one assistant call.
///
/// Exactly one of `response` / `error` is set, matching `success`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AiReply {
    pub success: bool,
    pub response: Option<String>,
    pub error: Option<String>,
}

impl AiReply {
    fn ok(response: String) -> Self {
        Self {
            success: true,
            response: Some(response),
            error: None,
        }
    }

    fn failed(message: &str) -> Self {
        Self {
            success: false,
            response: None,
            error: Some(message.to_string()),
        }
    }
}

/// Map a provider failure to the message shown to the patient.
pub fn user_facing_message(err: &LlmError) -> &'static str {
    match err {
        LlmError::NotConfigured(_) | LlmError::AuthenticationFailed => NOT_CONFIGURED_MESSAGE,
        LlmError::RateLimited { .. } => BUSY_MESSAGE,
        _ => GENERIC_FAILURE_MESSAGE,
    }
}

/// Chat assistant bound to one provider configuration.
pub struct AiAssistant {
    provider: Option<BoxLlmProvider>,
    provider_name: String,
    max_tokens: u32,
    temperature: Option<f64>,
    timeout: Duration,
    window: HistoryWindow,
}

impl AiAssistant {
    /// `provider` is `None` when no API key is configured; every call then
    /// fails with the not-configured message.
    pub fn new(provider: Option<BoxLlmProvider>, provider_name: impl Into<String>) -> Self {
        Self {
            provider,
            provider_name: provider_name.into(),
            max_tokens: 1024,
            temperature: Some(0.7),
            timeout: Duration::from_secs(60),
            window: HistoryWindow::new(20, 8_000),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_sampling(mut self, max_tokens: u32, temperature: Option<f64>) -> Self {
        self.max_tokens = max_tokens;
        self.temperature = temperature;
        self
    }

    /// Set the history window, clamped to the provider's context size.
    pub fn with_history_window(mut self, max_messages: usize, token_budget: u32) -> Self {
        self.window = match &self.provider {
            Some(p) => HistoryWindow::for_provider(max_messages, token_budget, p.capabilities()),
            None => HistoryWindow::new(max_messages, token_budget),
        };
        self
    }

    /// Configured provider name ("openai" or "gemini").
    pub fn provider_name(&self) -> &str {
        &self.provider_name
    }

    /// Model that answers requests, if a provider is configured.
    pub fn model(&self) -> Option<&str> {
        self.provider.as_ref().map(|p| p.model())
    }

    pub fn is_configured(&self) -> bool {
        self.provider.is_some()
    }

    fn build_request(&self, model: &str, message: &str, history: &[Message]) -> CompletionRequest {
        let mut messages = self.window.apply(history);
        messages.push(Message::user(message));

        CompletionRequest {
            model: model.to_string(),
            messages,
            system: Some(DEFAULT_SYSTEM_PROMPT.to_string()),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        }
    }

    /// Send `message` with the prior `history` and return the reply.
    ///
    /// Never returns an error: failures are reported through
    /// [`AiReply::error`] with a patient-safe message.
    pub async fn chat_with_ai(&self, message: &str, history: &[Message]) -> AiReply {
        let Some(provider) = &self.provider else {
            warn!(provider = %self.provider_name, "AI provider has no API key configured");
            return AiReply::failed(NOT_CONFIGURED_MESSAGE);
        };

        let request = self.build_request(provider.model(), message, history);

        let span = info_span!(
            "gen_ai.chat",
            gen_ai.operation.name = "chat",
            gen_ai.provider.name = %self.provider_name,
            gen_ai.request.model = %request.model,
            gen_ai.request.max_tokens = request.max_tokens,
            gen_ai.request.temperature = ?request.temperature,
            history_messages = request.messages.len() - 1,
            gen_ai.usage.input_tokens = field::Empty,
            gen_ai.usage.output_tokens = field::Empty,
            gen_ai.response.finish_reasons = field::Empty,
        );

        let timeout_secs = self.timeout.as_secs();
        let result = async {
            match tokio::time::timeout(self.timeout, provider.complete(&request)).await {
                Ok(result) => result,
                Err(_) => Err(LlmError::Timeout(timeout_secs)),
            }
        }
        .instrument(span.clone())
        .await;

        match result {
            Ok(response) => {
                span.record("gen_ai.usage.input_tokens", response.usage.input_tokens);
                span.record("gen_ai.usage.output_tokens", response.usage.output_tokens);
                span.record(
                    "gen_ai.response.finish_reasons",
                    field::display(&response.stop_reason),
                );
                AiReply::ok(response.content)
            }
            Err(err) => {
                warn!(parent: &span, provider = %self.provider_name, error = %err, "AI provider call failed");
                AiReply::failed(user_facing_message(&err))
            }
        }
    }
}
