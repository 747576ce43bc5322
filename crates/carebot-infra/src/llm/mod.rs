//! LLM provider implementations.
//!
//! Contains the OpenAI-compatible implementation of the [`LlmProvider`]
//! trait defined in `carebot-core`, and the factories that turn an
//! [`AiConfig`] into a ready [`AiAssistant`].
//!
//! [`LlmProvider`]: carebot_core::llm::provider::LlmProvider

pub mod openai_compat;

use std::time::Duration;

use secrecy::ExposeSecret;
use tracing::{info, warn};

use carebot_core::llm::assistant::AiAssistant;
use carebot_core::llm::box_provider::BoxLlmProvider;
use carebot_types::config::AiConfig;
use carebot_types::llm::{AiProviderKind, LlmError};

use self::openai_compat::OpenAiCompatibleProvider;

/// Create a [`BoxLlmProvider`] for the configured provider.
///
/// # Errors
///
/// `LlmError::NotConfigured` when the selected provider has no (or an empty)
/// API key.
pub fn create_provider(config: &AiConfig) -> Result<BoxLlmProvider, LlmError> {
    let (key, model) = config.active_credentials();
    let key = key
        .map(|k| k.expose_secret())
        .filter(|k| !k.trim().is_empty())
        .ok_or_else(|| LlmError::NotConfigured(format!("no API key for {}", config.provider)))?;

    let provider = match config.provider {
        AiProviderKind::OpenAi => OpenAiCompatibleProvider::openai(key, model),
        AiProviderKind::Gemini => OpenAiCompatibleProvider::gemini(key, model),
    };
    Ok(BoxLlmProvider::new(provider))
}

/// Build the chat assistant from configuration.
///
/// A missing key is not fatal: the assistant is built without a provider
/// and answers every turn with the not-configured message.
pub fn build_assistant(config: &AiConfig) -> AiAssistant {
    let provider = match create_provider(config) {
        Ok(provider) => {
            info!(provider = %config.provider, model = provider.model(), "AI provider configured");
            Some(provider)
        }
        Err(e) => {
            warn!(provider = %config.provider, error = %e, "AI provider unavailable");
            None
        }
    };

    AiAssistant::new(provider, config.provider.to_string())
        .with_timeout(Duration::from_secs(config.timeout_secs))
        .with_sampling(config.max_tokens, Some(config.temperature))
        .with_history_window(config.history_window, config.history_token_budget)
}
