//! Conversation history windowing.
//!
//! Replaying an entire conversation on every turn makes latency and cost
//! grow with conversation length. `HistoryWindow` keeps the most recent
//! messages only, bounded by a message count and an approximate token budget.

use carebot_types::llm::{Message, ProviderCapabilities};

/// Share of the model's context window that conversation history may occupy.
const CONVERSATION_SHARE_PERCENT: u32 = 70;

/// Bounds applied to the history replayed to the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryWindow {
    pub max_messages: usize,
    pub token_budget: u32,
}

impl HistoryWindow {
    pub fn new(max_messages: usize, token_budget: u32) -> Self {
        Self {
            max_messages,
            token_budget,
        }
    }

    /// Clamp the token budget to the conversation share of the model's
    /// context window.
    pub fn for_provider(max_messages: usize, token_budget: u32, caps: &ProviderCapabilities) -> Self {
        let ceiling = caps.max_context_tokens / 100 * CONVERSATION_SHARE_PERCENT;
        Self::new(max_messages, token_budget.min(ceiling))
    }

    /// Return the newest messages that fit, in their original order.
    ///
    /// At most `max_messages` are kept; then the oldest are dropped until the
    /// estimate fits `token_budget`.
    pub fn apply(&self, history: &[Message]) -> Vec<Message> {
        let start = history.len().saturating_sub(self.max_messages);
        let mut window = &history[start..];

        while !window.is_empty() && estimate_tokens(window) > self.token_budget {
            window = &window[1..];
        }

        window.to_vec()
    }
}

/// Rough token estimate: ~4 characters per token plus a small per-message
/// overhead for role and structure.
pub fn estimate_tokens(messages: &[Message]) -> u32 {
    let chars: usize = messages.iter().map(|m| m.content.len() + 10).sum();
    (chars as f64 / 4.0).ceil() as u32
}
