//! LLM provider abstractions for carebot.
//!
//! - `LlmProvider`: RPITIT trait for concrete provider implementations
//! - `BoxLlmProvider`: Object-safe wrapper for dynamic dispatch
//! - `HistoryWindow`: bounds how much conversation history is replayed
//! - `AiAssistant`: the single "chat with AI" entry point used by the chat service

pub mod assistant;
pub mod box_provider;
pub mod history;
pub mod provider;
