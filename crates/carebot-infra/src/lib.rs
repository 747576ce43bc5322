//! Infrastructure layer for carebot.
//!
//! Contains implementations of the traits defined in `carebot-core`:
//! SQLite storage for sessions, conversations and user mappings, the
//! OpenAI-compatible LLM provider, and the Keycloak admin client.

pub mod config;
pub mod identity;
pub mod llm;
pub mod sqlite;
