//! Shared domain types for carebot.
//!
//! This crate contains the core domain types used across the chat service:
//! sessions, conversations, messages, user mappings, LLM request shapes,
//! configuration, and their associated error types.
//!
//! Zero infrastructure dependencies -- only serde, uuid, chrono, thiserror, secrecy.

pub mod chat;
pub mod config;
pub mod error;
pub mod llm;
pub mod mapping;
pub mod session;
