//! Conversation persistence port and the chat turn orchestration.

pub mod repository;
pub mod service;
