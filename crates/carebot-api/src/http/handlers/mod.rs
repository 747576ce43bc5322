//! HTTP request handlers.

pub mod conversation;
pub mod health;
pub mod mapping;
pub mod practitioner;
pub mod ws;
