//! Business logic and port definitions for carebot.
//!
//! This crate defines the repository, provider and identity traits that the
//! infrastructure layer implements, plus the services built on them. It
//! depends only on `carebot-types` -- never on `carebot-infra` or any
//! database/IO crate.

pub mod chat;
pub mod llm;
pub mod mapping;
pub mod session;

#[cfg(test)]
pub(crate) mod test_support;
