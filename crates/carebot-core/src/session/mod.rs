//! TTL-bounded chat session state.
//!
//! `SessionRepository` is the storage port, `SessionService` applies the
//! expiry rules on top of it, and `SessionSweeper` purges dead rows in the
//! background.

pub mod repository;
pub mod service;
pub mod sweeper;
