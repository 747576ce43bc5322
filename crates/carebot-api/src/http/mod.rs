//! HTTP and WebSocket layer for carebot.
//!
//! Axum router with health probes, the `/api` JSON routes (optionally
//! token-protected), and the `/ws` chat socket.

pub mod error;
pub mod extractors;
pub mod handlers;
pub mod response;
pub mod router;
