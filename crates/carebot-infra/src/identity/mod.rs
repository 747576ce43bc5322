//! Identity provider admin clients.

pub mod keycloak;
