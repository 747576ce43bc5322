use thiserror::Error;

/// Errors from repository operations (used by trait definitions in carebot-core).
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database connection error")]
    Connection,

    #[error("query error: {0}")]
    Query(String),

    #[error("entity not found")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(String),
}

/// Errors from the session store.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session payload is not valid: {0}")]
    Serialization(String),

    #[error("session TTL of {0} seconds is out of range")]
    InvalidTtl(i64),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Errors surfaced by the chat orchestration layer.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    /// The AI provider failed; the message is safe to show to the user.
    #[error("{0}")]
    Ai(String),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Session(#[from] SessionError),
}

/// Errors related to user ↔ patient / practitioner mappings.
#[derive(Debug, Error)]
pub enum MappingError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Errors from the identity provider's admin API.
#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("identity admin authentication failed: {0}")]
    Authentication(String),

    #[error("role '{0}' not found")]
    RoleNotFound(String),

    #[error("identity admin request failed: {0}")]
    Request(String),
}
