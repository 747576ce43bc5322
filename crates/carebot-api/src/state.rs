//! Application state wiring all services together.
//!
//! Services are generic over repository and identity traits; AppState pins
//! them to the concrete infra implementations.

use std::sync::Arc;

use carebot_core::chat::service::ChatService;
use carebot_core::llm::assistant::AiAssistant;
use carebot_core::mapping::service::{MappingService, PractitionerService};
use carebot_core::session::service::SessionService;
use carebot_infra::identity::keycloak::KeycloakAdmin;
use carebot_infra::llm::build_assistant;
use carebot_infra::sqlite::conversation::SqliteConversationRepository;
use carebot_infra::sqlite::mapping::{
    SqlitePatientMappingRepository, SqlitePractitionerMappingRepository,
};
use carebot_infra::sqlite::pool::DatabasePool;
use carebot_infra::sqlite::session::SqliteSessionRepository;
use carebot_types::config::ServiceConfig;
use secrecy::ExposeSecret;

use crate::http::extractors::auth::hash_api_key;

pub type ConcreteSessionService = SessionService<SqliteSessionRepository>;

pub type ConcreteChatService = ChatService<SqliteConversationRepository, SqliteSessionRepository>;

pub type ConcreteMappingService = MappingService<SqlitePatientMappingRepository>;

pub type ConcretePractitionerService =
    PractitionerService<SqlitePractitionerMappingRepository, KeycloakAdmin>;

/// Shared state for HTTP handlers and WebSocket connections.
#[derive(Clone)]
pub struct AppState {
    pub chat_service: Arc<ConcreteChatService>,
    pub sessions: Arc<ConcreteSessionService>,
    pub mapping_service: Arc<ConcreteMappingService>,
    pub practitioner_service: Arc<ConcretePractitionerService>,
    pub db_pool: DatabasePool,
    /// SHA-256 of `CAREBOT_API_TOKEN`; `None` leaves `/api` open.
    pub api_token_hash: Option<Arc<str>>,
}

impl AppState {
    /// Open the database (running migrations) and wire every service.
    pub async fn init(config: &ServiceConfig) -> anyhow::Result<Self> {
        let db_pool = DatabasePool::new(&config.database.url).await?;
        let assistant = build_assistant(&config.ai);
        Ok(Self::with_pool(config, db_pool, assistant))
    }

    /// Wire services over an already opened pool.
    pub fn with_pool(config: &ServiceConfig, db_pool: DatabasePool, assistant: AiAssistant) -> Self {
        let sessions = Arc::new(
            SessionService::new(SqliteSessionRepository::new(db_pool.clone()))
                .with_default_ttl(config.session.ttl_secs),
        );

        let chat_service = ChatService::new(
            SqliteConversationRepository::new(db_pool.clone()),
            Arc::clone(&sessions),
            assistant,
        );

        let mapping_service =
            MappingService::new(SqlitePatientMappingRepository::new(db_pool.clone()));

        let identity = KeycloakAdmin::from_config(&config.keycloak);
        if identity.is_none() {
            tracing::info!("Keycloak not configured, practitioner role assignment disabled");
        }
        let practitioner_service = PractitionerService::new(
            SqlitePractitionerMappingRepository::new(db_pool.clone()),
            identity,
            config.keycloak.practitioner_role.clone(),
        );

        let api_token_hash = config
            .server
            .api_token
            .as_ref()
            .map(|token| Arc::from(hash_api_key(token.expose_secret())));

        Self {
            chat_service: Arc::new(chat_service),
            sessions,
            mapping_service: Arc::new(mapping_service),
            practitioner_service: Arc::new(practitioner_service),
            db_pool,
            api_token_hash,
        }
    }
}
