//! Service configuration types for carebot.
//!
//! `ServiceConfig` mirrors the optional `carebot.toml` file. Every field has a
//! default so an empty file (or no file at all) yields a runnable setup;
//! environment variables are layered on top by the loader in carebot-infra.
//!
//! Secrets (API keys, admin password, API token) are wrapped in
//! [`SecretString`] so they never show up in `Debug` output or logs. For the
//! same reason these types derive `Deserialize` only.

use secrecy::SecretString;
use serde::Deserialize;

use crate::llm::AiProviderKind;
use crate::session::DEFAULT_SESSION_TTL_SECS;

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
pub struct ServiceConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub ai: AiConfig,
    #[serde(default)]
    pub keycloak: KeycloakConfig,
}

/// HTTP listener settings.
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Allowed CORS origin for the SPA; `*` allows any.
    #[serde(default = "default_cors_origin")]
    pub cors_origin: String,
    /// When set, `/api/*` requires this bearer token.
    #[serde(default)]
    pub api_token: Option<SecretString>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3001
}

fn default_cors_origin() -> String {
    "*".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origin: default_cors_origin(),
            api_token: None,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_url")]
    pub url: String,
}

fn default_database_url() -> String {
    "sqlite://carebot.db?mode=rwc".to_string()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
        }
    }
}

/// Session lifetime and sweep cadence.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: i64,
    #[serde(default = "default_cleanup_interval_secs")]
    pub cleanup_interval_secs: u64,
}

fn default_ttl_secs() -> i64 {
    DEFAULT_SESSION_TTL_SECS
}

fn default_cleanup_interval_secs() -> u64 {
    300
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_ttl_secs(),
            cleanup_interval_secs: default_cleanup_interval_secs(),
        }
    }
}

/// Chat provider selection and request shaping.
#[derive(Debug, Deserialize)]
pub struct AiConfig {
    #[serde(default)]
    pub provider: AiProviderKind,
    #[serde(default)]
    pub openai_api_key: Option<SecretString>,
    #[serde(default = "default_openai_model")]
    pub openai_model: String,
    #[serde(default)]
    pub gemini_api_key: Option<SecretString>,
    #[serde(default = "default_gemini_model")]
    pub gemini_model: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    /// Most recent messages replayed to the provider on each turn.
    #[serde(default = "default_history_window")]
    pub history_window: usize,
    /// Approximate token ceiling for the replayed history.
    #[serde(default = "default_history_token_budget")]
    pub history_token_budget: u32,
}

fn default_openai_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_gemini_model() -> String {
    "gemini-2.0-flash".to_string()
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_max_tokens() -> u32 {
    1024
}

fn default_temperature() -> f64 {
    0.7
}

fn default_history_window() -> usize {
    20
}

fn default_history_token_budget() -> u32 {
    8_000
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            provider: AiProviderKind::default(),
            openai_api_key: None,
            openai_model: default_openai_model(),
            gemini_api_key: None,
            gemini_model: default_gemini_model(),
            timeout_secs: default_timeout_secs(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            history_window: default_history_window(),
            history_token_budget: default_history_token_budget(),
        }
    }
}

impl AiConfig {
    /// API key and model for the selected provider.
    pub fn active_credentials(&self) -> (Option<&SecretString>, &str) {
        match self.provider {
            AiProviderKind::OpenAi => (self.openai_api_key.as_ref(), &self.openai_model),
            AiProviderKind::Gemini => (self.gemini_api_key.as_ref(), &self.gemini_model),
        }
    }
}

/// Keycloak admin access used to grant roles during practitioner onboarding.
#[derive(Debug, Deserialize)]
pub struct KeycloakConfig {
    /// Base URL, e.g. `http://keycloak:8080`. Unset disables role assignment.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_realm")]
    pub realm: String,
    #[serde(default = "default_admin_user")]
    pub admin_user: String,
    #[serde(default)]
    pub admin_password: Option<SecretString>,
    #[serde(default = "default_practitioner_role")]
    pub practitioner_role: String,
}

fn default_realm() -> String {
    "healthcare".to_string()
}

fn default_admin_user() -> String {
    "admin".to_string()
}

fn default_practitioner_role() -> String {
    "practitioner".to_string()
}

impl Default for KeycloakConfig {
    fn default() -> Self {
        Self {
            url: None,
            realm: default_realm(),
            admin_user: default_admin_user(),
            admin_password: None,
            practitioner_role: default_practitioner_role(),
        }
    }
}
