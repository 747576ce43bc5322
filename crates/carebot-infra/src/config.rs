//! Service configuration loader for carebot.
//!
//! Reads an optional TOML file into [`ServiceConfig`], then layers the
//! deployment's environment variables on top. Falls back to defaults when
//! the file is missing or malformed.

use std::path::Path;

use carebot_types::config::ServiceConfig;
use carebot_types::llm::AiProviderKind;
use secrecy::SecretString;

/// File read when neither `--config` nor `CAREBOT_CONFIG` is given.
pub const DEFAULT_CONFIG_FILE: &str = "carebot.toml";

/// Load configuration from `path`, then apply environment overrides.
pub async fn load_config(path: &Path) -> ServiceConfig {
    let mut config = load_config_file(path).await;
    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    config
}

/// Parse the TOML file at `path`.
///
/// - Missing file: [`ServiceConfig::default()`].
/// - Unreadable or unparsable file: logs a warning and returns the default.
pub async fn load_config_file(path: &Path) -> ServiceConfig {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No config file at {}, using defaults", path.display());
            return ServiceConfig::default();
        }
        Err(err) => {
            tracing::warn!("Failed to read {}: {err}, using defaults", path.display());
            return ServiceConfig::default();
        }
    };

    match toml::from_str::<ServiceConfig>(&content) {
        Ok(mut config) => {
            if !session_ttl_in_range(config.session.ttl_secs) {
                tracing::warn!(
                    "Ignoring session.ttl_secs = {} in {}: out of range",
                    config.session.ttl_secs,
                    path.display()
                );
                config.session.ttl_secs = ServiceConfig::default().session.ttl_secs;
            }
            config
        }
        Err(err) => {
            tracing::warn!("Failed to parse {}: {err}, using defaults", path.display());
            ServiceConfig::default()
        }
    }
}

/// A TTL must be positive and representable as an expiry timestamp.
fn session_ttl_in_range(secs: i64) -> bool {
    secs > 0
        && chrono::Duration::try_seconds(secs)
            .and_then(|d| chrono::Utc::now().checked_add_signed(d))
            .is_some()
}

/// Overlay environment variables onto `config`.
///
/// `lookup` returns the value of a variable, if set. Empty values are
/// ignored; values that fail to parse are logged and ignored.
pub fn apply_env_overrides(config: &mut ServiceConfig, lookup: impl Fn(&str) -> Option<String>) {
    let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(v) = get("AI_PROVIDER") {
        match v.parse::<AiProviderKind>() {
            Ok(kind) => config.ai.provider = kind,
            Err(e) => tracing::warn!("Ignoring AI_PROVIDER: {e}"),
        }
    }
    if let Some(v) = get("OPENAI_API_KEY") {
        config.ai.openai_api_key = Some(SecretString::from(v));
    }
    if let Some(v) = get("OPENAI_MODEL") {
        config.ai.openai_model = v;
    }
    if let Some(v) = get("GEMINI_API_KEY") {
        config.ai.gemini_api_key = Some(SecretString::from(v));
    }
    if let Some(v) = get("GEMINI_MODEL") {
        config.ai.gemini_model = v;
    }
    if let Some(v) = get("AI_TIMEOUT_SECS") {
        match v.trim().parse::<u64>() {
            Ok(secs) if secs > 0 => config.ai.timeout_secs = secs,
            _ => tracing::warn!("Ignoring AI_TIMEOUT_SECS: '{v}' is not a positive integer"),
        }
    }
    if let Some(v) = get("DATABASE_URL") {
        config.database.url = v;
    }
    if let Some(v) = get("WEBSOCKET_CORS_ORIGIN") {
        config.server.cors_origin = v;
    }
    if let Some(v) = get("SESSION_TTL_SECS") {
        match v.trim().parse::<i64>() {
            Ok(secs) if session_ttl_in_range(secs) => config.session.ttl_secs = secs,
            _ => tracing::warn!("Ignoring SESSION_TTL_SECS: '{v}' is out of range"),
        }
    }
    if let Some(v) = get("KEYCLOAK_URL") {
        config.keycloak.url = Some(v);
    }
    if let Some(v) = get("KEYCLOAK_REALM") {
        config.keycloak.realm = v;
    }
    if let Some(v) = get("KEYCLOAK_ADMIN_USER") {
        config.keycloak.admin_user = v;
    }
    if let Some(v) = get("KEYCLOAK_ADMIN_PASSWORD") {
        config.keycloak.admin_password = Some(SecretString::from(v));
    }
    if let Some(v) = get("CAREBOT_API_TOKEN") {
        config.server.api_token = Some(SecretString::from(v));
    }
}
