//! KeycloakAdmin -- [`IdentityAdmin`] implementation over the Keycloak admin REST API.
//!
//! Each role assignment obtains a short-lived admin token from the `master`
//! realm (password grant, `admin-cli` client), resolves the realm role, and
//! posts it to the user's realm role mappings.
//!
//! The admin password is held as a [`SecretString`] and only exposed when
//! building the token request body.

use std::time::Duration;

use carebot_core::mapping::identity::IdentityAdmin;
use carebot_types::config::KeycloakConfig;
use carebot_types::error::IdentityError;
use reqwest::Url;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::debug;

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Realm role representation as returned by `GET .../roles/{name}`.
#[derive(Debug, Clone, serde::Serialize, Deserialize)]
struct RoleRepresentation {
    id: String,
    name: String,
}

pub struct KeycloakAdmin {
    client: reqwest::Client,
    base_url: String,
    realm: String,
    admin_user: String,
    admin_password: SecretString,
}

impl KeycloakAdmin {
    pub fn new(
        base_url: &str,
        realm: &str,
        admin_user: &str,
        admin_password: SecretString,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            realm: realm.to_string(),
            admin_user: admin_user.to_string(),
            admin_password,
        }
    }

    /// Build a client when both the URL and the admin password are set.
    pub fn from_config(config: &KeycloakConfig) -> Option<Self> {
        let url = config.url.as_deref().filter(|u| !u.trim().is_empty())?;
        let password = config.admin_password.as_ref()?;
        Some(Self::new(
            url,
            &config.realm,
            &config.admin_user,
            SecretString::from(password.expose_secret().to_string()),
        ))
    }

    /// Append `segments` to the base URL, each as one escaped path segment.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, IdentityError> {
        if let Some(bad) = segments
            .iter()
            .find(|s| s.is_empty() || **s == "." || **s == "..")
        {
            return Err(IdentityError::Request(format!("invalid path segment '{bad}'")));
        }

        let mut url = Url::parse(&self.base_url)
            .map_err(|e| IdentityError::Request(format!("invalid identity admin URL: {e}")))?;
        url.path_segments_mut()
            .map_err(|_| IdentityError::Request("identity admin URL cannot be a base".to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn token_url(&self) -> Result<Url, IdentityError> {
        self.endpoint(&["realms", "master", "protocol", "openid-connect", "token"])
    }

    fn role_url(&self, role: &str) -> Result<Url, IdentityError> {
        self.endpoint(&["admin", "realms", self.realm.as_str(), "roles", role])
    }

    fn role_mapping_url(&self, user_id: &str) -> Result<Url, IdentityError> {
        self.endpoint(&[
            "admin",
            "realms",
            self.realm.as_str(),
            "users",
            user_id,
            "role-mappings",
            "realm",
        ])
    }

    async fn admin_token(&self) -> Result<String, IdentityError> {
        let response = self
            .client
            .post(self.token_url()?)
            .form(&[
                ("grant_type", "password"),
                ("client_id", "admin-cli"),
                ("username", self.admin_user.as_str()),
                ("password", self.admin_password.expose_secret()),
            ])
            .send()
            .await
            .map_err(|e| IdentityError::Authentication(e.to_string()))?;

        if !response.status().is_success() {
            return Err(IdentityError::Authentication(format!(
                "token endpoint returned {}",
                response.status()
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| IdentityError::Authentication(e.to_string()))?;
        Ok(token.access_token)
    }

    async fn fetch_role(&self, token: &str, role: &str) -> Result<RoleRepresentation, IdentityError> {
        let response = self
            .client
            .get(self.role_url(role)?)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| IdentityError::Request(e.to_string()))?;

        match response.status() {
            status if status.is_success() => response
                .json()
                .await
                .map_err(|e| IdentityError::Request(e.to_string())),
            reqwest::StatusCode::NOT_FOUND => Err(IdentityError::RoleNotFound(role.to_string())),
            status => Err(IdentityError::Request(format!(
                "role lookup returned {status}"
            ))),
        }
    }
}

impl IdentityAdmin for KeycloakAdmin {
    async fn assign_realm_role(&self, user_id: &str, role: &str) -> Result<(), IdentityError> {
        let mapping_url = self.role_mapping_url(user_id)?;
        let token = self.admin_token().await?;
        let role_repr = self.fetch_role(&token, role).await?;
        debug!(user_id, role = %role_repr.name, "Assigning Keycloak realm role");

        let response = self
            .client
            .post(mapping_url)
            .bearer_auth(&token)
            .json(&[role_repr])
            .send()
            .await
            .map_err(|e| IdentityError::Request(e.to_string()))?;

        if !response.status().is_success() {
            return Err(IdentityError::Request(format!(
                "role mapping returned {}",
                response.status()
            )));
        }
        Ok(())
    }
}
