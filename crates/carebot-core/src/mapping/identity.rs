//! IdentityAdmin trait definition.
//!
//! The identity provider's admin API, used to grant realm roles during
//! practitioner onboarding. The Keycloak client in carebot-infra implements it.

use carebot_types::error::IdentityError;

pub trait IdentityAdmin: Send + Sync {
    /// Grant the realm role `role` to `user_id`.
    fn assign_realm_role(
        &self,
        user_id: &str,
        role: &str,
    ) -> impl std::future::Future<Output = Result<(), IdentityError>> + Send;
}
