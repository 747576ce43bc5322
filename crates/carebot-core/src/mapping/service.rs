//! Mapping services: patient access and practitioner onboarding.

use carebot_types::error::{MappingError, RepositoryError};
use carebot_types::mapping::{PractitionerOnboarding, UserPatientMapping, UserPractitionerMapping};
use tracing::{info, warn};

use super::identity::IdentityAdmin;
use super::repository::{PatientMappingRepository, PractitionerMappingRepository};

fn require(value: &str, field: &str) -> Result<(), MappingError> {
    if value.trim().is_empty() {
        return Err(MappingError::Validation(format!("{field} is required")));
    }
    Ok(())
}

/// Identity-provider user ids are opaque single path segments.
fn require_user_id(value: &str) -> Result<(), MappingError> {
    require(value, "userId")?;
    if value.contains('/') || value == "." || value == ".." {
        return Err(MappingError::Validation(
            "userId must be a single path segment".to_string(),
        ));
    }
    Ok(())
}

/// Manages which FHIR patients an IAM user may act for.
pub struct MappingService<R: PatientMappingRepository> {
    repo: R,
}

impl<R: PatientMappingRepository> MappingService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Link a patient to a user. Re-adding an existing pair updates its
    /// primary flag.
    pub async fn add_patient_to_user(
        &self,
        user_id: &str,
        patient_id: &str,
        is_primary: bool,
    ) -> Result<UserPatientMapping, MappingError> {
        require(user_id, "userId")?;
        require(patient_id, "patientId")?;

        let mapping = self.repo.upsert(user_id, patient_id, is_primary).await?;
        info!(user_id, patient_id, is_primary, "Patient mapped to user");
        Ok(mapping)
    }

    pub async fn list_patients(&self, user_id: &str) -> Result<Vec<UserPatientMapping>, MappingError> {
        require(user_id, "userId")?;
        Ok(self.repo.list_for_user(user_id).await?)
    }

    pub async fn list_users(&self, patient_id: &str) -> Result<Vec<UserPatientMapping>, MappingError> {
        require(patient_id, "patientId")?;
        Ok(self.repo.list_for_patient(patient_id).await?)
    }

    /// Unlink a patient. Returns `NotFound` when the pair is not mapped.
    pub async fn remove_patient(&self, user_id: &str, patient_id: &str) -> Result<(), MappingError> {
        require(user_id, "userId")?;
        require(patient_id, "patientId")?;

        if !self.repo.remove(user_id, patient_id).await? {
            return Err(MappingError::NotFound(format!(
                "Patient '{patient_id}' is not mapped to user '{user_id}'"
            )));
        }
        info!(user_id, patient_id, "Patient unmapped from user");
        Ok(())
    }

    /// Make `patient_id` the user's primary patient.
    pub async fn set_primary_patient(
        &self,
        user_id: &str,
        patient_id: &str,
    ) -> Result<UserPatientMapping, MappingError> {
        require(user_id, "userId")?;
        require(patient_id, "patientId")?;

        self.repo
            .set_primary(user_id, patient_id)
            .await?
            .ok_or_else(|| {
                MappingError::NotFound(format!(
                    "Patient '{patient_id}' is not mapped to user '{user_id}'"
                ))
            })
    }

    /// The user's primary patient id, if any.
    pub async fn get_primary_patient(&self, user_id: &str) -> Result<Option<String>, MappingError> {
        require(user_id, "userId")?;
        Ok(self
            .repo
            .get_primary(user_id)
            .await?
            .map(|m| m.fhir_patient_id))
    }

    pub async fn is_primary(&self, user_id: &str, patient_id: &str) -> Result<bool, MappingError> {
        require(user_id, "userId")?;
        require(patient_id, "patientId")?;
        Ok(self
            .repo
            .find(user_id, patient_id)
            .await?
            .is_some_and(|m| m.is_primary))
    }

    pub async fn has_access_to_patient(
        &self,
        user_id: &str,
        patient_id: &str,
    ) -> Result<bool, MappingError> {
        require(user_id, "userId")?;
        require(patient_id, "patientId")?;
        Ok(self.repo.find(user_id, patient_id).await?.is_some())
    }
}

/// Links IAM users to FHIR practitioners and grants their realm role.
pub struct PractitionerService<R: PractitionerMappingRepository, I: IdentityAdmin> {
    repo: R,
    identity: Option<I>,
    role: String,
}

impl<R: PractitionerMappingRepository, I: IdentityAdmin> PractitionerService<R, I> {
    /// `identity` is `None` when no identity admin is configured; onboarding
    /// then stores the mapping without granting a role.
    pub fn new(repo: R, identity: Option<I>, role: impl Into<String>) -> Self {
        Self {
            repo,
            identity,
            role: role.into(),
        }
    }

    /// Upsert the practitioner mapping, then try to grant the role.
    ///
    /// A role-assignment failure is logged and reported through
    /// `role_assigned = false`; the mapping is kept.
    pub async fn onboard(
        &self,
        user_id: &str,
        practitioner_id: &str,
        organization_id: Option<&str>,
    ) -> Result<PractitionerOnboarding, MappingError> {
        require_user_id(user_id)?;
        require(practitioner_id, "practitionerId")?;
        let organization_id = organization_id.filter(|o| !o.trim().is_empty());

        let mapping = self
            .repo
            .upsert(user_id, practitioner_id, organization_id)
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(msg) => MappingError::Conflict(msg),
                other => MappingError::Repository(other),
            })?;

        let role_assigned = match &self.identity {
            Some(identity) => match identity.assign_realm_role(user_id, &self.role).await {
                Ok(()) => {
                    info!(user_id, role = %self.role, "Realm role assigned");
                    true
                }
                Err(e) => {
                    warn!(user_id, role = %self.role, error = %e, "Realm role assignment failed");
                    false
                }
            },
            None => {
                info!(user_id, "Identity admin not configured, skipping role assignment");
                false
            }
        };

        Ok(PractitionerOnboarding {
            mapping,
            role_assigned,
        })
    }

    pub async fn get_practitioner(
        &self,
        user_id: &str,
    ) -> Result<Option<UserPractitionerMapping>, MappingError> {
        require(user_id, "userId")?;
        Ok(self.repo.find(user_id).await?)
    }
}
