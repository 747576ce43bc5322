//! Mapping repository trait definitions.

use carebot_types::error::RepositoryError;
use carebot_types::mapping::{UserPatientMapping, UserPractitionerMapping};

/// Repository trait for user ↔ patient links.
///
/// At most one mapping per user is primary at any time.
pub trait PatientMappingRepository: Send + Sync {
    /// Insert the pair, or update its primary flag if it already exists.
    ///
    /// When `is_primary` is true, any other primary mapping of the user is
    /// cleared in the same transaction.
    fn upsert(
        &self,
        iam_user_id: &str,
        fhir_patient_id: &str,
        is_primary: bool,
    ) -> impl std::future::Future<Output = Result<UserPatientMapping, RepositoryError>> + Send;

    fn find(
        &self,
        iam_user_id: &str,
        fhir_patient_id: &str,
    ) -> impl std::future::Future<Output = Result<Option<UserPatientMapping>, RepositoryError>> + Send;

    /// All patients of a user, primary first.
    fn list_for_user(
        &self,
        iam_user_id: &str,
    ) -> impl std::future::Future<Output = Result<Vec<UserPatientMapping>, RepositoryError>> + Send;

    /// All users linked to a patient.
    fn list_for_patient(
        &self,
        fhir_patient_id: &str,
    ) -> impl std::future::Future<Output = Result<Vec<UserPatientMapping>, RepositoryError>> + Send;

    /// Delete the pair. Returns whether it existed.
    fn remove(
        &self,
        iam_user_id: &str,
        fhir_patient_id: &str,
    ) -> impl std::future::Future<Output = Result<bool, RepositoryError>> + Send;

    /// Make the pair the user's only primary mapping.
    ///
    /// Returns `None` (and changes nothing) when the pair is not mapped.
    fn set_primary(
        &self,
        iam_user_id: &str,
        fhir_patient_id: &str,
    ) -> impl std::future::Future<Output = Result<Option<UserPatientMapping>, RepositoryError>> + Send;

    fn get_primary(
        &self,
        iam_user_id: &str,
    ) -> impl std::future::Future<Output = Result<Option<UserPatientMapping>, RepositoryError>> + Send;
}

/// Repository trait for user ↔ practitioner links (one per user).
pub trait PractitionerMappingRepository: Send + Sync {
    /// Insert or update the user's practitioner link.
    ///
    /// Returns `RepositoryError::Conflict` when the user is already linked
    /// to a different organization. A `None` organization keeps the stored
    /// one.
    fn upsert(
        &self,
        iam_user_id: &str,
        fhir_practitioner_id: &str,
        organization_id: Option<&str>,
    ) -> impl std::future::Future<Output = Result<UserPractitionerMapping, RepositoryError>> + Send;

    fn find(
        &self,
        iam_user_id: &str,
    ) -> impl std::future::Future<Output = Result<Option<UserPractitionerMapping>, RepositoryError>>
    + Send;
}
