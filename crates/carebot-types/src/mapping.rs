//! IAM user ↔ FHIR resource mappings.
//!
//! A portal user (identified by their IAM subject id) may act for several
//! FHIR patients, one of which is primary. A user may also be linked to a
//! single FHIR practitioner within an organization.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Link between an IAM user and a FHIR patient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPatientMapping {
    pub iam_user_id: String,
    pub fhir_patient_id: String,
    pub is_primary: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Link between an IAM user and a FHIR practitioner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPractitionerMapping {
    pub iam_user_id: String,
    pub fhir_practitioner_id: String,
    pub organization_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Outcome of practitioner onboarding.
///
/// `role_assigned` is false when the identity provider could not grant the
/// practitioner role; the mapping is kept regardless.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PractitionerOnboarding {
    pub mapping: UserPractitionerMapping,
    pub role_assigned: bool,
}
