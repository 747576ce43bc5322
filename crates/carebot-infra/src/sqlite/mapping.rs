//! SQLite user mapping repositories.
//!
//! `user_patient_mapping` carries a partial unique index allowing one
//! primary row per user; primary changes clear the old primary in the same
//! writer transaction. `user_practitioner_mapping` is one row per user with
//! a guarded upsert that refuses to move a user between organizations.

use carebot_core::mapping::repository::{PatientMappingRepository, PractitionerMappingRepository};
use carebot_types::error::RepositoryError;
use carebot_types::mapping::{UserPatientMapping, UserPractitionerMapping};
use chrono::Utc;
use sqlx::Row;

use super::pool::DatabasePool;
use super::{format_datetime, parse_datetime, query_error};

struct PatientMappingRow {
    iam_user_id: String,
    fhir_patient_id: String,
    is_primary: bool,
    created_at: String,
    updated_at: String,
}

impl PatientMappingRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            iam_user_id: row.try_get("iam_user_id")?,
            fhir_patient_id: row.try_get("fhir_patient_id")?,
            is_primary: row.try_get("is_primary")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn into_mapping(self) -> Result<UserPatientMapping, RepositoryError> {
        Ok(UserPatientMapping {
            iam_user_id: self.iam_user_id,
            fhir_patient_id: self.fhir_patient_id,
            is_primary: self.is_primary,
            created_at: parse_datetime(&self.created_at)?,
            updated_at: parse_datetime(&self.updated_at)?,
        })
    }
}

fn patient_rows(rows: &[sqlx::sqlite::SqliteRow]) -> Result<Vec<UserPatientMapping>, RepositoryError> {
    let mut mappings = Vec::with_capacity(rows.len());
    for row in rows {
        mappings.push(PatientMappingRow::from_row(row).map_err(query_error)?.into_mapping()?);
    }
    Ok(mappings)
}

/// SQLite-backed implementation of `PatientMappingRepository`.
pub struct SqlitePatientMappingRepository {
    pool: DatabasePool,
}

impl SqlitePatientMappingRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }

    async fn fetch(
        &self,
        executor: &sqlx::SqlitePool,
        iam_user_id: &str,
        fhir_patient_id: &str,
    ) -> Result<Option<UserPatientMapping>, RepositoryError> {
        let row = sqlx::query(
            "SELECT * FROM user_patient_mapping WHERE iam_user_id = ? AND fhir_patient_id = ?",
        )
        .bind(iam_user_id)
        .bind(fhir_patient_id)
        .fetch_optional(executor)
        .await
        .map_err(query_error)?;

        row.map(|r| PatientMappingRow::from_row(&r).map_err(query_error)?.into_mapping())
            .transpose()
    }
}

impl PatientMappingRepository for SqlitePatientMappingRepository {
    async fn upsert(
        &self,
        iam_user_id: &str,
        fhir_patient_id: &str,
        is_primary: bool,
    ) -> Result<UserPatientMapping, RepositoryError> {
        let now = format_datetime(&Utc::now());
        let mut tx = self.pool.writer.begin().await.map_err(query_error)?;

        if is_primary {
            sqlx::query(
                r#"UPDATE user_patient_mapping SET is_primary = 0, updated_at = ?
                   WHERE iam_user_id = ? AND is_primary = 1 AND fhir_patient_id != ?"#,
            )
            .bind(&now)
            .bind(iam_user_id)
            .bind(fhir_patient_id)
            .execute(&mut *tx)
            .await
            .map_err(query_error)?;
        }

        sqlx::query(
            r#"INSERT INTO user_patient_mapping (iam_user_id, fhir_patient_id, is_primary, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?)
               ON CONFLICT(iam_user_id, fhir_patient_id) DO UPDATE SET
                   is_primary = excluded.is_primary,
                   updated_at = excluded.updated_at"#,
        )
        .bind(iam_user_id)
        .bind(fhir_patient_id)
        .bind(is_primary)
        .bind(&now)
        .bind(&now)
        .execute(&mut *tx)
        .await
        .map_err(query_error)?;

        tx.commit().await.map_err(query_error)?;

        self.fetch(&self.pool.writer, iam_user_id, fhir_patient_id)
            .await?
            .ok_or(RepositoryError::NotFound)
    }

    async fn find(
        &self,
        iam_user_id: &str,
        fhir_patient_id: &str,
    ) -> Result<Option<UserPatientMapping>, RepositoryError> {
        self.fetch(&self.pool.reader, iam_user_id, fhir_patient_id).await
    }

    async fn list_for_user(&self, iam_user_id: &str) -> Result<Vec<UserPatientMapping>, RepositoryError> {
        let rows = sqlx::query(
            r#"SELECT * FROM user_patient_mapping
               WHERE iam_user_id = ?
               ORDER BY is_primary DESC, created_at ASC"#,
        )
        .bind(iam_user_id)
        .fetch_all(&self.pool.reader)
        .await
        .map_err(query_error)?;

        patient_rows(&rows)
    }

    async fn list_for_patient(
        &self,
        fhir_patient_id: &str,
    ) -> Result<Vec<UserPatientMapping>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT * FROM user_patient_mapping WHERE fhir_patient_id = ? ORDER BY created_at ASC",
        )
        .bind(fhir_patient_id)
        .fetch_all(&self.pool.reader)
        .await
        .map_err(query_error)?;

        patient_rows(&rows)
    }

    async fn remove(&self, iam_user_id: &str, fhir_patient_id: &str) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            "DELETE FROM user_patient_mapping WHERE iam_user_id = ? AND fhir_patient_id = ?",
        )
        .bind(iam_user_id)
        .bind(fhir_patient_id)
        .execute(&self.pool.writer)
        .await
        .map_err(query_error)?;

        Ok(result.rows_affected() > 0)
    }

    async fn set_primary(
        &self,
        iam_user_id: &str,
        fhir_patient_id: &str,
    ) -> Result<Option<UserPatientMapping>, RepositoryError> {
        let now = format_datetime(&Utc::now());
        let mut tx = self.pool.writer.begin().await.map_err(query_error)?;

        let mapped: Option<(i64,)> = sqlx::query_as(
            "SELECT 1 FROM user_patient_mapping WHERE iam_user_id = ? AND fhir_patient_id = ?",
        )
        .bind(iam_user_id)
        .bind(fhir_patient_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(query_error)?;
        if mapped.is_none() {
            return Ok(None);
        }

        // Clear first so the partial unique index never sees two primaries.
        sqlx::query(
            r#"UPDATE user_patient_mapping SET is_primary = 0, updated_at = ?
               WHERE iam_user_id = ? AND is_primary = 1"#,
        )
        .bind(&now)
        .bind(iam_user_id)
        .execute(&mut *tx)
        .await
        .map_err(query_error)?;

        sqlx::query(
            r#"UPDATE user_patient_mapping SET is_primary = 1, updated_at = ?
               WHERE iam_user_id = ? AND fhir_patient_id = ?"#,
        )
        .bind(&now)
        .bind(iam_user_id)
        .bind(fhir_patient_id)
        .execute(&mut *tx)
        .await
        .map_err(query_error)?;

        tx.commit().await.map_err(query_error)?;

        self.fetch(&self.pool.writer, iam_user_id, fhir_patient_id).await
    }

    async fn get_primary(&self, iam_user_id: &str) -> Result<Option<UserPatientMapping>, RepositoryError> {
        let row = sqlx::query(
            "SELECT * FROM user_patient_mapping WHERE iam_user_id = ? AND is_primary = 1",
        )
        .bind(iam_user_id)
        .fetch_optional(&self.pool.reader)
        .await
        .map_err(query_error)?;

        row.map(|r| PatientMappingRow::from_row(&r).map_err(query_error)?.into_mapping())
            .transpose()
    }
}

// ---------------------------------------------------------------------------
// Practitioner mappings
// ---------------------------------------------------------------------------

struct PractitionerMappingRow {
    iam_user_id: String,
    fhir_practitioner_id: String,
    organization_id: Option<String>,
    created_at: String,
    updated_at: String,
}

impl PractitionerMappingRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            iam_user_id: row.try_get("iam_user_id")?,
            fhir_practitioner_id: row.try_get("fhir_practitioner_id")?,
            organization_id: row.try_get("organization_id")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn into_mapping(self) -> Result<UserPractitionerMapping, RepositoryError> {
        Ok(UserPractitionerMapping {
            iam_user_id: self.iam_user_id,
            fhir_practitioner_id: self.fhir_practitioner_id,
            organization_id: self.organization_id,
            created_at: parse_datetime(&self.created_at)?,
            updated_at: parse_datetime(&self.updated_at)?,
        })
    }
}

/// SQLite-backed implementation of `PractitionerMappingRepository`.
pub struct SqlitePractitionerMappingRepository {
    pool: DatabasePool,
}

impl SqlitePractitionerMappingRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }

    async fn fetch(
        &self,
        executor: &sqlx::SqlitePool,
        iam_user_id: &str,
    ) -> Result<Option<UserPractitionerMapping>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM user_practitioner_mapping WHERE iam_user_id = ?")
            .bind(iam_user_id)
            .fetch_optional(executor)
            .await
            .map_err(query_error)?;

        row.map(|r| PractitionerMappingRow::from_row(&r).map_err(query_error)?.into_mapping())
            .transpose()
    }
}

impl PractitionerMappingRepository for SqlitePractitionerMappingRepository {
    async fn upsert(
        &self,
        iam_user_id: &str,
        fhir_practitioner_id: &str,
        organization_id: Option<&str>,
    ) -> Result<UserPractitionerMapping, RepositoryError> {
        let now = format_datetime(&Utc::now());

        // The WHERE clause skips the update on an organization mismatch,
        // leaving rows_affected at 0.
        let result = sqlx::query(
            r#"INSERT INTO user_practitioner_mapping (iam_user_id, fhir_practitioner_id, organization_id, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?)
               ON CONFLICT(iam_user_id) DO UPDATE SET
                   fhir_practitioner_id = excluded.fhir_practitioner_id,
                   organization_id = COALESCE(excluded.organization_id, user_practitioner_mapping.organization_id),
                   updated_at = excluded.updated_at
               WHERE excluded.organization_id IS NULL
                  OR user_practitioner_mapping.organization_id IS NULL
                  OR user_practitioner_mapping.organization_id = excluded.organization_id"#,
        )
        .bind(iam_user_id)
        .bind(fhir_practitioner_id)
        .bind(organization_id)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool.writer)
        .await
        .map_err(query_error)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::Conflict(format!(
                "user '{iam_user_id}' is already assigned to a different organization"
            )));
        }

        self.fetch(&self.pool.writer, iam_user_id)
            .await?
            .ok_or(RepositoryError::NotFound)
    }

    async fn find(&self, iam_user_id: &str) -> Result<Option<UserPractitionerMapping>, RepositoryError> {
        self.fetch(&self.pool.reader, iam_user_id).await
    }
}
