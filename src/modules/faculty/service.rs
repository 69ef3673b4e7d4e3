use lectern_config::SyncConfig;
use lectern_core::AppError;
use lectern_models::{
    AllocationId, CreateAllocationDto, CreateSubjectDto, Email, FacultyAllocation, Subject,
};
use sqlx::{PgConnection, PgPool};
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

use crate::modules::batches::BatchService;
use crate::modules::permissions::snapshot;

pub struct FacultyService;

impl FacultyService {
    #[instrument(skip(db, dto), fields(code = %dto.code))]
    pub async fn create_subject(db: &PgPool, dto: CreateSubjectDto) -> Result<Subject, AppError> {
        dto.validate().map_err(AppError::validation)?;

        sqlx::query_as::<_, Subject>(
            r#"INSERT INTO subjects (code, short_name, full_name)
               VALUES ($1, $2, $3)
               RETURNING code, short_name, full_name, created_at"#,
        )
        .bind(&dto.code)
        .bind(&dto.short_name)
        .bind(&dto.full_name)
        .fetch_one(db)
        .await
        .map_err(AppError::database)
    }

    #[instrument(skip(db))]
    pub async fn list_subjects(db: &PgPool) -> Result<Vec<Subject>, AppError> {
        let subjects = sqlx::query_as::<_, Subject>(
            "SELECT code, short_name, full_name, created_at FROM subjects ORDER BY code",
        )
        .fetch_all(db)
        .await
        .map_err(AppError::database)?;
        Ok(subjects)
    }

    /// Returns the existing allocation when the (staff, subject) pair is already allocated.
    #[instrument(skip(db, dto), fields(staff = %dto.staff_email, subject = %dto.subject_code))]
    pub async fn create_allocation(
        db: &PgPool,
        dto: CreateAllocationDto,
    ) -> Result<FacultyAllocation, AppError> {
        dto.validate().map_err(AppError::validation)?;

        let inserted = sqlx::query_as::<_, FacultyAllocation>(
            r#"INSERT INTO faculty_allocations (staff_email, subject_code)
               VALUES ($1, $2)
               ON CONFLICT (staff_email, subject_code) DO NOTHING
               RETURNING id, staff_email, subject_code, created_at"#,
        )
        .bind(&dto.staff_email)
        .bind(&dto.subject_code)
        .fetch_optional(db)
        .await
        .map_err(AppError::database)?;

        if let Some(allocation) = inserted {
            return Ok(allocation);
        }

        let existing = sqlx::query_as::<_, FacultyAllocation>(
            r#"SELECT id, staff_email, subject_code, created_at
               FROM faculty_allocations
               WHERE staff_email = $1 AND subject_code = $2"#,
        )
        .bind(&dto.staff_email)
        .bind(&dto.subject_code)
        .fetch_one(db)
        .await
        .map_err(AppError::database)?;

        Ok(existing)
    }

    #[instrument(skip(db))]
    pub async fn list_allocations(
        db: &PgPool,
        staff: Option<&Email>,
    ) -> Result<Vec<FacultyAllocation>, AppError> {
        let allocations = sqlx::query_as::<_, FacultyAllocation>(
            r#"SELECT id, staff_email, subject_code, created_at
               FROM faculty_allocations
               WHERE $1::VARCHAR IS NULL OR staff_email = $1
               ORDER BY staff_email, subject_code"#,
        )
        .bind(staff)
        .fetch_all(db)
        .await
        .map_err(AppError::database)?;
        Ok(allocations)
    }

    /// Removes the allocation from every batch through the faculty-change hook, then deletes it.
    ///
    /// Batch rows are locked before the allocation row, the same order faculty
    /// edits take them in.
    #[instrument(skip(db, config))]
    pub async fn delete_allocation(
        db: &PgPool,
        config: &SyncConfig,
        allocation_id: AllocationId,
    ) -> Result<(), AppError> {
        let mut tx = db.begin().await.map_err(AppError::database)?;

        let teaching = Self::batches_holding(&mut tx, allocation_id).await?;
        snapshot::lock_batches(&mut tx, &teaching)
            .await
            .map_err(AppError::database)?;

        let exists = sqlx::query_scalar::<_, Uuid>(
            "SELECT id FROM faculty_allocations WHERE id = $1 FOR UPDATE",
        )
        .bind(allocation_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(AppError::database)?;
        if exists.is_none() {
            return Err(AppError::not_found(anyhow::anyhow!(
                "Faculty allocation {} not found",
                allocation_id
            )));
        }

        let batch_ids = Self::batches_holding(&mut tx, allocation_id).await?;
        for batch_id in &batch_ids {
            BatchService::change_faculty_in(&mut tx, config, *batch_id, &[], &[allocation_id])
                .await?;
        }

        sqlx::query("DELETE FROM faculty_allocations WHERE id = $1")
            .bind(allocation_id)
            .execute(&mut *tx)
            .await
            .map_err(AppError::database)?;

        tx.commit().await.map_err(AppError::database)?;
        info!(batches = batch_ids.len(), "Faculty allocation deleted");
        Ok(())
    }

    async fn batches_holding(
        conn: &mut PgConnection,
        allocation_id: AllocationId,
    ) -> Result<Vec<Uuid>, AppError> {
        sqlx::query_scalar::<_, Uuid>(
            "SELECT batch_id FROM batch_faculty WHERE allocation_id = $1 ORDER BY batch_id",
        )
        .bind(allocation_id)
        .fetch_all(&mut *conn)
        .await
        .map_err(AppError::database)
    }
}
