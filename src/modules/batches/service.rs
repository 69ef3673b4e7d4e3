use lectern_config::SyncConfig;
use lectern_core::AppError;
use lectern_models::{
    AllocationId, Batch, BatchId, BatchWithMembers, CreateBatchDto, DepartmentId, Email,
    FacultyAllocation,
};
use lectern_permissions::{StaffHandle, observer};
use sqlx::{PgConnection, PgPool};
use std::collections::BTreeSet;
use tracing::{info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

use crate::modules::departments::DepartmentService;
use crate::modules::permissions::{PermissionSyncService, SyncEvent, snapshot};

pub struct BatchService;

impl BatchService {
    /// Creates a batch with its initial faculty and students, optionally
    /// attaching it to a department in the same transaction.
    #[instrument(skip(db, config, dto), fields(name = %dto.name))]
    pub async fn create_batch(
        db: &PgPool,
        config: &SyncConfig,
        dto: CreateBatchDto,
    ) -> Result<BatchWithMembers, AppError> {
        dto.validate().map_err(AppError::validation)?;

        let mut tx = db.begin().await.map_err(AppError::database)?;

        let batch = sqlx::query_as::<_, Batch>(
            "INSERT INTO batches (name) VALUES ($1) RETURNING id, name, created_at, updated_at",
        )
        .bind(&dto.name)
        .fetch_one(&mut *tx)
        .await
        .map_err(AppError::database)?;

        Self::change_faculty_in(
            &mut tx,
            config,
            batch.id.into_inner(),
            &dto.allocation_ids,
            &[],
        )
        .await?;
        Self::replace_students(&mut tx, batch.id, &dto.students).await?;

        if let Some(department_id) = dto.department_id {
            DepartmentService::attach_batches_in(&mut tx, config, department_id, &[batch.id])
                .await?;
        }

        tx.commit().await.map_err(AppError::database)?;
        info!(batch_id = %batch.id, "Batch created");

        Self::get_batch(db, batch.id).await
    }

    #[instrument(skip(db))]
    pub async fn get_batch(db: &PgPool, batch_id: BatchId) -> Result<BatchWithMembers, AppError> {
        let batch = sqlx::query_as::<_, Batch>(
            "SELECT id, name, created_at, updated_at FROM batches WHERE id = $1",
        )
        .bind(batch_id)
        .fetch_optional(db)
        .await
        .map_err(AppError::database)?
        .ok_or_else(|| AppError::not_found(anyhow::anyhow!("Batch {} not found", batch_id)))?;

        let faculty = sqlx::query_as::<_, FacultyAllocation>(
            r#"SELECT fa.id, fa.staff_email, fa.subject_code, fa.created_at
               FROM faculty_allocations fa
               JOIN batch_faculty bf ON bf.allocation_id = fa.id
               WHERE bf.batch_id = $1
               ORDER BY fa.staff_email, fa.subject_code"#,
        )
        .bind(batch_id)
        .fetch_all(db)
        .await
        .map_err(AppError::database)?;

        let students = sqlx::query_scalar::<_, String>(
            "SELECT enrolment_no FROM batch_students WHERE batch_id = $1 ORDER BY enrolment_no",
        )
        .bind(batch_id)
        .fetch_all(db)
        .await
        .map_err(AppError::database)?;

        let departments = sqlx::query_scalar::<_, DepartmentId>(
            "SELECT department_id FROM department_batches WHERE batch_id = $1",
        )
        .bind(batch_id)
        .fetch_all(db)
        .await
        .map_err(AppError::database)?;

        Ok(BatchWithMembers {
            batch,
            faculty,
            students,
            departments,
        })
    }

    #[instrument(skip(db))]
    pub async fn list_batches(db: &PgPool) -> Result<Vec<Batch>, AppError> {
        let batches = sqlx::query_as::<_, Batch>(
            "SELECT id, name, created_at, updated_at FROM batches ORDER BY name, id",
        )
        .fetch_all(db)
        .await
        .map_err(AppError::database)?;
        Ok(batches)
    }

    /// Batches of every department headed by `hod`, locked departments included.
    #[instrument(skip(db))]
    pub async fn list_owned_by(db: &PgPool, hod: &Email) -> Result<Vec<Batch>, AppError> {
        let batches = sqlx::query_as::<_, Batch>(
            r#"SELECT DISTINCT b.id, b.name, b.created_at, b.updated_at
               FROM batches b
               JOIN department_batches db ON db.batch_id = b.id
               JOIN departments d ON d.id = db.department_id
               WHERE d.hod_email = $1
               ORDER BY b.name, b.id"#,
        )
        .bind(hod)
        .fetch_all(db)
        .await
        .map_err(AppError::database)?;
        Ok(batches)
    }

    /// Replaces the batch's allocation set and propagates the staff-level difference.
    #[instrument(skip(db, config))]
    pub async fn set_faculty(
        db: &PgPool,
        config: &SyncConfig,
        batch_id: BatchId,
        allocation_ids: &[AllocationId],
    ) -> Result<(), AppError> {
        let mut tx = db.begin().await.map_err(AppError::database)?;
        Self::lock_batch(&mut tx, batch_id).await?;

        let current: BTreeSet<AllocationId> = sqlx::query_scalar::<_, AllocationId>(
            "SELECT allocation_id FROM batch_faculty WHERE batch_id = $1",
        )
        .bind(batch_id)
        .fetch_all(&mut *tx)
        .await
        .map_err(AppError::database)?
        .into_iter()
        .collect();
        let wanted: BTreeSet<AllocationId> = allocation_ids.iter().copied().collect();

        let added: Vec<AllocationId> = wanted.difference(&current).copied().collect();
        let removed: Vec<AllocationId> = current.difference(&wanted).copied().collect();

        Self::change_faculty_in(&mut tx, config, batch_id.into_inner(), &added, &removed).await?;
        tx.commit().await.map_err(AppError::database)?;
        Ok(())
    }

    #[instrument(skip(db, config))]
    pub async fn add_faculty(
        db: &PgPool,
        config: &SyncConfig,
        batch_id: BatchId,
        allocation_id: AllocationId,
    ) -> Result<(), AppError> {
        let mut tx = db.begin().await.map_err(AppError::database)?;
        Self::lock_batch(&mut tx, batch_id).await?;
        Self::change_faculty_in(&mut tx, config, batch_id.into_inner(), &[allocation_id], &[])
            .await?;
        tx.commit().await.map_err(AppError::database)?;
        Ok(())
    }

    #[instrument(skip(db, config))]
    pub async fn remove_faculty(
        db: &PgPool,
        config: &SyncConfig,
        batch_id: BatchId,
        allocation_id: AllocationId,
    ) -> Result<(), AppError> {
        let mut tx = db.begin().await.map_err(AppError::database)?;
        Self::lock_batch(&mut tx, batch_id).await?;
        Self::change_faculty_in(&mut tx, config, batch_id.into_inner(), &[], &[allocation_id])
            .await?;
        tx.commit().await.map_err(AppError::database)?;
        Ok(())
    }

    #[instrument(skip(db, students))]
    pub async fn set_students(
        db: &PgPool,
        batch_id: BatchId,
        students: &[String],
    ) -> Result<(), AppError> {
        let mut tx = db.begin().await.map_err(AppError::database)?;
        Self::lock_batch(&mut tx, batch_id).await?;
        Self::replace_students(&mut tx, batch_id, students).await?;
        tx.commit().await.map_err(AppError::database)?;
        Ok(())
    }

    #[instrument(skip(db, config))]
    pub async fn delete_batch(
        db: &PgPool,
        config: &SyncConfig,
        batch_id: BatchId,
    ) -> Result<(), AppError> {
        let mut tx = db.begin().await.map_err(AppError::database)?;
        Self::lock_batch(&mut tx, batch_id).await?;
        Self::delete_in(&mut tx, config, batch_id.into_inner()).await?;
        tx.commit().await.map_err(AppError::database)?;
        Ok(())
    }

    /// Writes the allocation changes, then runs the faculty-change hook against
    /// the new faculty set for every department containing the batch.
    pub(crate) async fn change_faculty_in(
        conn: &mut PgConnection,
        config: &SyncConfig,
        batch_id: Uuid,
        add: &[AllocationId],
        remove: &[AllocationId],
    ) -> Result<(), AppError> {
        if add.is_empty() && remove.is_empty() {
            return Ok(());
        }

        let added_staff = Self::allocation_staff(conn, add).await?;
        if added_staff.len() != add.iter().collect::<BTreeSet<_>>().len() {
            return Err(AppError::not_found(anyhow::anyhow!(
                "One or more faculty allocations do not exist"
            )));
        }
        let removed_staff = Self::allocation_staff(conn, remove).await?;

        sqlx::query(
            "DELETE FROM batch_faculty WHERE batch_id = $1 AND allocation_id = ANY($2)",
        )
        .bind(batch_id)
        .bind(remove)
        .execute(&mut *conn)
        .await
        .map_err(AppError::database)?;
        sqlx::query(
            r#"INSERT INTO batch_faculty (batch_id, allocation_id)
               SELECT $1, UNNEST($2::UUID[])
               ON CONFLICT DO NOTHING"#,
        )
        .bind(batch_id)
        .bind(add)
        .execute(&mut *conn)
        .await
        .map_err(AppError::database)?;

        let batch = snapshot::load_batch(conn, batch_id)
            .await
            .map_err(AppError::database)?
            .ok_or_else(|| AppError::not_found(anyhow::anyhow!("Batch {} not found", batch_id)))?;
        let departments = snapshot::load_departments_containing(conn, batch_id)
            .await
            .map_err(AppError::database)?;

        let added: Vec<StaffHandle> = added_staff.into_iter().map(|(_, s)| s).collect();
        let removed: Vec<StaffHandle> = removed_staff.into_iter().map(|(_, s)| s).collect();
        let plan = observer::on_batch_faculty_changed(&batch, &departments, &added, &removed);

        PermissionSyncService::propagate(conn, SyncEvent::BatchFacultyChanged, plan, config).await
    }

    /// Revokes the batch's entries under every department still referencing it, then deletes it.
    pub(crate) async fn delete_in(
        conn: &mut PgConnection,
        config: &SyncConfig,
        batch_id: Uuid,
    ) -> Result<(), AppError> {
        let batch = snapshot::load_batch(conn, batch_id)
            .await
            .map_err(AppError::database)?;
        let Some(batch) = batch else {
            warn!(%batch_id, "Batch already deleted");
            return Ok(());
        };
        let departments = snapshot::load_departments_containing(conn, batch_id)
            .await
            .map_err(AppError::database)?;

        let plan = observer::on_batch_pre_delete(&batch, &departments);
        PermissionSyncService::propagate(conn, SyncEvent::BatchDeleted, plan, config).await?;

        sqlx::query("DELETE FROM batches WHERE id = $1")
            .bind(batch_id)
            .execute(&mut *conn)
            .await
            .map_err(AppError::database)?;

        info!(%batch_id, name = %batch.name, "Batch deleted");
        Ok(())
    }

    async fn lock_batch(conn: &mut PgConnection, batch_id: BatchId) -> Result<(), AppError> {
        sqlx::query_scalar::<_, Uuid>("SELECT id FROM batches WHERE id = $1 FOR UPDATE")
            .bind(batch_id)
            .fetch_optional(&mut *conn)
            .await
            .map_err(AppError::database)?
            .map(|_| ())
            .ok_or_else(|| AppError::not_found(anyhow::anyhow!("Batch {} not found", batch_id)))
    }

    async fn allocation_staff(
        conn: &mut PgConnection,
        allocation_ids: &[AllocationId],
    ) -> Result<Vec<(AllocationId, StaffHandle)>, AppError> {
        if allocation_ids.is_empty() {
            return Ok(Vec::new());
        }

        let rows = sqlx::query_as::<_, (AllocationId, String)>(
            r#"SELECT id, staff_email FROM faculty_allocations
               WHERE id = ANY($1)
               ORDER BY staff_email"#,
        )
        .bind(allocation_ids)
        .fetch_all(&mut *conn)
        .await
        .map_err(AppError::database)?;

        Ok(rows
            .into_iter()
            .map(|(id, email)| (id, StaffHandle::new(email)))
            .collect())
    }

    async fn replace_students(
        conn: &mut PgConnection,
        batch_id: BatchId,
        students: &[String],
    ) -> Result<(), AppError> {
        sqlx::query("DELETE FROM batch_students WHERE batch_id = $1")
            .bind(batch_id)
            .execute(&mut *conn)
            .await
            .map_err(AppError::database)?;

        if students.is_empty() {
            return Ok(());
        }

        sqlx::query(
            r#"INSERT INTO batch_students (batch_id, enrolment_no)
               SELECT $1, UNNEST($2::VARCHAR[])
               ON CONFLICT DO NOTHING"#,
        )
        .bind(batch_id)
        .bind(students)
        .execute(&mut *conn)
        .await
        .map_err(AppError::database)?;

        Ok(())
    }
}
