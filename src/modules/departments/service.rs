use lectern_config::SyncConfig;
use lectern_core::AppError;
use lectern_models::{
    Batch, BatchId, Branch, CreateDepartmentDto, Department, DepartmentId, DepartmentWithBatches,
    Email, UpdateDepartmentDto,
};
use lectern_permissions::{BatchState, DepartmentScope, DepartmentState, StaffHandle, observer};
use sqlx::{PgConnection, PgPool};
use std::collections::BTreeSet;
use tracing::{info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

use crate::modules::batches::BatchService;
use crate::modules::permissions::{PermissionSyncService, SyncEvent, snapshot};

const DEPARTMENT_COLUMNS: &str =
    "id, year, semester, name, hod_email, locked, created_at, updated_at";

pub struct DepartmentService;

impl DepartmentService {
    /// Creates a department, then attaches `dto.batch_ids` through the membership hook.
    #[instrument(
        skip(db, config, dto),
        fields(year = %dto.year, semester = %dto.semester, name = %dto.name)
    )]
    pub async fn create_department(
        db: &PgPool,
        config: &SyncConfig,
        dto: CreateDepartmentDto,
    ) -> Result<DepartmentWithBatches, AppError> {
        dto.validate().map_err(AppError::validation)?;

        let mut tx = db.begin().await.map_err(AppError::database)?;
        Self::ensure_staff_exists(&mut tx, &dto.hod_email).await?;

        let id = DepartmentId::new();
        let state = DepartmentState {
            id: id.into_inner(),
            scope: DepartmentScope::new(&dto.year, &dto.semester, &dto.name),
            hod: StaffHandle::new(dto.hod_email.as_str()),
            locked: dto.locked,
            batches: Vec::new(),
        };
        let plan = observer::on_department_pre_save(None, &state);
        PermissionSyncService::propagate(&mut tx, SyncEvent::DepartmentSaved, plan, config)
            .await?;

        sqlx::query(
            r#"INSERT INTO departments (id, year, semester, name, hod_email, locked)
               VALUES ($1, $2, $3, $4, $5, $6)"#,
        )
        .bind(id)
        .bind(&dto.year)
        .bind(&dto.semester)
        .bind(&dto.name)
        .bind(&dto.hod_email)
        .bind(dto.locked)
        .execute(&mut *tx)
        .await
        .map_err(|e| Self::map_scope_conflict(e, &dto.year, &dto.semester, &dto.name))?;

        Self::replace_branches(&mut tx, id, &dto.branch_codes).await?;
        Self::attach_batches_in(&mut tx, config, id, &dto.batch_ids).await?;

        tx.commit().await.map_err(AppError::database)?;
        info!(department_id = %id, "Department created");

        Self::get_department(db, id).await
    }

    #[instrument(skip(db))]
    pub async fn get_department(
        db: &PgPool,
        department_id: DepartmentId,
    ) -> Result<DepartmentWithBatches, AppError> {
        let department = sqlx::query_as::<_, Department>(&format!(
            "SELECT {DEPARTMENT_COLUMNS} FROM departments WHERE id = $1"
        ))
        .bind(department_id)
        .fetch_optional(db)
        .await
        .map_err(AppError::database)?
        .ok_or_else(|| Self::not_found(department_id))?;

        let batches = sqlx::query_as::<_, Batch>(
            r#"SELECT b.id, b.name, b.created_at, b.updated_at
               FROM batches b
               JOIN department_batches db ON db.batch_id = b.id
               WHERE db.department_id = $1
               ORDER BY b.name"#,
        )
        .bind(department_id)
        .fetch_all(db)
        .await
        .map_err(AppError::database)?;

        let branches = sqlx::query_as::<_, Branch>(
            r#"SELECT br.code, br.short_name, br.full_name, br.available,
                      br.created_at, br.updated_at
               FROM branches br
               JOIN department_branches dbr ON dbr.branch_code = br.code
               WHERE dbr.department_id = $1
               ORDER BY br.short_name, br.code"#,
        )
        .bind(department_id)
        .fetch_all(db)
        .await
        .map_err(AppError::database)?;

        Ok(DepartmentWithBatches {
            department,
            batches,
            branches,
        })
    }

    #[instrument(skip(db))]
    pub async fn list_departments(db: &PgPool) -> Result<Vec<Department>, AppError> {
        let departments = sqlx::query_as::<_, Department>(&format!(
            "SELECT {DEPARTMENT_COLUMNS} FROM departments ORDER BY year DESC, semester, name"
        ))
        .fetch_all(db)
        .await
        .map_err(AppError::database)?;
        Ok(departments)
    }

    /// Unlocked departments headed by `hod`.
    #[instrument(skip(db))]
    pub async fn list_owned_by(db: &PgPool, hod: &Email) -> Result<Vec<Department>, AppError> {
        let departments = sqlx::query_as::<_, Department>(&format!(
            r#"SELECT {DEPARTMENT_COLUMNS} FROM departments
               WHERE hod_email = $1 AND locked = FALSE
               ORDER BY year DESC, semester, name"#
        ))
        .bind(hod)
        .fetch_all(db)
        .await
        .map_err(AppError::database)?;
        Ok(departments)
    }

    /// Runs the pre-save hook against the locked row, then writes the changes.
    #[instrument(skip(db, config, dto))]
    pub async fn update_department(
        db: &PgPool,
        config: &SyncConfig,
        department_id: DepartmentId,
        dto: UpdateDepartmentDto,
    ) -> Result<Department, AppError> {
        dto.validate().map_err(AppError::validation)?;

        let mut tx = db.begin().await.map_err(AppError::database)?;
        let old = snapshot::load_department_for_update(&mut tx, department_id.into_inner())
            .await
            .map_err(AppError::database)?
            .ok_or_else(|| Self::not_found(department_id))?;

        if let Some(hod) = &dto.hod_email {
            Self::ensure_staff_exists(&mut tx, hod).await?;
        }

        let mut new = old.clone();
        if let Some(year) = &dto.year {
            new.scope.year = year.clone();
        }
        if let Some(semester) = &dto.semester {
            new.scope.semester = semester.clone();
        }
        if let Some(name) = &dto.name {
            new.scope.department = name.clone();
        }
        if let Some(hod) = &dto.hod_email {
            new.hod = StaffHandle::new(hod.as_str());
        }
        if let Some(locked) = dto.locked {
            new.locked = locked;
        }

        let plan = observer::on_department_pre_save(Some(&old), &new);
        PermissionSyncService::propagate(&mut tx, SyncEvent::DepartmentSaved, plan, config)
            .await?;

        let department = sqlx::query_as::<_, Department>(&format!(
            r#"UPDATE departments SET
                year = $2,
                semester = $3,
                name = $4,
                hod_email = $5,
                locked = $6,
                updated_at = NOW()
               WHERE id = $1
               RETURNING {DEPARTMENT_COLUMNS}"#
        ))
        .bind(department_id)
        .bind(&new.scope.year)
        .bind(&new.scope.semester)
        .bind(&new.scope.department)
        .bind(new.hod.as_str())
        .bind(new.locked)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            Self::map_scope_conflict(e, &new.scope.year, &new.scope.semester, &new.scope.department)
        })?;

        if let Some(codes) = &dto.branch_codes {
            Self::replace_branches(&mut tx, department_id, codes).await?;
        }

        tx.commit().await.map_err(AppError::database)?;
        info!(%department_id, locked = department.locked, "Department updated");
        Ok(department)
    }

    pub async fn lock_department(
        db: &PgPool,
        config: &SyncConfig,
        department_id: DepartmentId,
    ) -> Result<Department, AppError> {
        Self::set_locked(db, config, department_id, true).await
    }

    pub async fn unlock_department(
        db: &PgPool,
        config: &SyncConfig,
        department_id: DepartmentId,
    ) -> Result<Department, AppError> {
        Self::set_locked(db, config, department_id, false).await
    }

    async fn set_locked(
        db: &PgPool,
        config: &SyncConfig,
        department_id: DepartmentId,
        locked: bool,
    ) -> Result<Department, AppError> {
        let dto = UpdateDepartmentDto {
            locked: Some(locked),
            ..Default::default()
        };
        Self::update_department(db, config, department_id, dto).await
    }

    pub async fn change_hod(
        db: &PgPool,
        config: &SyncConfig,
        department_id: DepartmentId,
        hod: Email,
    ) -> Result<Department, AppError> {
        let dto = UpdateDepartmentDto {
            hod_email: Some(hod),
            ..Default::default()
        };
        Self::update_department(db, config, department_id, dto).await
    }

    /// Replaces the set of branches the department serves.
    #[instrument(skip(db))]
    pub async fn set_branches(
        db: &PgPool,
        department_id: DepartmentId,
        branch_codes: &[String],
    ) -> Result<DepartmentWithBatches, AppError> {
        let mut tx = db.begin().await.map_err(AppError::database)?;

        let exists = sqlx::query_scalar::<_, Uuid>(
            "SELECT id FROM departments WHERE id = $1 FOR UPDATE",
        )
        .bind(department_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(AppError::database)?;
        if exists.is_none() {
            return Err(Self::not_found(department_id));
        }

        Self::replace_branches(&mut tx, department_id, branch_codes).await?;
        tx.commit().await.map_err(AppError::database)?;

        Self::get_department(db, department_id).await
    }

    #[instrument(skip(db, config))]
    pub async fn attach_batches(
        db: &PgPool,
        config: &SyncConfig,
        department_id: DepartmentId,
        batch_ids: &[BatchId],
    ) -> Result<(), AppError> {
        let mut tx = db.begin().await.map_err(AppError::database)?;
        Self::attach_batches_in(&mut tx, config, department_id, batch_ids).await?;
        tx.commit().await.map_err(AppError::database)?;
        Ok(())
    }

    /// Detaches batches and deletes them. Batches not attached to the department are ignored.
    #[instrument(skip(db, config))]
    pub async fn detach_batches(
        db: &PgPool,
        config: &SyncConfig,
        department_id: DepartmentId,
        batch_ids: &[BatchId],
    ) -> Result<(), AppError> {
        let mut tx = db.begin().await.map_err(AppError::database)?;
        let before = snapshot::load_department_for_update(&mut tx, department_id.into_inner())
            .await
            .map_err(AppError::database)?
            .ok_or_else(|| Self::not_found(department_id))?;

        let requested: BTreeSet<Uuid> = batch_ids.iter().map(|b| b.into_inner()).collect();
        let (removed, kept): (Vec<BatchState>, Vec<BatchState>) = before
            .batches
            .iter()
            .cloned()
            .partition(|b| requested.contains(&b.id));

        if removed.len() < requested.len() {
            warn!(%department_id, "Some batches are not attached to this department");
        }
        if removed.is_empty() {
            return Ok(());
        }

        let removed_ids: Vec<Uuid> = removed.iter().map(|b| b.id).collect();
        sqlx::query(
            "DELETE FROM department_batches WHERE department_id = $1 AND batch_id = ANY($2)",
        )
        .bind(department_id)
        .bind(&removed_ids)
        .execute(&mut *tx)
        .await
        .map_err(AppError::database)?;

        let after = DepartmentState {
            batches: kept,
            ..before
        };
        let plan = observer::on_department_batches_changed(&after, &[], &removed);
        PermissionSyncService::propagate(
            &mut tx,
            SyncEvent::DepartmentBatchesChanged,
            plan,
            config,
        )
        .await?;

        for batch_id in removed_ids {
            BatchService::delete_in(&mut tx, config, batch_id).await?;
        }

        tx.commit().await.map_err(AppError::database)?;
        Ok(())
    }

    /// Revokes the department's entries, deletes it, then deletes its batches.
    #[instrument(skip(db, config))]
    pub async fn delete_department(
        db: &PgPool,
        config: &SyncConfig,
        department_id: DepartmentId,
    ) -> Result<(), AppError> {
        let mut tx = db.begin().await.map_err(AppError::database)?;
        let department = snapshot::load_department_for_update(&mut tx, department_id.into_inner())
            .await
            .map_err(AppError::database)?
            .ok_or_else(|| Self::not_found(department_id))?;

        let plan = observer::on_department_pre_delete(&department);
        PermissionSyncService::propagate(&mut tx, SyncEvent::DepartmentDeleted, plan, config)
            .await?;

        sqlx::query("DELETE FROM departments WHERE id = $1")
            .bind(department_id)
            .execute(&mut *tx)
            .await
            .map_err(AppError::database)?;

        for batch in &department.batches {
            BatchService::delete_in(&mut tx, config, batch.id).await?;
        }

        tx.commit().await.map_err(AppError::database)?;
        info!(%department_id, batches = department.batches.len(), "Department deleted");
        Ok(())
    }

    /// Attaches existing batches and grants their entries. Already-attached batches are ignored.
    ///
    /// Batch names must stay unique within the department.
    pub(crate) async fn attach_batches_in(
        conn: &mut PgConnection,
        config: &SyncConfig,
        department_id: DepartmentId,
        batch_ids: &[BatchId],
    ) -> Result<(), AppError> {
        if batch_ids.is_empty() {
            return Ok(());
        }

        let raw: Vec<Uuid> = batch_ids.iter().map(|b| b.into_inner()).collect();
        let before = snapshot::lock_department_with_batches(conn, department_id.into_inner(), &raw)
            .await
            .map_err(AppError::database)?
            .ok_or_else(|| Self::not_found(department_id))?;

        let requested: Vec<Uuid> = raw
            .into_iter()
            .filter(|b| !before.contains_batch(*b))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let added = snapshot::load_batches(conn, &requested)
            .await
            .map_err(AppError::database)?;
        if added.len() != requested.len() {
            return Err(AppError::not_found(anyhow::anyhow!(
                "One or more batches do not exist"
            )));
        }

        let mut names: BTreeSet<&str> = before.batches.iter().map(|b| b.name.as_str()).collect();
        for batch in &added {
            if !names.insert(batch.name.as_str()) {
                return Err(AppError::bad_request(anyhow::anyhow!(
                    "Department {} already has a batch named {}",
                    before.scope,
                    batch.name
                )));
            }
        }

        if added.is_empty() {
            return Ok(());
        }

        sqlx::query(
            r#"INSERT INTO department_batches (department_id, batch_id)
               SELECT $1, UNNEST($2::UUID[])"#,
        )
        .bind(department_id)
        .bind(&requested)
        .execute(&mut *conn)
        .await
        .map_err(AppError::database)?;

        let mut after = before.clone();
        after.batches.extend(added.iter().cloned());
        let plan = observer::on_department_batches_changed(&after, &added, &[]);
        PermissionSyncService::propagate(conn, SyncEvent::DepartmentBatchesChanged, plan, config)
            .await
    }

    async fn replace_branches(
        conn: &mut PgConnection,
        department_id: DepartmentId,
        branch_codes: &[String],
    ) -> Result<(), AppError> {
        sqlx::query("DELETE FROM department_branches WHERE department_id = $1")
            .bind(department_id)
            .execute(&mut *conn)
            .await
            .map_err(AppError::database)?;

        let codes: Vec<String> = branch_codes
            .iter()
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        if codes.is_empty() {
            return Ok(());
        }

        sqlx::query(
            r#"INSERT INTO department_branches (department_id, branch_code)
               SELECT $1, UNNEST($2::VARCHAR[])"#,
        )
        .bind(department_id)
        .bind(&codes)
        .execute(&mut *conn)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(db_err) = &e
                && db_err.is_foreign_key_violation()
            {
                return AppError::bad_request(anyhow::anyhow!(
                    "One or more branches do not exist"
                ));
            }
            AppError::database(e)
        })?;

        Ok(())
    }

    async fn ensure_staff_exists(conn: &mut PgConnection, email: &Email) -> Result<(), AppError> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM staff WHERE email = $1)",
        )
        .bind(email)
        .fetch_one(&mut *conn)
        .await
        .map_err(AppError::database)?;

        if exists {
            Ok(())
        } else {
            Err(AppError::bad_request(anyhow::anyhow!(
                "Staff member {} does not exist",
                email
            )))
        }
    }

    fn map_scope_conflict(err: sqlx::Error, year: &str, semester: &str, name: &str) -> AppError {
        if let sqlx::Error::Database(db_err) = &err
            && db_err.is_unique_violation()
        {
            return AppError::conflict(anyhow::anyhow!(
                "Department {}/{}/{} already exists",
                year,
                semester,
                name
            ));
        }
        AppError::database(err)
    }

    fn not_found(department_id: DepartmentId) -> AppError {
        AppError::not_found(anyhow::anyhow!("Department {} not found", department_id))
    }
}
