use lectern_core::AppError;
use lectern_models::{CreateStaffDto, Email, Staff, StaffFilter, UpdateStaffDto};
use lectern_permissions::PermissionDocument;
use sqlx::PgPool;
use tracing::instrument;
use validator::Validate;

use crate::modules::permissions::PermissionSyncService;

const STAFF_COLUMNS: &str = "email, first_name, middle_name, last_name, short_name, category, \
                             active, admin, created_at, updated_at";

pub struct StaffService;

impl StaffService {
    /// Creates a staff member with an empty permission document.
    #[instrument(skip(db, dto), fields(email = %dto.email))]
    pub async fn create_staff(db: &PgPool, dto: CreateStaffDto) -> Result<Staff, AppError> {
        dto.validate().map_err(AppError::validation)?;

        let staff = sqlx::query_as::<_, Staff>(&format!(
            r#"INSERT INTO staff
                   (email, first_name, middle_name, last_name, short_name, category, admin)
               VALUES ($1, $2, $3, $4, $5, $6, $7)
               RETURNING {STAFF_COLUMNS}"#
        ))
        .bind(&dto.email)
        .bind(&dto.first_name)
        .bind(&dto.middle_name)
        .bind(&dto.last_name)
        .bind(&dto.short_name)
        .bind(dto.category.as_str())
        .bind(dto.admin)
        .fetch_one(db)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(db_err) = &e
                && db_err.is_unique_violation()
            {
                return AppError::conflict(anyhow::anyhow!(
                    "A staff member with email {} already exists",
                    dto.email
                ));
            }
            AppError::database(e)
        })?;

        Ok(staff)
    }

    #[instrument(skip(db))]
    pub async fn get_staff(db: &PgPool, email: &Email) -> Result<Staff, AppError> {
        sqlx::query_as::<_, Staff>(&format!(
            "SELECT {STAFF_COLUMNS} FROM staff WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(db)
        .await
        .map_err(AppError::database)?
        .ok_or_else(|| AppError::not_found(anyhow::anyhow!("Staff member {} not found", email)))
    }

    #[instrument(skip(db))]
    pub async fn list_staff(db: &PgPool, filter: StaffFilter) -> Result<Vec<Staff>, AppError> {
        let mut query = format!("SELECT {STAFF_COLUMNS} FROM staff");
        if filter.active_only {
            query.push_str(" WHERE active = TRUE");
        }
        query.push_str(" ORDER BY email");

        let staff = sqlx::query_as::<_, Staff>(&query)
            .fetch_all(db)
            .await
            .map_err(AppError::database)?;
        Ok(staff)
    }

    /// Updates descriptive fields. The permission document is never written here.
    #[instrument(skip(db, dto))]
    pub async fn update_staff(
        db: &PgPool,
        email: &Email,
        dto: UpdateStaffDto,
    ) -> Result<Staff, AppError> {
        dto.validate().map_err(AppError::validation)?;

        sqlx::query_as::<_, Staff>(&format!(
            r#"UPDATE staff SET
                first_name = COALESCE($2, first_name),
                middle_name = COALESCE($3, middle_name),
                last_name = COALESCE($4, last_name),
                short_name = COALESCE($5, short_name),
                category = COALESCE($6, category),
                active = COALESCE($7, active),
                updated_at = NOW()
               WHERE email = $1
               RETURNING {STAFF_COLUMNS}"#
        ))
        .bind(email)
        .bind(&dto.first_name)
        .bind(&dto.middle_name)
        .bind(&dto.last_name)
        .bind(&dto.short_name)
        .bind(dto.category.map(|c| c.as_str()))
        .bind(dto.active)
        .fetch_optional(db)
        .await
        .map_err(AppError::database)?
        .ok_or_else(|| AppError::not_found(anyhow::anyhow!("Staff member {} not found", email)))
    }

    pub async fn get_permissions(
        db: &PgPool,
        email: &Email,
    ) -> Result<PermissionDocument, AppError> {
        PermissionSyncService::document(db, email).await
    }
}
