use lectern_core::AppError;
use lectern_models::{Branch, CreateBranchDto, UpdateBranchDto};
use sqlx::PgPool;
use tracing::{info, instrument};
use validator::Validate;

const BRANCH_COLUMNS: &str = "code, short_name, full_name, available, created_at, updated_at";

pub struct BranchService;

impl BranchService {
    #[instrument(skip(db, dto), fields(code = %dto.code))]
    pub async fn create_branch(db: &PgPool, dto: CreateBranchDto) -> Result<Branch, AppError> {
        dto.validate().map_err(AppError::validation)?;

        let branch = sqlx::query_as::<_, Branch>(&format!(
            r#"INSERT INTO branches (code, short_name, full_name, available)
               VALUES ($1, $2, $3, $4)
               RETURNING {BRANCH_COLUMNS}"#
        ))
        .bind(&dto.code)
        .bind(&dto.short_name)
        .bind(&dto.full_name)
        .bind(dto.available)
        .fetch_one(db)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(db_err) = &e
                && db_err.is_unique_violation()
            {
                return AppError::conflict(anyhow::anyhow!(
                    "Branch {} already exists",
                    dto.code
                ));
            }
            AppError::database(e)
        })?;

        info!(code = %branch.code, "Branch created");
        Ok(branch)
    }

    #[instrument(skip(db))]
    pub async fn get_branch(db: &PgPool, code: &str) -> Result<Branch, AppError> {
        sqlx::query_as::<_, Branch>(&format!(
            "SELECT {BRANCH_COLUMNS} FROM branches WHERE code = $1"
        ))
        .bind(code)
        .fetch_optional(db)
        .await
        .map_err(AppError::database)?
        .ok_or_else(|| Self::not_found(code))
    }

    /// All branches, or only those open for enrolment.
    #[instrument(skip(db))]
    pub async fn list_branches(db: &PgPool, available_only: bool) -> Result<Vec<Branch>, AppError> {
        let branches = sqlx::query_as::<_, Branch>(&format!(
            r#"SELECT {BRANCH_COLUMNS} FROM branches
               WHERE NOT $1 OR available = TRUE
               ORDER BY short_name, code"#
        ))
        .bind(available_only)
        .fetch_all(db)
        .await
        .map_err(AppError::database)?;
        Ok(branches)
    }

    #[instrument(skip(db, dto))]
    pub async fn update_branch(
        db: &PgPool,
        code: &str,
        dto: UpdateBranchDto,
    ) -> Result<Branch, AppError> {
        dto.validate().map_err(AppError::validation)?;

        sqlx::query_as::<_, Branch>(&format!(
            r#"UPDATE branches SET
                short_name = COALESCE($2, short_name),
                full_name = COALESCE($3, full_name),
                available = COALESCE($4, available),
                updated_at = NOW()
               WHERE code = $1
               RETURNING {BRANCH_COLUMNS}"#
        ))
        .bind(code)
        .bind(&dto.short_name)
        .bind(&dto.full_name)
        .bind(dto.available)
        .fetch_optional(db)
        .await
        .map_err(AppError::database)?
        .ok_or_else(|| Self::not_found(code))
    }

    /// Deletes the branch, its department links and the students enrolled in it.
    #[instrument(skip(db))]
    pub async fn delete_branch(db: &PgPool, code: &str) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM branches WHERE code = $1")
            .bind(code)
            .execute(db)
            .await
            .map_err(AppError::database)?;

        if result.rows_affected() == 0 {
            return Err(Self::not_found(code));
        }

        info!(%code, "Branch deleted");
        Ok(())
    }

    fn not_found(code: &str) -> AppError {
        AppError::not_found(anyhow::anyhow!("Branch {} not found", code))
    }
}
