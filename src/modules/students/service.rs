use lectern_core::AppError;
use lectern_models::{CreateStudentDto, Student};
use sqlx::PgPool;
use tracing::instrument;
use validator::Validate;

const STUDENT_COLUMNS: &str = "enrolment_no, email, first_name, middle_name, last_name, \
                               year_joined, graduated, branch_code, created_at";

pub struct StudentService;

impl StudentService {
    #[instrument(skip(db, dto), fields(enrolment_no = %dto.enrolment_no))]
    pub async fn create_student(db: &PgPool, dto: CreateStudentDto) -> Result<Student, AppError> {
        dto.validate().map_err(AppError::validation)?;

        sqlx::query_as::<_, Student>(&format!(
            r#"INSERT INTO students (
                   enrolment_no, email, first_name, middle_name,
                   last_name, year_joined, branch_code
               )
               VALUES ($1, $2, $3, $4, $5, $6, $7)
               RETURNING {STUDENT_COLUMNS}"#
        ))
        .bind(&dto.enrolment_no)
        .bind(dto.email.to_lowercase())
        .bind(&dto.first_name)
        .bind(&dto.middle_name)
        .bind(&dto.last_name)
        .bind(dto.year_joined)
        .bind(&dto.branch_code)
        .fetch_one(db)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(db_err) = &e
                && db_err.is_unique_violation()
            {
                return AppError::conflict(anyhow::anyhow!(
                    "A student with enrolment number {} or email {} already exists",
                    dto.enrolment_no,
                    dto.email
                ));
            }
            if let sqlx::Error::Database(db_err) = &e
                && db_err.is_foreign_key_violation()
            {
                return AppError::bad_request(anyhow::anyhow!(
                    "Branch {} does not exist",
                    dto.branch_code.as_deref().unwrap_or_default()
                ));
            }
            AppError::database(e)
        })
    }

    #[instrument(skip(db))]
    pub async fn get_student(db: &PgPool, enrolment_no: &str) -> Result<Student, AppError> {
        sqlx::query_as::<_, Student>(&format!(
            "SELECT {STUDENT_COLUMNS} FROM students WHERE enrolment_no = $1"
        ))
        .bind(enrolment_no)
        .fetch_optional(db)
        .await
        .map_err(AppError::database)?
        .ok_or_else(|| AppError::not_found(anyhow::anyhow!("Student {} not found", enrolment_no)))
    }

    /// Newest intake first. Graduated students are included only on request.
    #[instrument(skip(db))]
    pub async fn list_students(
        db: &PgPool,
        include_graduated: bool,
    ) -> Result<Vec<Student>, AppError> {
        let students = sqlx::query_as::<_, Student>(&format!(
            r#"SELECT {STUDENT_COLUMNS} FROM students
               WHERE $1 OR graduated = FALSE
               ORDER BY year_joined DESC, enrolment_no"#
        ))
        .bind(include_graduated)
        .fetch_all(db)
        .await
        .map_err(AppError::database)?;
        Ok(students)
    }
}
