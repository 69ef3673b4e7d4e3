//! Department models and DTOs.
//!
//! A department is addressed in permission documents by its
//! (year, semester, name) triple, which is unique across departments.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use crate::batches::Batch;
use crate::branches::Branch;
use crate::ids::{BatchId, DepartmentId};
use crate::value_types::Email;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Department {
    pub id: DepartmentId,
    pub year: String,
    pub semester: String,
    pub name: String,
    pub hod_email: Email,
    pub locked: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DepartmentWithBatches {
    #[serde(flatten)]
    pub department: Department,
    pub batches: Vec<Batch>,
    pub branches: Vec<Branch>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateDepartmentDto {
    #[validate(length(min = 1, max = 7))]
    pub year: String,
    #[validate(length(equal = 1))]
    pub semester: String,
    #[validate(length(min = 1, max = 20))]
    pub name: String,
    pub hod_email: Email,
    #[serde(default)]
    pub locked: bool,
    #[serde(default)]
    pub batch_ids: Vec<BatchId>,
    #[serde(default)]
    pub branch_codes: Vec<String>,
}

/// Row changes. `None` keeps the current value.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateDepartmentDto {
    #[validate(length(min = 1, max = 7))]
    pub year: Option<String>,
    #[validate(length(equal = 1))]
    pub semester: Option<String>,
    #[validate(length(min = 1, max = 20))]
    pub name: Option<String>,
    pub hod_email: Option<Email>,
    pub locked: Option<bool>,
    /// Replaces the department's branch set.
    pub branch_codes: Option<Vec<String>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dto() -> CreateDepartmentDto {
        CreateDepartmentDto {
            year: "2024-25".into(),
            semester: "5".into(),
            name: "CE_IT_2".into(),
            hod_email: Email::new("hod@college.edu").unwrap(),
            locked: false,
            batch_ids: vec![],
            branch_codes: vec!["2654862341".into()],
        }
    }

    #[test]
    fn test_create_department_limits() {
        assert!(dto().validate().is_ok());

        let mut long_year = dto();
        long_year.year = "2024-2025".into();
        assert!(long_year.validate().is_err());

        let mut two_char_semester = dto();
        two_char_semester.semester = "10".into();
        assert!(two_char_semester.validate().is_err());

        let mut long_name = dto();
        long_name.name = "X".repeat(21);
        assert!(long_name.validate().is_err());
    }

    #[test]
    fn test_update_department_semester_must_be_one_char() {
        let update = UpdateDepartmentDto {
            semester: Some(String::new()),
            ..Default::default()
        };
        assert!(update.validate().is_err());
        assert!(UpdateDepartmentDto::default().validate().is_ok());
    }
}
