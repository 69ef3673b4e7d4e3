//! Student models and DTOs. Batch membership of students never affects permissions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Student {
    pub enrolment_no: String,
    pub email: String,
    pub first_name: String,
    pub middle_name: Option<String>,
    pub last_name: String,
    pub year_joined: i32,
    pub graduated: bool,
    pub branch_code: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateStudentDto {
    #[validate(length(min = 1, max = 16))]
    pub enrolment_no: String,
    #[validate(email, length(max = 30))]
    pub email: String,
    #[validate(length(min = 1, max = 20))]
    pub first_name: String,
    #[validate(length(max = 20))]
    pub middle_name: Option<String>,
    #[validate(length(min = 1, max = 20))]
    pub last_name: String,
    #[validate(range(min = 1900, max = 2100))]
    pub year_joined: i32,
    #[validate(length(min = 1, max = 15))]
    pub branch_code: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_student_email_is_validated() {
        let mut dto = CreateStudentDto {
            enrolment_no: "22002170110045".into(),
            email: "22002170110045@college.edu".into(),
            first_name: "Riya".into(),
            middle_name: None,
            last_name: "Shah".into(),
            year_joined: 2022,
            branch_code: Some("2654862341".into()),
        };
        assert!(dto.validate().is_ok());

        dto.email = "not-an-email".into();
        assert!(dto.validate().is_err());
    }
}
