//! Subjects and faculty allocations.
//!
//! An allocation pairs a staff member with a subject they teach. Batches
//! hold allocations; a staff member belongs to a batch's faculty while at
//! least one of their allocations is attached to it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use crate::ids::AllocationId;
use crate::value_types::Email;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Subject {
    pub code: String,
    pub short_name: String,
    pub full_name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateSubjectDto {
    #[validate(length(min = 1, max = 15))]
    pub code: String,
    #[validate(length(min = 1, max = 10))]
    pub short_name: String,
    #[validate(length(min = 1, max = 50))]
    pub full_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct FacultyAllocation {
    pub id: AllocationId,
    pub staff_email: Email,
    pub subject_code: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateAllocationDto {
    pub staff_email: Email,
    #[validate(length(min = 1, max = 15))]
    pub subject_code: String,
}
