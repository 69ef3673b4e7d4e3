//! Branches (e.g. CSE, ME). A department serves a set of branches; a student
//! is enrolled in one. Branches never affect permissions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Branch {
    pub code: String,
    pub short_name: String,
    pub full_name: String,
    /// Open for enrolment.
    pub available: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateBranchDto {
    #[validate(length(min = 1, max = 15))]
    pub code: String,
    #[validate(length(min = 1, max = 10))]
    pub short_name: String,
    #[validate(length(min = 1, max = 50))]
    pub full_name: String,
    #[serde(default = "default_available")]
    pub available: bool,
}

fn default_available() -> bool {
    true
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateBranchDto {
    #[validate(length(min = 1, max = 10))]
    pub short_name: Option<String>,
    #[validate(length(min = 1, max = 50))]
    pub full_name: Option<String>,
    pub available: Option<bool>,
}
