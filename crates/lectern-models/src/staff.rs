//! Staff member models and DTOs.
//!
//! A staff member's permission document lives in the same row but is never
//! part of these types: it is read and written only through the permission
//! sync service.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use crate::value_types::{Email, StaffCategory};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Staff {
    pub email: Email,
    pub first_name: String,
    pub middle_name: Option<String>,
    pub last_name: String,
    pub short_name: String,
    #[sqlx(try_from = "String")]
    pub category: StaffCategory,
    pub active: bool,
    pub admin: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Staff {
    pub fn full_name(&self) -> String {
        match &self.middle_name {
            Some(middle) => format!("{} {} {}", self.first_name, middle, self.last_name),
            None => format!("{} {}", self.first_name, self.last_name),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateStaffDto {
    pub email: Email,
    #[validate(length(min = 1, max = 20))]
    pub first_name: String,
    #[validate(length(max = 20))]
    pub middle_name: Option<String>,
    #[validate(length(min = 1, max = 20))]
    pub last_name: String,
    #[validate(length(min = 1, max = 5))]
    pub short_name: String,
    pub category: StaffCategory,
    #[serde(default)]
    pub admin: bool,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateStaffDto {
    #[validate(length(min = 1, max = 20))]
    pub first_name: Option<String>,
    #[validate(length(max = 20))]
    pub middle_name: Option<String>,
    #[validate(length(min = 1, max = 20))]
    pub last_name: Option<String>,
    #[validate(length(min = 1, max = 5))]
    pub short_name: Option<String>,
    pub category: Option<StaffCategory>,
    pub active: Option<bool>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct StaffFilter {
    #[serde(default)]
    pub active_only: bool,
}
