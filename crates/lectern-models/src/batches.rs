//! Batch models and DTOs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use crate::faculty::FacultyAllocation;
use crate::ids::{AllocationId, BatchId, DepartmentId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Batch {
    pub id: BatchId,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchWithMembers {
    #[serde(flatten)]
    pub batch: Batch,
    pub faculty: Vec<FacultyAllocation>,
    pub students: Vec<String>,
    pub departments: Vec<DepartmentId>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateBatchDto {
    #[validate(length(min = 1, max = 10))]
    pub name: String,
    #[serde(default)]
    pub allocation_ids: Vec<AllocationId>,
    #[serde(default)]
    pub students: Vec<String>,
    /// Department to attach the new batch to in the same transaction.
    pub department_id: Option<DepartmentId>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_name_limit() {
        let mut dto = CreateBatchDto {
            name: "B1".into(),
            allocation_ids: vec![],
            students: vec![],
            department_id: None,
        };
        assert!(dto.validate().is_ok());

        dto.name = "BATCH_NAME_11".into();
        assert!(dto.validate().is_err());
    }
}
