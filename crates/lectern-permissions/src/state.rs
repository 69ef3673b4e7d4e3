//! Structural snapshots the observer reads.
//!
//! The persistence layer builds these from its rows at the right lifecycle
//! point (the persisted row before a department write, the new membership
//! sets after a batch or faculty write) and hands them to the observer.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

use crate::scope::{DepartmentScope, ScopePath, StaffHandle};

/// A batch and the staff members currently holding at least one allocation in it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchState {
    pub id: Uuid,
    pub name: String,
    pub faculty: BTreeSet<StaffHandle>,
}

impl BatchState {
    pub fn new(id: Uuid, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            faculty: BTreeSet::new(),
        }
    }

    pub fn with_faculty<I, S>(mut self, faculty: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<StaffHandle>,
    {
        self.faculty.extend(faculty.into_iter().map(Into::into));
        self
    }

    pub fn has_faculty(&self, staff: &StaffHandle) -> bool {
        self.faculty.contains(staff)
    }
}

/// A department with its lock state, HOD and attached batches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepartmentState {
    pub id: Uuid,
    pub scope: DepartmentScope,
    pub hod: StaffHandle,
    pub locked: bool,
    pub batches: Vec<BatchState>,
}

impl DepartmentState {
    pub fn path(&self, batch: &BatchState) -> ScopePath {
        self.scope.batch(batch.name.clone())
    }

    pub fn contains_batch(&self, batch_id: Uuid) -> bool {
        self.batches.iter().any(|b| b.id == batch_id)
    }

    pub fn is_hod(&self, staff: &StaffHandle) -> bool {
        &self.hod == staff
    }
}
