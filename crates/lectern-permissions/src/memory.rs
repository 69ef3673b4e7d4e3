//! In-memory college model.
//!
//! Holds staff documents, departments, batches and faculty allocations in
//! plain maps and runs every structural operation through the observer at
//! the same lifecycle points as the database services: department row
//! changes are planned against the old row before it is replaced, membership
//! changes are planned against the new membership after it is written.
//! Used to simulate structural edits and to check the engine against the
//! derived state.

use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;
use uuid::Uuid;

use crate::derive::{Drift, check_invariant};
use crate::document::PermissionDocument;
use crate::observer;
use crate::plan::PropagationPlan;
use crate::scope::{DepartmentScope, StaffHandle};
use crate::state::{BatchState, DepartmentState};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CollegeError {
    #[error("staff member {0} does not exist")]
    UnknownStaff(StaffHandle),
    #[error("department {0} does not exist")]
    UnknownDepartment(Uuid),
    #[error("batch {0} does not exist")]
    UnknownBatch(Uuid),
    #[error("allocation {0} does not exist")]
    UnknownAllocation(Uuid),
    #[error("a department already exists for {0}")]
    DuplicateScope(DepartmentScope),
    #[error("department {department} already has a batch named {name}")]
    DuplicateBatchName { department: Uuid, name: String },
}

/// Field changes for [`College::update_department`]. `None` keeps the current value.
#[derive(Debug, Clone, Default)]
pub struct DepartmentChanges {
    pub scope: Option<DepartmentScope>,
    pub hod: Option<StaffHandle>,
    pub locked: Option<bool>,
}

#[derive(Debug, Clone)]
struct DepartmentRecord {
    scope: DepartmentScope,
    hod: StaffHandle,
    locked: bool,
    batches: Vec<Uuid>,
}

#[derive(Debug, Clone)]
struct BatchRecord {
    name: String,
    allocations: BTreeMap<Uuid, StaffHandle>,
}

#[derive(Debug, Default)]
pub struct College {
    staff: BTreeMap<StaffHandle, PermissionDocument>,
    departments: BTreeMap<Uuid, DepartmentRecord>,
    batches: BTreeMap<Uuid, BatchRecord>,
    next_id: u128,
}

impl College {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_staff(&mut self, staff: impl Into<StaffHandle>) -> StaffHandle {
        let staff = staff.into();
        self.staff.entry(staff.clone()).or_default();
        staff
    }

    pub fn document(&self, staff: &StaffHandle) -> Option<&PermissionDocument> {
        self.staff.get(staff)
    }

    pub fn documents(&self) -> &BTreeMap<StaffHandle, PermissionDocument> {
        &self.staff
    }

    pub fn department_ids(&self) -> Vec<Uuid> {
        self.departments.keys().copied().collect()
    }

    pub fn batch_ids(&self) -> Vec<Uuid> {
        self.batches.keys().copied().collect()
    }

    pub fn allocation_ids(&self, batch_id: Uuid) -> Vec<Uuid> {
        self.batches
            .get(&batch_id)
            .map(|b| b.allocations.keys().copied().collect())
            .unwrap_or_default()
    }

    /// Every department with its batches, in id order.
    pub fn snapshot(&self) -> Vec<DepartmentState> {
        self.departments
            .iter()
            .map(|(id, record)| self.department_state(*id, record))
            .collect()
    }

    /// Staff whose document differs from the one derived from the current structure.
    pub fn drift(&self) -> Vec<Drift> {
        check_invariant(&self.snapshot(), &self.staff)
    }

    /// Creates a batch with one allocation per listed staff member. The batch starts detached.
    pub fn create_batch<I, S>(
        &mut self,
        name: impl Into<String>,
        faculty: I,
    ) -> Result<Uuid, CollegeError>
    where
        I: IntoIterator<Item = S>,
        S: Into<StaffHandle>,
    {
        let mut allocations = BTreeMap::new();
        for staff in faculty {
            let staff = self.known_staff(staff.into())?;
            allocations.insert(self.fresh_id(), staff);
        }

        let id = self.fresh_id();
        self.batches.insert(
            id,
            BatchRecord {
                name: name.into(),
                allocations,
            },
        );
        Ok(id)
    }

    /// Creates a department, then attaches `batches` through the membership hook.
    pub fn create_department(
        &mut self,
        scope: DepartmentScope,
        hod: impl Into<StaffHandle>,
        locked: bool,
        batches: &[Uuid],
    ) -> Result<Uuid, CollegeError> {
        let hod = self.known_staff(hod.into())?;
        self.ensure_scope_free(&scope, None)?;
        for batch_id in batches {
            self.batch_record(*batch_id)?;
        }

        let id = self.fresh_id();
        let record = DepartmentRecord {
            scope,
            hod,
            locked,
            batches: Vec::new(),
        };

        let plan = observer::on_department_pre_save(None, &self.department_state(id, &record));
        self.apply(plan);
        self.departments.insert(id, record);

        self.attach_batches(id, batches)?;
        Ok(id)
    }

    pub fn update_department(
        &mut self,
        id: Uuid,
        changes: DepartmentChanges,
    ) -> Result<(), CollegeError> {
        let old_record = self.department_record(id)?.clone();
        let mut new_record = old_record.clone();

        if let Some(scope) = changes.scope {
            self.ensure_scope_free(&scope, Some(id))?;
            new_record.scope = scope;
        }
        if let Some(hod) = changes.hod {
            new_record.hod = self.known_staff(hod)?;
        }
        if let Some(locked) = changes.locked {
            new_record.locked = locked;
        }

        let old = self.department_state(id, &old_record);
        let new = self.department_state(id, &new_record);
        let plan = observer::on_department_pre_save(Some(&old), &new);
        self.apply(plan);
        self.departments.insert(id, new_record);
        Ok(())
    }

    pub fn set_locked(&mut self, id: Uuid, locked: bool) -> Result<(), CollegeError> {
        self.update_department(
            id,
            DepartmentChanges {
                locked: Some(locked),
                ..Default::default()
            },
        )
    }

    pub fn set_hod(&mut self, id: Uuid, hod: impl Into<StaffHandle>) -> Result<(), CollegeError> {
        self.update_department(
            id,
            DepartmentChanges {
                hod: Some(hod.into()),
                ..Default::default()
            },
        )
    }

    /// Attaches existing batches. Batches already attached are ignored.
    pub fn attach_batches(&mut self, id: Uuid, batch_ids: &[Uuid]) -> Result<(), CollegeError> {
        let record = self.department_record(id)?;
        let mut names: BTreeSet<String> = record
            .batches
            .iter()
            .filter_map(|b| self.batches.get(b).map(|r| r.name.clone()))
            .collect();

        let mut added = Vec::new();
        for batch_id in batch_ids {
            if record.batches.contains(batch_id) || added.contains(batch_id) {
                continue;
            }
            let name = &self.batch_record(*batch_id)?.name;
            if !names.insert(name.clone()) {
                return Err(CollegeError::DuplicateBatchName {
                    department: id,
                    name: name.clone(),
                });
            }
            added.push(*batch_id);
        }

        if let Some(record) = self.departments.get_mut(&id) {
            record.batches.extend(added.iter().copied());
        }

        let department = self.department_state_by_id(id)?;
        let added: Vec<BatchState> = added.iter().filter_map(|b| self.batch_state(*b)).collect();
        let plan = observer::on_department_batches_changed(&department, &added, &[]);
        self.apply(plan);
        Ok(())
    }

    /// Detaches batches from a department and deletes them.
    pub fn detach_batches(&mut self, id: Uuid, batch_ids: &[Uuid]) -> Result<(), CollegeError> {
        let record = self.department_record(id)?;
        let removed: Vec<Uuid> = record
            .batches
            .iter()
            .copied()
            .filter(|b| batch_ids.contains(b))
            .collect();

        if let Some(record) = self.departments.get_mut(&id) {
            record.batches.retain(|b| !removed.contains(b));
        }

        let department = self.department_state_by_id(id)?;
        let removed_states: Vec<BatchState> =
            removed.iter().filter_map(|b| self.batch_state(*b)).collect();
        let plan = observer::on_department_batches_changed(&department, &[], &removed_states);
        self.apply(plan);

        for batch_id in removed {
            self.delete_batch(batch_id)?;
        }
        Ok(())
    }

    /// Revokes the department's entries, removes it, then deletes its batches.
    pub fn delete_department(&mut self, id: Uuid) -> Result<(), CollegeError> {
        let department = self.department_state_by_id(id)?;
        let plan = observer::on_department_pre_delete(&department);
        self.apply(plan);

        self.departments.remove(&id);
        for batch in department.batches {
            self.delete_batch(batch.id)?;
        }
        Ok(())
    }

    pub fn delete_batch(&mut self, id: Uuid) -> Result<(), CollegeError> {
        let batch = self.batch_state(id).ok_or(CollegeError::UnknownBatch(id))?;
        let departments = self.departments_containing(id);
        let plan = observer::on_batch_pre_delete(&batch, &departments);
        self.apply(plan);

        for record in self.departments.values_mut() {
            record.batches.retain(|b| *b != id);
        }
        self.batches.remove(&id);
        Ok(())
    }

    /// Adds one (staff, subject) allocation to a batch and returns its id.
    pub fn add_allocation(
        &mut self,
        batch_id: Uuid,
        staff: impl Into<StaffHandle>,
    ) -> Result<Uuid, CollegeError> {
        let staff = self.known_staff(staff.into())?;
        self.batch_record(batch_id)?;

        let allocation = self.fresh_id();
        if let Some(batch) = self.batches.get_mut(&batch_id) {
            batch.allocations.insert(allocation, staff.clone());
        }

        self.faculty_changed(batch_id, &[staff], &[])?;
        Ok(allocation)
    }

    pub fn remove_allocation(
        &mut self,
        batch_id: Uuid,
        allocation: Uuid,
    ) -> Result<(), CollegeError> {
        let staff = self
            .batches
            .get_mut(&batch_id)
            .ok_or(CollegeError::UnknownBatch(batch_id))?
            .allocations
            .remove(&allocation)
            .ok_or(CollegeError::UnknownAllocation(allocation))?;

        self.faculty_changed(batch_id, &[], &[staff])
    }

    fn faculty_changed(
        &mut self,
        batch_id: Uuid,
        added: &[StaffHandle],
        removed: &[StaffHandle],
    ) -> Result<(), CollegeError> {
        let batch = self
            .batch_state(batch_id)
            .ok_or(CollegeError::UnknownBatch(batch_id))?;
        let departments = self.departments_containing(batch_id);
        let plan = observer::on_batch_faculty_changed(&batch, &departments, added, removed);
        self.apply(plan);
        Ok(())
    }

    fn apply(&mut self, plan: PropagationPlan) {
        if plan.is_empty() {
            return;
        }
        let changed = plan.apply(&mut self.staff);
        debug!(mutations = plan.len(), changed = changed.len(), "Applied propagation plan");
    }

    fn fresh_id(&mut self) -> Uuid {
        self.next_id += 1;
        Uuid::from_u128(self.next_id)
    }

    fn known_staff(&self, staff: StaffHandle) -> Result<StaffHandle, CollegeError> {
        if self.staff.contains_key(&staff) {
            Ok(staff)
        } else {
            Err(CollegeError::UnknownStaff(staff))
        }
    }

    fn ensure_scope_free(
        &self,
        scope: &DepartmentScope,
        except: Option<Uuid>,
    ) -> Result<(), CollegeError> {
        let taken = self
            .departments
            .iter()
            .any(|(id, record)| Some(*id) != except && record.scope == *scope);
        if taken {
            return Err(CollegeError::DuplicateScope(scope.clone()));
        }
        Ok(())
    }

    fn department_record(&self, id: Uuid) -> Result<&DepartmentRecord, CollegeError> {
        self.departments
            .get(&id)
            .ok_or(CollegeError::UnknownDepartment(id))
    }

    fn batch_record(&self, id: Uuid) -> Result<&BatchRecord, CollegeError> {
        self.batches.get(&id).ok_or(CollegeError::UnknownBatch(id))
    }

    fn batch_state(&self, id: Uuid) -> Option<BatchState> {
        self.batches.get(&id).map(|record| {
            BatchState::new(id, record.name.clone())
                .with_faculty(record.allocations.values().cloned())
        })
    }

    fn department_state(&self, id: Uuid, record: &DepartmentRecord) -> DepartmentState {
        DepartmentState {
            id,
            scope: record.scope.clone(),
            hod: record.hod.clone(),
            locked: record.locked,
            batches: record
                .batches
                .iter()
                .filter_map(|b| self.batch_state(*b))
                .collect(),
        }
    }

    fn department_state_by_id(&self, id: Uuid) -> Result<DepartmentState, CollegeError> {
        let record = self.department_record(id)?;
        Ok(self.department_state(id, record))
    }

    fn departments_containing(&self, batch_id: Uuid) -> Vec<DepartmentState> {
        self.departments
            .iter()
            .filter(|(_, record)| record.batches.contains(&batch_id))
            .map(|(id, record)| self.department_state(*id, record))
            .collect()
    }
}
