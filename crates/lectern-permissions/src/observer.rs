//! Reactions to structural changes.
//!
//! Each hook takes snapshots of the affected structure and returns the
//! [`PropagationPlan`] that brings staff documents back in line with it.
//! Hooks are pure: they never read or write documents themselves.
//!
//! Department row changes are observed *before* the write (the caller passes
//! the persisted row as `old`); membership changes are observed *after* the
//! write (the caller passes the new membership sets).

use tracing::debug;

use crate::grants::ScopeRole;
use crate::plan::PropagationPlan;
use crate::scope::StaffHandle;
use crate::state::{BatchState, DepartmentState};

/// Lock, HOD and scope transitions of a department row.
///
/// `old` is `None` when the department is being created, which behaves like a
/// previously locked department: nothing was granted before.
pub fn on_department_pre_save(
    old: Option<&DepartmentState>,
    new: &DepartmentState,
) -> PropagationPlan {
    let mut plan = PropagationPlan::new();

    let Some(old) = old else {
        if !new.locked {
            grant_department(&mut plan, new);
        }
        return plan;
    };

    let was_active = !old.locked;
    let is_active = !new.locked;
    let rescoped = old.scope != new.scope;

    match (was_active, is_active) {
        (false, false) => {}
        (false, true) => grant_department(&mut plan, new),
        (true, false) => revoke_department(&mut plan, old),
        (true, true) if rescoped => {
            debug!(from = %old.scope, to = %new.scope, "Department rescoped");
            revoke_department(&mut plan, old);
            grant_department(&mut plan, new);
        }
        (true, true) if old.hod != new.hod => {
            transfer_department(&mut plan, &old.hod, new);
        }
        (true, true) => {}
    }

    plan
}

/// Batches attached to or detached from a department.
///
/// Detached batches are deleted by the caller afterwards; their entries are
/// revoked here. Locked departments propagate nothing.
pub fn on_department_batches_changed(
    department: &DepartmentState,
    added: &[BatchState],
    removed: &[BatchState],
) -> PropagationPlan {
    let mut plan = PropagationPlan::new();
    if department.locked {
        return plan;
    }

    for batch in removed {
        revoke_batch(&mut plan, department, batch);
    }
    for batch in added {
        grant_batch(&mut plan, department, batch);
    }

    plan
}

/// Department about to be deleted: revoke every batch still attached.
pub fn on_department_pre_delete(department: &DepartmentState) -> PropagationPlan {
    let mut plan = PropagationPlan::new();
    if !department.locked {
        revoke_department(&mut plan, department);
    }
    plan
}

/// Staff joined or left a batch's faculty set.
///
/// `batch` carries the new faculty set and `departments` every department
/// currently containing the batch. A removed staff member who still holds
/// another allocation in the batch keeps their entry, and a department's HOD
/// is never touched by faculty changes.
pub fn on_batch_faculty_changed(
    batch: &BatchState,
    departments: &[DepartmentState],
    added: &[StaffHandle],
    removed: &[StaffHandle],
) -> PropagationPlan {
    let mut plan = PropagationPlan::new();

    for department in departments.iter().filter(|d| !d.locked) {
        let path = department.path(batch);

        for staff in removed {
            if department.is_hod(staff) || batch.has_faculty(staff) {
                continue;
            }
            plan.remove(staff, &path);
        }

        for staff in added {
            if department.is_hod(staff) {
                continue;
            }
            plan.assign(staff, path.clone(), ScopeRole::Faculty);
        }
    }

    plan
}

/// Batch about to be deleted: revoke its entries under every department referencing it.
pub fn on_batch_pre_delete(batch: &BatchState, departments: &[DepartmentState]) -> PropagationPlan {
    let mut plan = PropagationPlan::new();
    for department in departments.iter().filter(|d| !d.locked) {
        revoke_batch(&mut plan, department, batch);
    }
    plan
}

fn grant_department(plan: &mut PropagationPlan, department: &DepartmentState) {
    for batch in &department.batches {
        grant_batch(plan, department, batch);
    }
}

fn revoke_department(plan: &mut PropagationPlan, department: &DepartmentState) {
    for batch in &department.batches {
        revoke_batch(plan, department, batch);
    }
}

fn grant_batch(plan: &mut PropagationPlan, department: &DepartmentState, batch: &BatchState) {
    let path = department.path(batch);
    plan.assign(&department.hod, path.clone(), ScopeRole::Hod);
    for staff in batch.faculty.iter().filter(|s| !department.is_hod(s)) {
        plan.assign(staff, path.clone(), ScopeRole::Faculty);
    }
}

fn revoke_batch(plan: &mut PropagationPlan, department: &DepartmentState, batch: &BatchState) {
    let path = department.path(batch);
    plan.remove(&department.hod, &path);
    for staff in batch.faculty.iter().filter(|s| !department.is_hod(s)) {
        plan.remove(staff, &path);
    }
}

/// Old HOD drops to faculty grants where still teaching, loses the entry elsewhere;
/// then the department is re-granted under the new HOD.
fn transfer_department(
    plan: &mut PropagationPlan,
    old_hod: &StaffHandle,
    department: &DepartmentState,
) {
    for batch in &department.batches {
        let path = department.path(batch);
        if batch.has_faculty(old_hod) {
            plan.assign(old_hod, path, ScopeRole::Faculty);
        } else {
            plan.remove(old_hod, &path);
        }
    }
    grant_department(plan, department);
}
