//! # Lectern Permissions
//!
//! Keeps every staff member's permission document consistent with the
//! college structure as departments, batches, faculty allocations and HODs
//! change.
//!
//! A permission document maps year → semester → department → batch to a
//! [`CapabilityGrantSet`]. The HOD of an unlocked department holds
//! [`HOD_GRANTS`] on each of its batches; every other staff member teaching in
//! such a batch holds [`FACULTY_GRANTS`]. Locked departments contribute
//! nothing.
//!
//! - [`grants`]: capability grant sets and the two templates
//! - [`scope`]: staff handles and scope path addressing
//! - [`document`]: the typed per-staff document with `assign`/`remove`/`prune`
//! - [`prune`]: empty-branch removal on raw JSON
//! - [`state`]: structural snapshots fed to the observer
//! - [`observer`]: structural change hooks producing a [`PropagationPlan`]
//! - [`plan`]: ordered mutations and their application to documents
//! - [`derive`]: documents derived from a full snapshot, drift detection
//! - [`memory`]: an in-memory college running the hooks in service order
//!
//! # Example
//!
//! ```
//! use lectern_permissions::{
//!     BatchState, DepartmentScope, DepartmentState, PermissionDocument, StaffHandle, observer,
//! };
//! use std::collections::BTreeMap;
//! use uuid::Uuid;
//!
//! let hod = StaffHandle::new("hod@college.edu");
//! let department = DepartmentState {
//!     id: Uuid::new_v4(),
//!     scope: DepartmentScope::new("2024-25", "5", "DEPT_1"),
//!     hod: hod.clone(),
//!     locked: false,
//!     batches: vec![BatchState::new(Uuid::new_v4(), "B1")],
//! };
//!
//! let plan = observer::on_department_pre_save(None, &department);
//! let mut documents = BTreeMap::from([(hod.clone(), PermissionDocument::new())]);
//! let changed = plan.apply(&mut documents);
//!
//! assert!(changed.contains(&hod));
//! assert_eq!(documents[&hod].len(), 1);
//! ```

pub mod derive;
pub mod document;
pub mod grants;
pub mod memory;
pub mod observer;
pub mod plan;
pub mod prune;
pub mod scope;
pub mod state;

pub use derive::{Drift, check_invariant, derive_documents};
pub use document::PermissionDocument;
pub use grants::{
    Action, CapabilityGrantSet, Crud, FACULTY_GRANTS, HOD_GRANTS, ResourceCategory, ScopeRole,
};
pub use memory::{College, CollegeError, DepartmentChanges};
pub use plan::{Mutation, PropagationPlan};
pub use prune::prune_value;
pub use scope::{DepartmentScope, ScopeError, ScopeKey, ScopePath, StaffHandle};
pub use state::{BatchState, DepartmentState};
