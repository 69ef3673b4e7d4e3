//! Documents derived from a full structural snapshot, and drift detection.
//!
//! The incremental hooks must always leave every stored document equal to
//! what [`derive_documents`] computes from the current structure. Operators
//! use [`check_invariant`] to find staff whose stored document has drifted
//! (for example after a logged propagation failure) and rewrite them.

use std::collections::BTreeMap;

use crate::document::PermissionDocument;
use crate::grants::ScopeRole;
use crate::scope::{ScopePath, StaffHandle};
use crate::state::DepartmentState;

/// The expected document of every staff member holding at least one entry.
///
/// Staff absent from the result are expected to have an empty document.
pub fn derive_documents(
    departments: &[DepartmentState],
) -> BTreeMap<StaffHandle, PermissionDocument> {
    let mut documents: BTreeMap<StaffHandle, PermissionDocument> = BTreeMap::new();

    for department in departments.iter().filter(|d| !d.locked) {
        for batch in &department.batches {
            let path = department.path(batch);
            documents
                .entry(department.hod.clone())
                .or_default()
                .assign(&path, ScopeRole::Hod.grants());

            for staff in batch.faculty.iter().filter(|s| !department.is_hod(s)) {
                documents
                    .entry(staff.clone())
                    .or_default()
                    .assign(&path, ScopeRole::Faculty.grants());
            }
        }
    }

    documents
}

/// One staff member whose stored document differs from the derived one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Drift {
    pub staff: StaffHandle,
    pub stored: PermissionDocument,
    pub expected: PermissionDocument,
}

impl Drift {
    /// Paths present in the stored document that the structure does not justify.
    pub fn unexpected_paths(&self) -> Vec<ScopePath> {
        self.stored
            .paths()
            .filter(|(path, grants)| self.expected.get(path) != Some(*grants))
            .map(|(path, _)| path)
            .collect()
    }

    /// Paths the structure justifies that the stored document lacks or holds with other grants.
    pub fn missing_paths(&self) -> Vec<ScopePath> {
        self.expected
            .paths()
            .filter(|(path, grants)| self.stored.get(path) != Some(*grants))
            .map(|(path, _)| path)
            .collect()
    }
}

/// Compares every stored document against the derived state.
///
/// `stored` should contain every known staff member; staff with derived
/// entries but no stored document are reported with an empty `stored`.
pub fn check_invariant(
    departments: &[DepartmentState],
    stored: &BTreeMap<StaffHandle, PermissionDocument>,
) -> Vec<Drift> {
    let mut expected = derive_documents(departments);
    let mut drift = Vec::new();

    for (staff, document) in stored {
        let derived = expected.remove(staff).unwrap_or_default();
        if *document != derived {
            drift.push(Drift {
                staff: staff.clone(),
                stored: document.clone(),
                expected: derived,
            });
        }
    }

    for (staff, derived) in expected {
        drift.push(Drift {
            staff,
            stored: PermissionDocument::new(),
            expected: derived,
        });
    }

    drift.sort_by(|a, b| a.staff.cmp(&b.staff));
    drift
}
