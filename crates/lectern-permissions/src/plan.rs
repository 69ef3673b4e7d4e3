//! Ordered permission mutations and their application to staff documents.
//!
//! The observer never touches documents directly. It emits a
//! [`PropagationPlan`]; the orchestrator loads the documents of
//! [`PropagationPlan::affected_staff`], applies the plan with
//! [`PropagationPlan::apply`], and persists whatever changed.

use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

use crate::document::PermissionDocument;
use crate::grants::{CapabilityGrantSet, ScopeRole};
use crate::scope::{ScopeKey, ScopePath, StaffHandle};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    Assign {
        staff: StaffHandle,
        path: ScopePath,
        grants: CapabilityGrantSet,
    },
    Remove {
        staff: StaffHandle,
        key: ScopeKey,
    },
}

impl Mutation {
    pub fn staff(&self) -> &StaffHandle {
        match self {
            Mutation::Assign { staff, .. } | Mutation::Remove { staff, .. } => staff,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PropagationPlan {
    mutations: Vec<Mutation>,
}

impl PropagationPlan {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn assign(&mut self, staff: &StaffHandle, path: ScopePath, role: ScopeRole) {
        self.mutations.push(Mutation::Assign {
            staff: staff.clone(),
            path,
            grants: role.grants(),
        });
    }

    pub fn remove(&mut self, staff: &StaffHandle, key: impl Into<ScopeKey>) {
        self.mutations.push(Mutation::Remove {
            staff: staff.clone(),
            key: key.into(),
        });
    }

    pub fn extend(&mut self, other: PropagationPlan) {
        self.mutations.extend(other.mutations);
    }

    pub fn is_empty(&self) -> bool {
        self.mutations.is_empty()
    }

    pub fn len(&self) -> usize {
        self.mutations.len()
    }

    pub fn mutations(&self) -> &[Mutation] {
        &self.mutations
    }

    /// Staff whose documents the plan touches, in handle order.
    ///
    /// The orchestrator locks staff rows in this order so concurrent plans
    /// over overlapping staff cannot deadlock.
    pub fn affected_staff(&self) -> BTreeSet<StaffHandle> {
        self.mutations.iter().map(|m| m.staff().clone()).collect()
    }

    /// Applies every mutation in order, then prunes each touched document.
    ///
    /// Mutations for staff missing from `documents` are skipped. Returns the
    /// staff whose documents actually changed.
    pub fn apply(
        &self,
        documents: &mut BTreeMap<StaffHandle, PermissionDocument>,
    ) -> BTreeSet<StaffHandle> {
        let before: BTreeMap<StaffHandle, PermissionDocument> = self
            .affected_staff()
            .into_iter()
            .filter_map(|staff| documents.get(&staff).cloned().map(|doc| (staff, doc)))
            .collect();

        for mutation in &self.mutations {
            let Some(document) = documents.get_mut(mutation.staff()) else {
                debug!(staff = %mutation.staff(), "Skipping mutation for unknown staff member");
                continue;
            };

            match mutation {
                Mutation::Assign { path, grants, .. } => document.assign(path, *grants),
                Mutation::Remove { staff, key } => {
                    if !document.remove(key.clone()) {
                        debug!(
                            staff = %staff,
                            scope = %key,
                            "Stale scope reference, nothing to remove"
                        );
                    }
                }
            }
        }

        before
            .into_iter()
            .filter_map(|(staff, original)| {
                let document = documents.get_mut(&staff)?;
                document.prune();
                (*document != original).then_some(staff)
            })
            .collect()
    }
}

impl IntoIterator for PropagationPlan {
    type Item = Mutation;
    type IntoIter = std::vec::IntoIter<Mutation>;

    fn into_iter(self) -> Self::IntoIter {
        self.mutations.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grants::{FACULTY_GRANTS, HOD_GRANTS};

    fn path(batch: &str) -> ScopePath {
        ScopePath::new("2024-25", "5", "DEPT_1", batch)
    }

    #[test]
    fn test_apply_runs_mutations_in_order_and_prunes() {
        let hod = StaffHandle::new("hod@college.edu");
        let mut documents = BTreeMap::from([(hod.clone(), PermissionDocument::new())]);

        let mut plan = PropagationPlan::new();
        plan.assign(&hod, path("B1"), ScopeRole::Hod);
        plan.assign(&hod, path("B2"), ScopeRole::Hod);
        plan.remove(&hod, &path("B1"));
        plan.assign(&hod, path("B2"), ScopeRole::Faculty);

        let changed = plan.apply(&mut documents);

        assert_eq!(changed, BTreeSet::from([hod.clone()]));
        let doc = &documents[&hod];
        assert_eq!(doc.len(), 1);
        assert_eq!(doc.get(&path("B2")), Some(&FACULTY_GRANTS));
    }

    #[test]
    fn test_apply_reports_only_changed_documents() {
        let hod = StaffHandle::new("hod@college.edu");
        let other = StaffHandle::new("other@college.edu");
        let mut existing = PermissionDocument::new();
        existing.assign(&path("B1"), HOD_GRANTS);
        let mut documents = BTreeMap::from([
            (hod.clone(), existing),
            (other.clone(), PermissionDocument::new()),
        ]);

        let mut plan = PropagationPlan::new();
        plan.assign(&hod, path("B1"), ScopeRole::Hod);
        plan.remove(&other, &path("B1"));

        assert!(plan.apply(&mut documents).is_empty());
    }

    #[test]
    fn test_apply_skips_unknown_staff() {
        let ghost = StaffHandle::new("ghost@college.edu");
        let mut documents = BTreeMap::new();

        let mut plan = PropagationPlan::new();
        plan.assign(&ghost, path("B1"), ScopeRole::Faculty);

        assert!(plan.apply(&mut documents).is_empty());
        assert!(documents.is_empty());
    }

    #[test]
    fn test_affected_staff_is_sorted_and_unique() {
        let a = StaffHandle::new("a@college.edu");
        let b = StaffHandle::new("b@college.edu");

        let mut plan = PropagationPlan::new();
        plan.assign(&b, path("B1"), ScopeRole::Faculty);
        plan.assign(&a, path("B1"), ScopeRole::Hod);
        plan.remove(&b, &path("B2"));

        let staff: Vec<_> = plan.affected_staff().into_iter().collect();
        assert_eq!(staff, vec![a, b]);
    }
}
