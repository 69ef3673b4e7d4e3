//! The typed per-staff permission document.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::grants::{Action, CapabilityGrantSet, ResourceCategory};
use crate::prune::prune_value;
use crate::scope::{ScopeKey, ScopePath};

type BatchLevel = BTreeMap<String, CapabilityGrantSet>;
type DepartmentLevel = BTreeMap<String, BatchLevel>;
type SemesterLevel = BTreeMap<String, DepartmentLevel>;

/// A staff member's permission map: year → semester → department → batch → grants.
///
/// Serializes transparently to the nested JSON object stored in
/// `staff.permissions`. Keys are kept in ascending order.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermissionDocument {
    years: BTreeMap<String, SemesterLevel>,
}

impl PermissionDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.years.is_empty()
    }

    /// Sets the leaf at `path` to `grants`, creating intermediate levels as needed.
    pub fn assign(&mut self, path: &ScopePath, grants: CapabilityGrantSet) {
        self.years
            .entry(path.year.clone())
            .or_default()
            .entry(path.semester.clone())
            .or_default()
            .entry(path.department.clone())
            .or_default()
            .insert(path.batch.clone(), grants);
    }

    /// Removes the branch addressed by `key`.
    ///
    /// Returns `false` when nothing was there (a stale scope reference). Empty
    /// parents are left in place; call [`prune`](Self::prune) afterwards.
    pub fn remove(&mut self, key: impl Into<ScopeKey>) -> bool {
        let key = key.into();
        let segments = key.segments();

        match segments {
            [year] => self.years.remove(year).is_some(),
            [year, semester] => self
                .years
                .get_mut(year)
                .is_some_and(|s| s.remove(semester).is_some()),
            [year, semester, department] => self
                .years
                .get_mut(year)
                .and_then(|s| s.get_mut(semester))
                .is_some_and(|d| d.remove(department).is_some()),
            [year, semester, department, batch] => self
                .years
                .get_mut(year)
                .and_then(|s| s.get_mut(semester))
                .and_then(|d| d.get_mut(department))
                .is_some_and(|b| b.remove(batch).is_some()),
            _ => false,
        }
    }

    /// Drops every empty department, semester and year level. Idempotent.
    ///
    /// Returns `true` if anything was removed.
    pub fn prune(&mut self) -> bool {
        let before = self.level_count();

        for semesters in self.years.values_mut() {
            for departments in semesters.values_mut() {
                departments.retain(|_, batches| !batches.is_empty());
            }
            semesters.retain(|_, departments| !departments.is_empty());
        }
        self.years.retain(|_, semesters| !semesters.is_empty());

        self.level_count() != before
    }

    pub fn get(&self, path: &ScopePath) -> Option<&CapabilityGrantSet> {
        self.years
            .get(&path.year)?
            .get(&path.semester)?
            .get(&path.department)?
            .get(&path.batch)
    }

    pub fn contains(&self, path: &ScopePath) -> bool {
        self.get(path).is_some()
    }

    /// Whether the document grants `action` on `category` at `path`.
    pub fn allows(&self, path: &ScopePath, category: ResourceCategory, action: Action) -> bool {
        self.get(path)
            .is_some_and(|grants| grants.allows(category, action))
    }

    /// Every leaf in key order.
    pub fn paths(&self) -> impl Iterator<Item = (ScopePath, &CapabilityGrantSet)> + '_ {
        self.years.iter().flat_map(|(year, semesters)| {
            semesters.iter().flat_map(move |(semester, departments)| {
                departments.iter().flat_map(move |(department, batches)| {
                    batches.iter().map(move |(batch, grants)| {
                        (ScopePath::new(year, semester, department, batch), grants)
                    })
                })
            })
        })
    }

    pub fn len(&self) -> usize {
        self.paths().count()
    }

    /// Parses a stored JSON document, pruning empty branches first.
    pub fn from_json(mut value: Value) -> Result<Self, serde_json::Error> {
        if value.is_null() {
            return Ok(Self::default());
        }
        prune_value(&mut value);
        serde_json::from_value(value)
    }

    pub fn to_json(&self) -> Value {
        // A map of maps of plain structs cannot fail to serialize.
        serde_json::to_value(self).unwrap_or_else(|_| Value::Object(Default::default()))
    }

    fn level_count(&self) -> usize {
        self.years
            .values()
            .map(|semesters| {
                1 + semesters
                    .values()
                    .map(|departments| 1 + departments.len())
                    .sum::<usize>()
            })
            .sum()
    }
}
