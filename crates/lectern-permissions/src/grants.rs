//! Capability grant sets and the two fixed templates applied by the engine.
//!
//! A [`CapabilityGrantSet`] records create/read/update/delete flags for each
//! of the four resource categories a staff member can act on inside a batch.
//! Grant sets are plain `Copy` values: assigning a template into a document
//! always stores an independent copy, so two staff documents can never share
//! (and later corrupt) the same grant set.

use serde::{Deserialize, Serialize};
use std::fmt;

/// CRUD flags for a single resource category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Crud {
    pub create: bool,
    pub read: bool,
    pub update: bool,
    pub delete: bool,
}

impl Crud {
    pub const ALL: Crud = Crud {
        create: true,
        read: true,
        update: true,
        delete: true,
    };

    pub const CREATE_READ: Crud = Crud {
        create: true,
        read: true,
        update: false,
        delete: false,
    };

    pub fn allows(&self, action: Action) -> bool {
        match action {
            Action::Create => self.create,
            Action::Read => self.read,
            Action::Update => self.update,
            Action::Delete => self.delete,
        }
    }
}

/// Resource categories covered by a grant set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceCategory {
    Attendance,
    TestResult,
    Project,
    Mooc,
}

impl ResourceCategory {
    pub const ALL: [ResourceCategory; 4] = [
        ResourceCategory::Attendance,
        ResourceCategory::TestResult,
        ResourceCategory::Project,
        ResourceCategory::Mooc,
    ];

    /// Key used for this category in the stored JSON document.
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceCategory::Attendance => "attendance",
            ResourceCategory::TestResult => "test_result",
            ResourceCategory::Project => "project",
            ResourceCategory::Mooc => "mooc",
        }
    }
}

impl fmt::Display for ResourceCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Create,
    Read,
    Update,
    Delete,
}

/// Capability grants for one scope path (one batch of one department).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CapabilityGrantSet {
    pub attendance: Crud,
    pub test_result: Crud,
    pub project: Crud,
    pub mooc: Crud,
}

impl CapabilityGrantSet {
    pub fn category(&self, category: ResourceCategory) -> Crud {
        match category {
            ResourceCategory::Attendance => self.attendance,
            ResourceCategory::TestResult => self.test_result,
            ResourceCategory::Project => self.project,
            ResourceCategory::Mooc => self.mooc,
        }
    }

    pub fn allows(&self, category: ResourceCategory, action: Action) -> bool {
        self.category(category).allows(action)
    }
}

/// Full CRUD on every category. Held by a department's HOD on each of its batches.
pub const HOD_GRANTS: CapabilityGrantSet = CapabilityGrantSet {
    attendance: Crud::ALL,
    test_result: Crud::ALL,
    project: Crud::ALL,
    mooc: Crud::ALL,
};

/// Create/read on every category, plus project update. Held by batch faculty.
pub const FACULTY_GRANTS: CapabilityGrantSet = CapabilityGrantSet {
    attendance: Crud::CREATE_READ,
    test_result: Crud::CREATE_READ,
    project: Crud {
        create: true,
        read: true,
        update: true,
        delete: false,
    },
    mooc: Crud::CREATE_READ,
};

/// The role a staff member plays at a scope path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScopeRole {
    Hod,
    Faculty,
}

impl ScopeRole {
    pub fn grants(self) -> CapabilityGrantSet {
        match self {
            ScopeRole::Hod => HOD_GRANTS,
            ScopeRole::Faculty => FACULTY_GRANTS,
        }
    }

    /// Reverse lookup used by reports; `None` for hand-edited grant sets.
    pub fn of(grants: &CapabilityGrantSet) -> Option<ScopeRole> {
        if *grants == HOD_GRANTS {
            Some(ScopeRole::Hod)
        } else if *grants == FACULTY_GRANTS {
            Some(ScopeRole::Faculty)
        } else {
            None
        }
    }
}

impl fmt::Display for ScopeRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScopeRole::Hod => f.write_str("hod"),
            ScopeRole::Faculty => f.write_str("faculty"),
        }
    }
}
