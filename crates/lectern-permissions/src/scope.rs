//! Scope path addressing for permission documents.
//!
//! A permission document is keyed year → semester → department → batch. A
//! [`DepartmentScope`] names the first three levels (shared by every batch of
//! a department), a [`ScopePath`] names one leaf, and a [`ScopeKey`] names
//! any prefix of 1 to 4 levels for removal.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Immutable handle of a staff member (their email address).
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StaffHandle(String);

impl StaffHandle {
    pub fn new(handle: impl Into<String>) -> Self {
        Self(handle.into())
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[inline]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Debug for StaffHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StaffHandle({})", self.0)
    }
}

impl fmt::Display for StaffHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for StaffHandle {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for StaffHandle {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl AsRef<str> for StaffHandle {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// The (year, semester, department name) prefix shared by all batches of a department.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DepartmentScope {
    pub year: String,
    pub semester: String,
    pub department: String,
}

impl DepartmentScope {
    pub fn new(
        year: impl Into<String>,
        semester: impl Into<String>,
        department: impl Into<String>,
    ) -> Self {
        Self {
            year: year.into(),
            semester: semester.into(),
            department: department.into(),
        }
    }

    /// Full path of `batch` under this department.
    pub fn batch(&self, batch: impl Into<String>) -> ScopePath {
        ScopePath {
            year: self.year.clone(),
            semester: self.semester.clone(),
            department: self.department.clone(),
            batch: batch.into(),
        }
    }
}

impl fmt::Display for DepartmentScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.year, self.semester, self.department)
    }
}

/// Address of one leaf (one batch of one department) in a permission document.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ScopePath {
    pub year: String,
    pub semester: String,
    pub department: String,
    pub batch: String,
}

impl ScopePath {
    pub fn new(
        year: impl Into<String>,
        semester: impl Into<String>,
        department: impl Into<String>,
        batch: impl Into<String>,
    ) -> Self {
        Self {
            year: year.into(),
            semester: semester.into(),
            department: department.into(),
            batch: batch.into(),
        }
    }

    pub fn department_scope(&self) -> DepartmentScope {
        DepartmentScope::new(&self.year, &self.semester, &self.department)
    }
}

impl fmt::Display for ScopePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}/{}",
            self.year, self.semester, self.department, self.batch
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScopeError {
    #[error("scope key must have between 1 and 4 segments, got {0}")]
    InvalidDepth(usize),
}

/// A prefix of a scope path: a year, a semester, a department or a single batch.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ScopeKey {
    segments: Vec<String>,
}

impl ScopeKey {
    pub const MAX_DEPTH: usize = 4;

    pub fn new<I, S>(segments: I) -> Result<Self, ScopeError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let segments: Vec<String> = segments.into_iter().map(Into::into).collect();
        if segments.is_empty() || segments.len() > Self::MAX_DEPTH {
            return Err(ScopeError::InvalidDepth(segments.len()));
        }
        Ok(Self { segments })
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn depth(&self) -> usize {
        self.segments.len()
    }
}

impl From<&ScopePath> for ScopeKey {
    fn from(path: &ScopePath) -> Self {
        Self {
            segments: vec![
                path.year.clone(),
                path.semester.clone(),
                path.department.clone(),
                path.batch.clone(),
            ],
        }
    }
}

impl From<ScopePath> for ScopeKey {
    fn from(path: ScopePath) -> Self {
        Self {
            segments: vec![path.year, path.semester, path.department, path.batch],
        }
    }
}

impl From<&DepartmentScope> for ScopeKey {
    fn from(scope: &DepartmentScope) -> Self {
        Self {
            segments: vec![
                scope.year.clone(),
                scope.semester.clone(),
                scope.department.clone(),
            ],
        }
    }
}

impl fmt::Display for ScopeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("/"))
    }
}
