//! # Lectern Models
//!
//! Domain models and DTOs for the college structure.
//!
//! - [`ids`]: UUID newtypes for departments, batches and allocations
//! - [`value_types`]: validated emails and staff categories
//! - [`staff`]: staff members
//! - [`faculty`]: subjects and faculty allocations
//! - [`branches`]: branches served by departments
//! - [`students`]: students
//! - [`batches`]: batches and their membership
//! - [`departments`]: departments and their batches

pub mod batches;
pub mod branches;
pub mod departments;
pub mod faculty;
pub mod ids;
pub mod staff;
pub mod students;
pub mod value_types;

pub use batches::{Batch, BatchWithMembers, CreateBatchDto};
pub use branches::{Branch, CreateBranchDto, UpdateBranchDto};
pub use departments::{
    CreateDepartmentDto, Department, DepartmentWithBatches, UpdateDepartmentDto,
};
pub use faculty::{CreateAllocationDto, CreateSubjectDto, FacultyAllocation, Subject};
pub use ids::{AllocationId, BatchId, DepartmentId};
pub use staff::{CreateStaffDto, Staff, StaffFilter, UpdateStaffDto};
pub use students::{CreateStudentDto, Student};
pub use value_types::{Email, StaffCategory, ValueTypeError};
