pub mod batches;
pub mod branches;
pub mod departments;
pub mod faculty;
pub mod permissions;
pub mod staff;
pub mod students;

pub use self::batches::BatchService;
pub use self::branches::BranchService;
pub use self::departments::DepartmentService;
pub use self::faculty::FacultyService;
pub use self::permissions::PermissionSyncService;
pub use self::staff::StaffService;
pub use self::students::StudentService;
