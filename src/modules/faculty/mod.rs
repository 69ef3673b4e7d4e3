pub mod service;

pub use service::FacultyService;
