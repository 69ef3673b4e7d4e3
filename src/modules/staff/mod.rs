pub mod service;

pub use service::StaffService;
