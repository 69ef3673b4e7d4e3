pub mod service;

pub use service::BranchService;
