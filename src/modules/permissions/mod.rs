pub mod service;
pub mod snapshot;

pub use service::{PermissionSyncService, PropagationError, ReconcileReport, SyncEvent};
