//! # Lectern Config
//!
//! Configuration types loaded from environment variables:
//!
//! - [`database`]: PostgreSQL connection settings
//! - [`sync`]: how permission propagation failures are handled
//!
//! # Example
//!
//! ```ignore
//! use lectern_config::{DatabaseConfig, SyncConfig};
//!
//! let database = DatabaseConfig::from_env()?;
//! let sync = SyncConfig::from_env();
//! ```

pub mod database;
pub mod sync;

pub use database::DatabaseConfig;
pub use sync::{SyncConfig, SyncPolicy};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("invalid value {value:?} for {var}")]
    Invalid { var: &'static str, value: String },
}
