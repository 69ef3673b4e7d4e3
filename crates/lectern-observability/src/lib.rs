//! Lectern Observability
//!
//! - [`logging`]: console plus daily-rolling file logging, configured from the environment
//! - [`basic_logging`]: console-only fallback when file logging cannot be set up
//! - [`metrics`]: counters for permission propagation
//!
//! # Examples
//!
//! ```no_run
//! use lectern_observability::{LoggingConfig, init_basic_console_logging, init_logging};
//!
//! if let Err(err) = init_logging(&LoggingConfig::from_env()) {
//!     init_basic_console_logging();
//!     tracing::warn!(error = %err, "File logging unavailable");
//! }
//! ```

pub mod basic_logging;
pub mod logging;
pub mod metrics;

pub use basic_logging::init_basic_console_logging;
pub use logging::{LogFormat, LoggingConfig, LoggingError, init_logging};
pub use metrics::{
    track_documents_written, track_drift_detected, track_sync_failure, track_sync_plan,
};
