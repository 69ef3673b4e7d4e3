//! # Lectern Core
//!
//! Core types shared by every Lectern crate.
//!
//! - [`errors`]: the service-layer error type and its kinds
//!
//! # Example
//!
//! ```
//! use lectern_core::{AppError, ErrorKind};
//!
//! let error = AppError::not_found(anyhow::anyhow!("Department not found"));
//! assert_eq!(error.kind, ErrorKind::NotFound);
//! ```

pub mod errors;

pub use errors::{AppError, ErrorKind};
