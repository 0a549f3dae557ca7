//! Salesflow Common Library
//!
//! Shared types, utilities, and error handling for the Salesflow pipeline.
//!
//! # Overview
//!
//! - **Error Handling**: the pipeline error taxonomy and result alias
//! - **Types**: the canonical row schema shared by every pipeline stage
//! - **Logging**: daily log and error-log files plus retention sweeps
//! - **Checksums**: SHA-256 digests for archived artifacts
//!
//! # Example
//!
//! ```no_run
//! use salesflow_common::types::{CanonicalRow, SourceKind};
//!
//! let row = CanonicalRow::new("1", "Latte", "Drinks", 4.0, 2, SourceKind::Online);
//! assert_eq!(row.total_sales, 8.0);
//! ```

#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod checksum;
pub mod error;
pub mod logging;
pub mod types;

// Re-export commonly used types
pub use error::{EtlError, Result};
