//! Flowatom Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared types, logging, and error handling for the flowatom workspace.
//!
//! # Overview
//!
//! - **Error Handling**: [`FlowError`] and the [`Result`] alias
//! - **Logging**: tracing subscriber setup driven by [`logging::LogConfig`]
//! - **Types**: output streams and per-file processing reports
//!
//! # Example
//!
//! ```no_run
//! use flowatom_common::{FlowError, Result};
//! use flowatom_common::types::FileReport;
//!
//! fn summarize(report: &FileReport) -> Result<()> {
//!     if !report.reclaimed {
//!         return Err(FlowError::Config("file was not reclaimed".into()));
//!     }
//!     println!("{}", report);
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod logging;
pub mod types;

// Re-export commonly used types
pub use error::{FlowError, Result};
pub use types::{FileReport, Tuple, DEFAULT_STREAM};
