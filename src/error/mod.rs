//! Error handling module for export operations.
//!
//! This module provides:
//! - A single top-level [`ExportError`] used throughout the crate
//! - Per-concern error kinds (configuration, naming, storage, source, task)
//! - Transient/terminal classification driving the retry path
//!
//! # Example
//!
//! ```rust,no_run
//! use chunkport::error::{ExportError, Result, StorageError};
//!
//! fn upload() -> Result<()> {
//!     Err(StorageError::NotFound("users/20240101T000000__1_9.csv".into()).into())
//! }
//!
//! if let Err(e) = upload() {
//!     assert!(e.is_transient());
//! }
//! ```

pub mod kinds;

// Re-export commonly used types
pub use kinds::{
    ConfigError, ExportError, NameError, Result, SourceError, StorageError, TaskError,
};
