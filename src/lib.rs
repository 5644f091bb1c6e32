//! Chunkport Library
//!
//! Chunked, resumable bulk export of database tables into CSV objects in a
//! staging bucket. Progress is never stored separately: the names of the
//! uploaded objects record which rows they hold, and an interrupted run
//! resumes from them.
//!
//! # Modules
//!
//! - `cli`: Command-line interface and argument parsing
//! - `config`: Configuration management
//! - `error`: Error types and handling
//! - `export`: Options, chunk naming, reconciliation, and the export coordinator
//! - `formatter`: Row values and CSV formatting
//! - `source`: Row sources (in-memory, MongoDB)
//! - `storage`: Object stores (in-memory, local filesystem)
//! - `task`: Task contract, registry, and local retry scheduler
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use chunkport::export::{ExportConfig, WriteMode};
//! use chunkport::source::MongoSource;
//! use chunkport::storage::FsObjectStore;
//! use chunkport::task::{ExportRegistry, LocalScheduler, TaskArgs};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let source = MongoSource::connect("mongodb://localhost:27017", "shop").await?;
//!     let mut registry = ExportRegistry::new(
//!         Arc::new(source),
//!         Arc::new(FsObjectStore::new("/var/lib/chunkport")),
//!     );
//!     registry.register_all([ExportConfig::new(
//!         "users",
//!         WriteMode::Overwrite,
//!         vec!["name".into(), "active".into()],
//!     )])?;
//!
//!     let scheduler = LocalScheduler::new(Arc::new(registry));
//!     let result = scheduler.run_to_completion(TaskArgs::new("users")).await?;
//!     println!("{} rows exported", result.rows_exported);
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod config;
pub mod error;
pub mod export;
pub mod formatter;
pub mod source;
pub mod storage;
pub mod task;

// Re-export commonly used types
pub use config::AppConfig;
pub use error::{ExportError, Result};
pub use export::{ExportCoordinator, ExportOptions, ExportResult, RunTimestamp};
pub use task::{ExportRegistry, LocalScheduler, TaskArgs, TaskOutcome};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get library version string
///
/// # Returns
/// * `&str` - Version string
pub fn version() -> &'static str {
    VERSION
}
