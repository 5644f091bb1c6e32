//! Chunked, resumable export of tables into object storage
//!
//! The export system is built from these components:
//!
//! 1. **ExportOptions**: validated per-table configuration ([`options`])
//! 2. **ChunkMetadata**: the name codec that doubles as the progress record ([`chunk`])
//! 3. **reconcile**: inventory repair and resume-pointer discovery ([`reconciler`])
//! 4. **CsvChunkWriter**: CSV rendering and upload of one chunk ([`writer`])
//! 5. **ProgressTracker**: optional progress bar ([`progress`])
//!
//! These components are orchestrated by the **ExportCoordinator**, which runs
//! one attempt of a run. Retrying attempts is left to [`crate::task`].
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use chunkport::export::{ExportConfig, ExportCoordinator, ExportOptions, RunTimestamp, WriteMode};
//! use chunkport::source::MemorySource;
//! use chunkport::storage::MemoryObjectStore;
//!
//! # async fn demo() -> chunkport::Result<()> {
//! let options = ExportOptions::validate(ExportConfig::new(
//!     "users",
//!     WriteMode::Overwrite,
//!     vec!["name".into(), "active".into()],
//! ))?;
//! let coordinator = ExportCoordinator::new(
//!     Arc::new(options),
//!     Arc::new(MemorySource::new()),
//!     Arc::new(MemoryObjectStore::new()),
//! );
//! let result = coordinator.execute(RunTimestamp::from_datetime(chrono::Utc::now())).await?;
//! println!("{} rows exported", result.rows_exported);
//! # Ok(())
//! # }
//! ```

pub mod chunk;
pub mod coordinator;
pub mod options;
pub mod progress;
pub mod reconciler;
pub mod writer;

pub use chunk::{ChunkMetadata, RunTimestamp};
pub use coordinator::{ExportCoordinator, ExportResult};
pub use options::{ExportConfig, ExportOptions, WriteMode};
pub use progress::ProgressTracker;
pub use reconciler::{ReconcileReport, ReconcileRequest, reconcile};
pub use writer::CsvChunkWriter;
