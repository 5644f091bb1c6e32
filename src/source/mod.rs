//! Row sources for export operations
//!
//! A [`RowSource`] answers two questions about a table: how many rows it has,
//! and what the rows in a window `[offset, offset + limit)` are under a fixed
//! ordering. Rows are streamed in batches through [`StreamingQuery`] so that
//! memory stays bounded no matter how large the table is.

use async_trait::async_trait;

use crate::error::Result;
use crate::formatter::Row;

pub mod memory;
pub mod mongo;

pub use memory::MemorySource;
pub use mongo::MongoSource;

/// Upper bound on rows fetched in one batch.
pub const MAX_BATCH_SIZE: u32 = 10_000;

/// Trait for streaming query results in batches
#[async_trait]
pub trait StreamingQuery: Send {
    /// Fetch the next batch of rows
    ///
    /// # Returns
    /// * `Result<Option<Vec<Row>>>` - Next batch of rows, or None if exhausted
    async fn next_batch(&mut self) -> Result<Option<Vec<Row>>>;

    /// Close the query and cleanup resources
    async fn close(&mut self) -> Result<()>;
}

/// A bounded, ordered read of one table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryWindow {
    /// Table to read
    pub table: String,
    /// Projected fields; every row holds exactly these, in this order
    pub fields: Vec<String>,
    /// Fields to sort by, ascending
    pub order_by: Vec<String>,
    /// Rows to skip
    pub offset: u64,
    /// Maximum rows to return
    pub limit: u64,
    /// Preferred rows per batch
    pub batch_size: u32,
}

/// Source of table rows
#[async_trait]
pub trait RowSource: Send + Sync {
    /// Total number of rows in `table`
    async fn count(&self, table: &str) -> Result<u64>;

    /// Open a streaming read over a window of `table`
    async fn open(&self, window: &QueryWindow) -> Result<Box<dyn StreamingQuery>>;
}
