//! Object storage used as the export's staging bucket
//!
//! Chunks are written as immutable, named objects. The pipeline only needs a
//! handful of primitives: prefix listing, read, upload, delete, and a copy built
//! on top of them (object stores have no atomic rename).

use async_trait::async_trait;

use crate::error::Result;

pub mod filesystem;
pub mod memory;

pub use filesystem::FsObjectStore;
pub use memory::{MemoryObjectStore, StoreOp};

/// Content type of uploaded chunks.
pub const CSV_CONTENT_TYPE: &str = "text/csv";

/// Information about a stored object from a listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectInfo {
    /// Full object name (key).
    pub name: String,
    /// Object size in bytes.
    pub size: u64,
}

/// Object storage operations consumed by the export pipeline
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// List objects whose name starts with `prefix`, sorted by name.
    async fn list(&self, prefix: &str) -> Result<Vec<ObjectInfo>>;

    /// Read a whole object.
    async fn read(&self, name: &str) -> Result<Vec<u8>>;

    /// Create or replace an object.
    async fn upload(&self, name: &str, content: &[u8], content_type: &str) -> Result<()>;

    /// Delete an object.
    async fn delete(&self, name: &str) -> Result<()>;

    /// Copy an object to a new name; returns once the copy is durable.
    async fn copy(&self, from: &str, to: &str) -> Result<()> {
        let content = self.read(from).await?;
        self.upload(to, &content, CSV_CONTENT_TYPE).await
    }
}
