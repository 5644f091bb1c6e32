//! In-memory object store
//!
//! Keeps objects in a sorted map and records every mutating call, so callers
//! can assert on the exact order of uploads and deletes. Uploads can be made
//! to fail after a given number of successes to simulate a flaky bucket.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::error::{Result, StorageError};

use super::{ObjectInfo, ObjectStore};

/// A recorded store operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreOp {
    Upload(String),
    Delete(String),
}

#[derive(Debug, Default)]
struct Inner {
    objects: BTreeMap<String, Vec<u8>>,
    ops: Vec<StoreOp>,
    uploads_until_failure: Option<usize>,
}

/// Object store backed by process memory
#[derive(Debug, Clone, Default)]
pub struct MemoryObjectStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryObjectStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Make uploads fail once `successes` more uploads have gone through
    pub async fn fail_uploads_after(&self, successes: usize) {
        self.inner.lock().await.uploads_until_failure = Some(successes);
    }

    /// Let uploads succeed again
    pub async fn heal(&self) {
        self.inner.lock().await.uploads_until_failure = None;
    }

    /// Names of all stored objects, sorted
    pub async fn names(&self) -> Vec<String> {
        self.inner.lock().await.objects.keys().cloned().collect()
    }

    /// Content of an object as text, if present
    pub async fn text(&self, name: &str) -> Option<String> {
        self.inner
            .lock()
            .await
            .objects
            .get(name)
            .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
    }

    /// Mutating operations performed so far
    pub async fn ops(&self) -> Vec<StoreOp> {
        self.inner.lock().await.ops.clone()
    }

    /// Forget recorded operations
    pub async fn clear_ops(&self) {
        self.inner.lock().await.ops.clear();
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn list(&self, prefix: &str) -> Result<Vec<ObjectInfo>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .objects
            .range(prefix.to_string()..)
            .take_while(|(name, _)| name.starts_with(prefix))
            .map(|(name, bytes)| ObjectInfo {
                name: name.clone(),
                size: bytes.len() as u64,
            })
            .collect())
    }

    async fn read(&self, name: &str) -> Result<Vec<u8>> {
        let inner = self.inner.lock().await;
        inner
            .objects
            .get(name)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(name.to_string()).into())
    }

    async fn upload(&self, name: &str, content: &[u8], _content_type: &str) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if let Some(remaining) = inner.uploads_until_failure.as_mut() {
            if *remaining == 0 {
                return Err(StorageError::WriteFailed {
                    name: name.to_string(),
                    message: "injected upload failure".to_string(),
                }
                .into());
            }
            *remaining -= 1;
        }
        inner.objects.insert(name.to_string(), content.to_vec());
        inner.ops.push(StoreOp::Upload(name.to_string()));
        Ok(())
    }

    async fn delete(&self, name: &str) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if inner.objects.remove(name).is_none() {
            return Err(StorageError::NotFound(name.to_string()).into());
        }
        inner.ops.push(StoreOp::Delete(name.to_string()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::CSV_CONTENT_TYPE;

    #[tokio::test]
    async fn test_list_is_prefix_scoped() {
        let store = MemoryObjectStore::new();
        for name in ["users/a.csv", "users/b.csv", "users_archive/a.csv", "orders/a.csv"] {
            store.upload(name, b"x", CSV_CONTENT_TYPE).await.unwrap();
        }
        let names: Vec<String> = store
            .list("users/")
            .await
            .unwrap()
            .into_iter()
            .map(|o| o.name)
            .collect();
        assert_eq!(names, ["users/a.csv", "users/b.csv"]);
    }

    #[tokio::test]
    async fn test_copy_then_delete() {
        let store = MemoryObjectStore::new();
        store.upload("t/old.csv", b"body", CSV_CONTENT_TYPE).await.unwrap();
        store.copy("t/old.csv", "t/new.csv").await.unwrap();
        store.delete("t/old.csv").await.unwrap();
        assert_eq!(store.names().await, ["t/new.csv"]);
        assert_eq!(store.text("t/new.csv").await.as_deref(), Some("body"));
    }

    #[tokio::test]
    async fn test_injected_upload_failure() {
        let store = MemoryObjectStore::new();
        store.fail_uploads_after(1).await;
        assert!(store.upload("t/1.csv", b"", CSV_CONTENT_TYPE).await.is_ok());
        let err = store.upload("t/2.csv", b"", CSV_CONTENT_TYPE).await.unwrap_err();
        assert!(err.is_transient());
        store.heal().await;
        assert!(store.upload("t/2.csv", b"", CSV_CONTENT_TYPE).await.is_ok());
    }

    #[tokio::test]
    async fn test_delete_missing_object() {
        let store = MemoryObjectStore::new();
        tokio_test::assert_err!(store.delete("t/missing.csv").await);
    }
}
