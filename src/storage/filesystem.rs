//! Object store emulated on a local directory
//!
//! Object names map to relative paths under a root directory, so
//! `users/20240301T101500__01_10.csv` lives at `<root>/users/20240301T101500__01_10.csv`.
//! Uploads go to a temporary sibling first and are renamed into place, so a
//! listed object is always complete.

use std::io;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tracing::debug;
use uuid::Uuid;

use crate::error::{Result, StorageError};

use super::{ObjectInfo, ObjectStore};

const TEMP_PREFIX: &str = ".tmp-";

/// Temporary upload file, removed on drop unless renamed into place
struct TempFile {
    path: PathBuf,
    persisted: bool,
}

impl TempFile {
    fn new(path: PathBuf) -> Self {
        Self {
            path,
            persisted: false,
        }
    }

    /// Write `content` and rename the file to `target`
    fn persist(mut self, content: &[u8], target: &Path) -> io::Result<()> {
        std::fs::write(&self.path, content)?;
        std::fs::rename(&self.path, target)?;
        self.persisted = true;
        Ok(())
    }
}

impl Drop for TempFile {
    fn drop(&mut self) {
        if !self.persisted {
            let _ = std::fs::remove_file(&self.path);
        }
    }
}

/// Object store rooted at a local directory
#[derive(Debug, Clone)]
pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    /// Create a store rooted at `root` (created lazily on first upload)
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve an object name to a path, refusing names that escape the root
    fn path_for(&self, name: &str) -> Option<PathBuf> {
        let relative = Path::new(name);
        let safe = !name.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        safe.then(|| self.root.join(relative))
    }

    fn name_for(&self, path: &Path) -> Option<String> {
        let relative = path.strip_prefix(&self.root).ok()?;
        let parts: Vec<&str> = relative
            .components()
            .map(|c| c.as_os_str().to_str())
            .collect::<Option<_>>()?;
        Some(parts.join("/"))
    }
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    async fn list(&self, prefix: &str) -> Result<Vec<ObjectInfo>> {
        let list_err = |e: io::Error| StorageError::ListFailed {
            prefix: prefix.to_string(),
            message: e.to_string(),
        };

        // Only the directory holding the prefix's last segment can contain matches.
        let start = match prefix.rsplit_once('/') {
            Some((dir, _)) => match self.path_for(dir) {
                Some(path) => path,
                None => return Ok(Vec::new()),
            },
            None => self.root.clone(),
        };

        let mut objects = Vec::new();
        let mut pending = vec![start];
        while let Some(dir) = pending.pop() {
            let mut entries = match fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(e) => return Err(list_err(e).into()),
            };
            while let Some(entry) = entries.next_entry().await.map_err(list_err)? {
                let file_type = entry.file_type().await.map_err(list_err)?;
                let path = entry.path();
                if file_type.is_dir() {
                    pending.push(path);
                    continue;
                }
                if entry.file_name().to_string_lossy().starts_with(TEMP_PREFIX) {
                    continue;
                }
                let Some(name) = self.name_for(&path) else {
                    continue;
                };
                if name.starts_with(prefix) {
                    let size = entry.metadata().await.map_err(list_err)?.len();
                    objects.push(ObjectInfo { name, size });
                }
            }
        }

        objects.sort_by(|a, b| a.name.cmp(&b.name));
        debug!("Listed {} object(s) under '{}'", objects.len(), prefix);
        Ok(objects)
    }

    async fn read(&self, name: &str) -> Result<Vec<u8>> {
        let path = self
            .path_for(name)
            .ok_or_else(|| StorageError::NotFound(name.to_string()))?;
        fs::read(&path).await.map_err(|e| {
            if e.kind() == io::ErrorKind::NotFound {
                StorageError::NotFound(name.to_string()).into()
            } else {
                StorageError::ReadFailed {
                    name: name.to_string(),
                    message: e.to_string(),
                }
                .into()
            }
        })
    }

    async fn upload(&self, name: &str, content: &[u8], _content_type: &str) -> Result<()> {
        let write_err = |message: String| StorageError::WriteFailed {
            name: name.to_string(),
            message,
        };

        let path = self
            .path_for(name)
            .ok_or_else(|| write_err("object name escapes the store root".to_string()))?;
        let parent = path
            .parent()
            .ok_or_else(|| write_err("object name has no parent directory".to_string()))?;
        fs::create_dir_all(parent)
            .await
            .map_err(|e| write_err(e.to_string()))?;

        // The write runs to completion even if this future is dropped, and the
        // temporary file never outlives it.
        let temp = TempFile::new(parent.join(format!("{TEMP_PREFIX}{}", Uuid::new_v4())));
        let body = content.to_vec();
        tokio::task::spawn_blocking(move || temp.persist(&body, &path))
            .await
            .map_err(|e| write_err(format!("write task failed: {e}")))?
            .map_err(|e| write_err(e.to_string()))?;

        debug!("Stored {} ({} bytes)", name, content.len());
        Ok(())
    }

    async fn delete(&self, name: &str) -> Result<()> {
        let path = self
            .path_for(name)
            .ok_or_else(|| StorageError::NotFound(name.to_string()))?;
        fs::remove_file(&path).await.map_err(|e| {
            if e.kind() == io::ErrorKind::NotFound {
                StorageError::NotFound(name.to_string()).into()
            } else {
                StorageError::DeleteFailed {
                    name: name.to_string(),
                    message: e.to_string(),
                }
                .into()
            }
        })
    }
}
