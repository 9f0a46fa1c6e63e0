//! Local filesystem backend.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{Object, ObjectMeta, ObjectStore, StorageError};

/// Object store rooted at a local directory.
///
/// A relative root resolves against the process working directory at
/// construction time, so later directory changes cannot move the store.
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: &str) -> Result<Self, StorageError> {
        let path = Path::new(root);
        let root = if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::env::current_dir()?.join(path)
        };
        Ok(Self { root })
    }

    fn resolve(&self, key: &str) -> PathBuf {
        self.root.join(key.trim_start_matches('/'))
    }

    fn meta_for(&self, key: &str, md: &std::fs::Metadata) -> ObjectMeta {
        ObjectMeta {
            path: key.to_string(),
            size: md.len(),
            last_modified: md.modified().ok().map(DateTime::<Utc>::from),
        }
    }
}

#[async_trait]
impl ObjectStore for FileStore {
    async fn list_meta(&self, key: &str) -> Result<Vec<ObjectMeta>, StorageError> {
        let path = self.resolve(key);
        let md = std::fs::metadata(&path).map_err(|_| StorageError::NotFound {
            key: key.to_string(),
        })?;
        if !md.is_dir() {
            return Ok(vec![self.meta_for(key, &md)]);
        }

        let mut entries = Vec::new();
        for entry in std::fs::read_dir(&path)? {
            let entry = entry?;
            let child_key = if key.is_empty() {
                entry.file_name().to_string_lossy().into_owned()
            } else {
                format!(
                    "{}/{}",
                    key.trim_end_matches('/'),
                    entry.file_name().to_string_lossy()
                )
            };
            let md = entry.metadata()?;
            entries.push(self.meta_for(&child_key, &md));
        }
        Ok(entries)
    }

    async fn list(&self, key: &str) -> Result<Vec<Object>, StorageError> {
        let metas = self.list_meta(key).await?;
        let mut objects = Vec::new();
        for meta in metas {
            let path = self.resolve(&meta.path);
            if path.is_dir() {
                continue;
            }
            let content = std::fs::read(&path)?;
            objects.push(Object { meta, content });
        }
        Ok(objects)
    }

    async fn get(&self, key: &str) -> Result<Object, StorageError> {
        let path = self.resolve(key);
        let md = std::fs::metadata(&path).map_err(|_| StorageError::NotFound {
            key: key.to_string(),
        })?;
        if md.is_dir() {
            return Err(StorageError::InvalidKey {
                message: format!("{key} is a directory"),
            });
        }
        let content = std::fs::read(&path)?;
        Ok(Object {
            meta: self.meta_for(key, &md),
            content,
        })
    }

    async fn put(&self, key: &str, data: &[u8]) -> Result<(), StorageError> {
        let path = self.resolve(key);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, data)?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        let path = self.resolve(key);
        let md = std::fs::metadata(&path).map_err(|_| StorageError::NotFound {
            key: key.to_string(),
        })?;
        if md.is_dir() {
            std::fs::remove_dir_all(&path)?;
        } else {
            std::fs::remove_file(&path)?;
        }
        Ok(())
    }
}
