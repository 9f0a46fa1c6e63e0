//! Storage backend abstraction.
//!
//! A small polymorphic interface over object stores. Keys are `/`-joined
//! backend-relative paths; each backend applies its configured root (a
//! directory for the filesystem, a key prefix inside a bucket for S3)
//! internally, so callers never see backend-specific locations.

mod file;
mod s3;

pub use file::FileStore;
pub use s3::S3Store;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::config::{StorageConfig, StorageKind};

/// Errors raised by storage backends.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The requested key or prefix does not exist.
    #[error("not found: {key}")]
    NotFound { key: String },

    /// The key names a directory where an object was expected, or vice versa.
    #[error("invalid key: {message}")]
    InvalidKey { message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Error reported by the S3 service or transport.
    #[error("s3 error: {message}")]
    S3 { message: String },
}

impl StorageError {
    pub(crate) fn s3(message: impl Into<String>) -> Self {
        Self::S3 {
            message: message.into(),
        }
    }

    /// Whether the error means the key/prefix simply is not there.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Metadata of one stored object (or pseudo-directory).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectMeta {
    /// Backend-relative key.
    pub path: String,
    pub size: u64,
    pub last_modified: Option<DateTime<Utc>>,
}

impl ObjectMeta {
    /// Final path component of the key.
    pub fn base_name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }
}

/// One stored object with its content.
#[derive(Debug, Clone)]
pub struct Object {
    pub meta: ObjectMeta,
    pub content: Vec<u8>,
}

/// The capability set every backend exposes.
///
/// `list_meta` resolves a key to a single entry when it names an object, or
/// to the immediate children when it names a directory/prefix; a key that
/// resolves to nothing is an error, which callers rely on to detect absent
/// objects cheaply.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// List metadata under a key, erroring when the key resolves to nothing.
    async fn list_meta(&self, key: &str) -> Result<Vec<ObjectMeta>, StorageError>;

    /// List objects (with content) under a key.
    async fn list(&self, key: &str) -> Result<Vec<Object>, StorageError>;

    /// Fetch one object.
    async fn get(&self, key: &str) -> Result<Object, StorageError>;

    /// Store bytes at a key, creating intermediate directories as needed.
    async fn put(&self, key: &str, data: &[u8]) -> Result<(), StorageError>;

    /// Delete an object, or a directory/prefix and everything under it.
    async fn delete(&self, key: &str) -> Result<(), StorageError>;
}

/// Open the backend a descriptor names.
pub async fn open(cfg: &StorageConfig) -> Result<Box<dyn ObjectStore>, StorageError> {
    match cfg.kind {
        StorageKind::File => Ok(Box::new(FileStore::new(&cfg.path)?)),
        StorageKind::S3 => Ok(Box::new(S3Store::new(cfg).await)),
    }
}
