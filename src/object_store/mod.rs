mod local;

pub use local::LocalStore;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ObjectStoreError {
    #[error("Object already exists: {0}")]
    AlreadyExists(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid object key: {0}")]
    InvalidKey(String),
    #[error("Object not found: {0}")]
    NotFound(String),
}

/// Abstraction over where uploaded book binaries live.
/// Keys are the generated stored filenames from the book records.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store a new object. Keys are write-once: an existing key is an error.
    async fn put(&self, key: &str, data: Bytes) -> Result<(), ObjectStoreError>;
    async fn get(&self, key: &str) -> Result<Bytes, ObjectStoreError>;
    async fn delete(&self, key: &str) -> Result<(), ObjectStoreError>;
    async fn exists(&self, key: &str) -> Result<bool, ObjectStoreError>;
}

/// A key is a single path segment: no separators, no `.`/`..`, not empty.
pub fn validate_key(key: &str) -> Result<(), ObjectStoreError> {
    let invalid = key.is_empty()
        || key == "."
        || key == ".."
        || key.contains(['/', '\\', '\0']);
    if invalid {
        return Err(ObjectStoreError::InvalidKey(key.to_string()));
    }
    Ok(())
}
