//! Storage abstraction trait
//!
//! This module defines the Storage trait that all storage backends must
//! implement.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Write failed: {0}")]
    WriteFailed(String),

    #[error("Read failed: {0}")]
    ReadFailed(String),

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Key already exists: {0}")]
    AlreadyExists(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Storage abstraction trait
///
/// Keys are opaque to callers and prefixed by payload origin
/// (`uploads/`, `conversions/`), see [`crate::keys`].
///
/// Guarantees:
/// - A key is readable immediately after `put` returns.
/// - Keys are write-once: `put` to an existing key is an error; changed
///   content always gets a new key.
/// - `delete` is idempotent: deleting an absent key is not an error.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Write a payload under the given key and return the key.
    async fn put(&self, storage_key: &str, data: Vec<u8>) -> StorageResult<String>;

    /// Read the full payload stored under a key.
    async fn get(&self, storage_key: &str) -> StorageResult<Vec<u8>>;

    /// Delete the payload under a key. Absent keys are a no-op.
    async fn delete(&self, storage_key: &str) -> StorageResult<()>;

    /// Check whether a payload exists under a key.
    async fn exists(&self, storage_key: &str) -> StorageResult<bool>;

    /// Size in bytes of the payload under a key.
    async fn content_length(&self, storage_key: &str) -> StorageResult<u64>;

    /// Delete payloads older than `ttl` and return how many were removed.
    ///
    /// This is an orphan backstop; metadata-driven deletion is the primary
    /// reclamation path.
    async fn sweep_older_than(&self, ttl: Duration) -> StorageResult<usize>;
}
