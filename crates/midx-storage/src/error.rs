//! Cache storage error types.

use thiserror::Error;

pub type StorageResult<T> = Result<T, StorageError>;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("cache entry too large to fit even after evicting all unprotected entries: {key}")]
    InsertFailed { key: String },
}

impl StorageError {
    pub fn insert_failed(key: impl Into<String>) -> Self {
        Self::InsertFailed { key: key.into() }
    }
}
