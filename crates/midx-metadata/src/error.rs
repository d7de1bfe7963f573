//! Deduplication error types.

use thiserror::Error;

pub type DedupResult<T> = Result<T, DedupError>;

#[derive(Debug, Error)]
pub enum DedupError {
    #[error("path does not exist or is unreadable: {0}")]
    Unreadable(String),

    #[error("metadata store error: {0}")]
    Store(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
