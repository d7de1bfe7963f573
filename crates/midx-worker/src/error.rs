//! Worker-crate error types.

use thiserror::Error;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("pipeline lock held by another group for file {0}")]
    LockHeld(String),

    #[error("pipeline lock timed out for task {0}")]
    LockTimeout(String),

    #[error("task has no file_id but is a pipeline task")]
    MissingFileId,

    #[error("no handler registered for task type {0}")]
    NoHandler(String),
}
