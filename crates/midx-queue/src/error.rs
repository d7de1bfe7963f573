//! Queue error types.

use thiserror::Error;

pub type QueueResult<T> = Result<T, QueueError>;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("task not found: {0}")]
    TaskNotFound(String),

    #[error("task already present: {0}")]
    AlreadyPresent(String),
}
