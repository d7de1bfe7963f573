//! Shared parsing errors for the model types.

use thiserror::Error;

pub type ModelsResult<T> = Result<T, ModelsError>;

#[derive(Debug, Error)]
pub enum ModelsError {
    #[error("unknown task type: {0}")]
    UnknownTaskType(String),

    #[error("unknown file type: {0}")]
    UnknownFileType(String),
}
