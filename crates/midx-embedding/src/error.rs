//! Embedding/vector-store collaborator error types.

use thiserror::Error;

pub type EmbeddingResult<T> = Result<T, EmbeddingError>;

#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("embedding service failed: {0}")]
    Embed(String),

    #[error("vector store upsert failed: {0}")]
    Upsert(String),

    #[error("vector store search failed: {0}")]
    Search(String),
}
