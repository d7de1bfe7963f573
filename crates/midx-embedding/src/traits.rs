//! External collaborator contracts from spec.md section 6: the embedding
//! model and the vector store. Neither is specified beyond this interface
//! — no model algorithm, no store's on-disk format (stated Non-goals).

use async_trait::async_trait;
use midx_models::FileId;
use serde_json::Value;

use crate::error::EmbeddingResult;

/// Modality an artifact was embedded from. Mirrors the file types a
/// `FileRecord` may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Modality {
    Image,
    Video,
    Audio,
}

/// A fixed-dimension embedding vector.
pub type EmbeddingVector = Vec<f32>;

/// One hit from `VectorStore::ann_search`.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub file_id: FileId,
    pub score: f64,
    pub metadata: Value,
}

/// Produces an embedding vector for a preprocessed artifact. The artifact
/// representation (bytes, tensor, path) is intentionally opaque here —
/// handlers own the concrete shape; this crate only describes the
/// call/response contract.
#[async_trait]
pub trait EmbeddingService: Send + Sync {
    async fn embed(&self, artifact: &[u8], modality: Modality) -> EmbeddingResult<EmbeddingVector>;
}

/// Authoritative similarity-search backend. Cosine-distance-based; the
/// store owns indexing and on-disk format, both out of scope here.
#[async_trait]
pub trait VectorStore: Send + Sync {
    async fn upsert(
        &self,
        file_id: &FileId,
        segment_id: Option<&str>,
        vector: EmbeddingVector,
        metadata: Value,
    ) -> EmbeddingResult<()>;

    async fn ann_search(&self, vector: &[f32], k: usize, filter: Option<Value>) -> EmbeddingResult<Vec<SearchHit>>;
}
