//! In-memory test doubles for `EmbeddingService` and `VectorStore`. Never a
//! real model or vector database client — see spec.md section 1's Non-goals
//! and SPEC_FULL.md section 13.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use midx_models::FileId;
use serde_json::Value;

use crate::error::EmbeddingResult;
use crate::traits::{EmbeddingService, EmbeddingVector, Modality, SearchHit, VectorStore};

/// Deterministic embedding double: hashes the artifact bytes into a small
/// fixed-dimension vector. Good enough to exercise the orchestration core
/// end to end without a real model.
pub struct DeterministicEmbeddingService {
    dimensions: usize,
}

impl DeterministicEmbeddingService {
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }
}

impl Default for DeterministicEmbeddingService {
    fn default() -> Self {
        Self::new(8)
    }
}

#[async_trait]
impl EmbeddingService for DeterministicEmbeddingService {
    async fn embed(&self, artifact: &[u8], _modality: Modality) -> EmbeddingResult<EmbeddingVector> {
        let mut vector = vec![0.0f32; self.dimensions];
        for (i, byte) in artifact.iter().enumerate() {
            vector[i % self.dimensions] += *byte as f32 / 255.0;
        }
        let norm: f32 = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        Ok(vector)
    }
}

struct StoredVector {
    vector: EmbeddingVector,
    metadata: Value,
    file_id: FileId,
}

/// In-memory `VectorStore`, keyed by `(file_id, segment_id)`. Brute-force
/// cosine search; fine for a core that never specifies the store's index.
#[derive(Default)]
pub struct InMemoryVectorStore {
    entries: Mutex<HashMap<String, StoredVector>>,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(file_id: &FileId, segment_id: Option<&str>) -> String {
        format!("{}::{}", file_id.as_str(), segment_id.unwrap_or("full"))
    }

    pub fn len(&self) -> usize {
        self.entries.lock().expect("vector store mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        (dot / (norm_a * norm_b)) as f64
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn upsert(
        &self,
        file_id: &FileId,
        segment_id: Option<&str>,
        vector: EmbeddingVector,
        metadata: Value,
    ) -> EmbeddingResult<()> {
        let key = Self::key(file_id, segment_id);
        let mut entries = self.entries.lock().expect("vector store mutex poisoned");
        entries.insert(key, StoredVector { vector, metadata, file_id: file_id.clone() });
        Ok(())
    }

    async fn ann_search(&self, vector: &[f32], k: usize, _filter: Option<Value>) -> EmbeddingResult<Vec<SearchHit>> {
        let entries = self.entries.lock().expect("vector store mutex poisoned");
        let mut scored: Vec<SearchHit> = entries
            .values()
            .map(|stored| SearchHit {
                file_id: stored.file_id.clone(),
                score: cosine_similarity(vector, &stored.vector),
                metadata: stored.metadata.clone(),
            })
            .collect();
        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);
        Ok(scored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn upsert_then_search_finds_itself_as_top_hit() {
        let store = InMemoryVectorStore::new();
        let embedder = DeterministicEmbeddingService::default();
        let file_id = FileId::new();

        let vector = embedder.embed(b"hello world", Modality::Image).await.unwrap();
        store.upsert(&file_id, Some("full"), vector.clone(), json!({"path": "a.jpg"})).await.unwrap();

        let hits = store.ann_search(&vector, 5, None).await.unwrap();
        assert_eq!(hits[0].file_id, file_id);
        assert!(hits[0].score > 0.99);
    }

    #[tokio::test]
    async fn ann_search_respects_k() {
        let store = InMemoryVectorStore::new();
        let embedder = DeterministicEmbeddingService::default();
        for i in 0..10 {
            let file_id = FileId::new();
            let vector = embedder.embed(format!("item-{i}").as_bytes(), Modality::Image).await.unwrap();
            store.upsert(&file_id, None, vector, Value::Null).await.unwrap();
        }
        let query = embedder.embed(b"item-0", Modality::Image).await.unwrap();
        let hits = store.ann_search(&query, 3, None).await.unwrap();
        assert_eq!(hits.len(), 3);
    }
}
