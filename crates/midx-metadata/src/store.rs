//! `FileMetadataStore`: the external collaborator contract from spec.md
//! section 6, plus an in-memory implementation for tests and for wiring
//! examples without a real database.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use midx_models::{FileId, FileRecord, ProcessingStatus};

use crate::error::DedupResult;

/// Read-through/write-through view over the file metadata store the
/// deduplicator operates against. A real implementation would back this
/// with a database; the core never assumes one.
#[async_trait]
pub trait FileMetadataStore: Send + Sync {
    async fn get_file_by_hash(&self, hash: &str) -> DedupResult<Option<FileRecord>>;
    async fn insert_file_metadata(&self, record: FileRecord) -> DedupResult<()>;
    async fn update_file_status(&self, id: &FileId, status: ProcessingStatus) -> DedupResult<()>;
    async fn update_file_path(&self, id: &FileId, path: &str) -> DedupResult<()>;
    async fn get_file(&self, id: &FileId) -> DedupResult<Option<FileRecord>>;
}

/// In-memory `FileMetadataStore`, keyed by both `file_id` and `file_hash`.
#[derive(Default)]
pub struct InMemoryFileMetadataStore {
    by_id: Mutex<HashMap<FileId, FileRecord>>,
}

impl InMemoryFileMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl FileMetadataStore for InMemoryFileMetadataStore {
    async fn get_file_by_hash(&self, hash: &str) -> DedupResult<Option<FileRecord>> {
        let by_id = self.by_id.lock().expect("metadata mutex poisoned");
        Ok(by_id.values().find(|r| r.file_hash.as_deref() == Some(hash)).cloned())
    }

    async fn insert_file_metadata(&self, record: FileRecord) -> DedupResult<()> {
        let mut by_id = self.by_id.lock().expect("metadata mutex poisoned");
        by_id.insert(record.file_id.clone(), record);
        Ok(())
    }

    async fn update_file_status(&self, id: &FileId, status: ProcessingStatus) -> DedupResult<()> {
        let mut by_id = self.by_id.lock().expect("metadata mutex poisoned");
        if let Some(record) = by_id.get_mut(id) {
            record.set_status(status);
        }
        Ok(())
    }

    async fn update_file_path(&self, id: &FileId, path: &str) -> DedupResult<()> {
        let mut by_id = self.by_id.lock().expect("metadata mutex poisoned");
        if let Some(record) = by_id.get_mut(id) {
            record.set_path(path.to_string());
        }
        Ok(())
    }

    async fn get_file(&self, id: &FileId) -> DedupResult<Option<FileRecord>> {
        let by_id = self.by_id.lock().expect("metadata mutex poisoned");
        Ok(by_id.get(id).cloned())
    }
}
