//! ContentHashDeduplicator (C10): content-hash lookup and duplicate policy.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use midx_models::{DedupOutcome, FileId, FileRecord, FileType, ProcessingStatus};
use tracing::{debug, warn};

use crate::config::DedupConfig;
use crate::error::DedupResult;
use crate::hash::hash_file;
use crate::store::FileMetadataStore;

struct CachedHash {
    hash: String,
    cached_at: DateTime<Utc>,
}

/// In-memory path -> hash cache, bounded with 80/20 batch eviction: when
/// capacity is exceeded, the oldest 20% (by cache timestamp) is dropped in
/// one pass rather than evicting a single entry at a time (ported from
/// the Python original's `_cleanup_cache`, see DESIGN.md).
struct HashCache {
    entries: HashMap<String, CachedHash>,
    config: DedupConfig,
}

impl HashCache {
    fn new(config: DedupConfig) -> Self {
        Self { entries: HashMap::new(), config }
    }

    fn get(&self, path: &str, now: DateTime<Utc>) -> Option<String> {
        let cached = self.entries.get(path)?;
        let ttl_elapsed = (now - cached.cached_at).num_seconds() > self.config.hash_cache_ttl_secs;
        if ttl_elapsed {
            None
        } else {
            Some(cached.hash.clone())
        }
    }

    fn put(&mut self, path: String, hash: String) {
        self.entries.insert(path, CachedHash { hash, cached_at: Utc::now() });
        if self.entries.len() > self.config.hash_cache_capacity {
            self.evict_oldest_20_percent();
        }
    }

    fn evict_oldest_20_percent(&mut self) {
        let to_evict = (self.entries.len() / 5).max(1);
        let mut by_age: Vec<(String, DateTime<Utc>)> =
            self.entries.iter().map(|(k, v)| (k.clone(), v.cached_at)).collect();
        by_age.sort_by_key(|(_, cached_at)| *cached_at);
        for (key, _) in by_age.into_iter().take(to_evict) {
            self.entries.remove(&key);
        }
    }
}

/// Identifies files by content so moves, renames, and retries don't
/// redo work. See spec.md section 4.5 for the outcome table.
pub struct ContentHashDeduplicator {
    config: DedupConfig,
    store: Arc<dyn FileMetadataStore>,
    hash_cache: Mutex<HashCache>,
}

impl ContentHashDeduplicator {
    pub fn new(config: DedupConfig, store: Arc<dyn FileMetadataStore>) -> Self {
        let hash_cache = Mutex::new(HashCache::new(config.clone()));
        Self { config, store, hash_cache }
    }

    /// Canonicalise a newly-discovered file: hash its content, look up any
    /// existing `FileRecord`, and decide what the orchestrator should do.
    ///
    /// If hashing fails, the file is treated as `new` without a hash (the
    /// spec's stated fallback), and the failure is logged rather than
    /// propagated.
    pub async fn process_new_file(
        &self,
        path: &Path,
        file_type: FileType,
    ) -> DedupResult<(bool, FileId, DedupOutcome)> {
        let path_str = path.to_string_lossy().to_string();

        if !self.config.enabled {
            let record = FileRecord::new(path_str, file_type, 0);
            let file_id = record.file_id.clone();
            self.store.insert_file_metadata(record).await?;
            return Ok((true, file_id, DedupOutcome::New));
        }

        let hash = match self.hash_with_cache(path, &path_str, file_type).await {
            Ok(hash) => Some(hash),
            Err(e) => {
                warn!(path = %path_str, error = %e, "hashing failed, treating file as new without a hash");
                None
            }
        };

        let size = tokio::fs::metadata(path).await.map(|m| m.len()).unwrap_or(0);

        let Some(hash) = hash else {
            let record = FileRecord::new(path_str.clone(), file_type, size);
            let file_id = record.file_id.clone();
            self.store.insert_file_metadata(record).await?;
            return Ok((true, file_id, DedupOutcome::New));
        };

        match self.store.get_file_by_hash(&hash).await? {
            None => {
                let record = FileRecord::new(path_str.clone(), file_type, size).with_hash(hash);
                let file_id = record.file_id.clone();
                self.store.insert_file_metadata(record).await?;
                Ok((true, file_id, DedupOutcome::New))
            }
            Some(existing) => self.resolve_outcome(existing, &path_str).await,
        }
    }

    async fn resolve_outcome(&self, existing: FileRecord, new_path: &str) -> DedupResult<(bool, FileId, DedupOutcome)> {
        let file_id = existing.file_id.clone();
        match existing.processing_status {
            ProcessingStatus::Completed if existing.file_path == new_path => {
                Ok((false, file_id, DedupOutcome::Skipped))
            }
            ProcessingStatus::Completed => {
                self.store.update_file_path(&file_id, new_path).await?;
                Ok((false, file_id, DedupOutcome::UpdatePath))
            }
            ProcessingStatus::Failed => {
                self.store.update_file_status(&file_id, ProcessingStatus::Pending).await?;
                Ok((true, file_id, DedupOutcome::Retry))
            }
            ProcessingStatus::Pending | ProcessingStatus::Processing => {
                Ok((false, file_id, DedupOutcome::Skipped))
            }
        }
    }

    async fn hash_with_cache(&self, path: &Path, path_str: &str, file_type: FileType) -> DedupResult<String> {
        let now = Utc::now();
        if let Some(cached) = self.hash_cache.lock().expect("hash cache mutex poisoned").get(path_str, now) {
            debug!(path = %path_str, "hash cache hit");
            return Ok(cached);
        }

        let hash = hash_file(path, file_type, &self.config).await?;
        self.hash_cache.lock().expect("hash cache mutex poisoned").put(path_str.to_string(), hash.clone());
        Ok(hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{FileMetadataStore as _, InMemoryFileMetadataStore};
    use std::io::Write;

    fn dedup() -> ContentHashDeduplicator {
        ContentHashDeduplicator::new(DedupConfig::default(), Arc::new(InMemoryFileMetadataStore::new()))
    }

    fn write_tmp(contents: &[u8]) -> tempfile::NamedTempFile {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(contents).unwrap();
        tmp
    }

    #[tokio::test]
    async fn scenario_1_duplicate_image_submission_updates_path() {
        let dedup = dedup();
        let a = write_tmp(b"cat-bytes");

        let (is_new, file_id, outcome) = dedup.process_new_file(a.path(), FileType::Image).await.unwrap();
        assert!(is_new);
        assert_eq!(outcome, DedupOutcome::New);
        dedup.store.update_file_status(&file_id, ProcessingStatus::Completed).await.unwrap();

        let mut b = tempfile::NamedTempFile::new().unwrap();
        b.write_all(b"cat-bytes").unwrap();
        let (is_new_2, file_id_2, outcome_2) = dedup.process_new_file(b.path(), FileType::Image).await.unwrap();

        assert!(!is_new_2);
        assert_eq!(file_id_2, file_id);
        assert_eq!(outcome_2, DedupOutcome::UpdatePath);

        let record = dedup.store.get_file(&file_id).await.unwrap().unwrap();
        assert_eq!(record.file_path, b.path().to_string_lossy());
    }

    #[tokio::test]
    async fn p6_same_content_after_completed_never_produces_new_file_id() {
        let dedup = dedup();
        let a = write_tmp(b"stable-content");
        let (_, file_id, _) = dedup.process_new_file(a.path(), FileType::Image).await.unwrap();
        dedup.store.update_file_status(&file_id, ProcessingStatus::Completed).await.unwrap();

        for _ in 0..5 {
            let mut other = tempfile::NamedTempFile::new().unwrap();
            other.write_all(b"stable-content").unwrap();
            let (is_new, id, _) = dedup.process_new_file(other.path(), FileType::Image).await.unwrap();
            assert!(!is_new);
            assert_eq!(id, file_id);
        }
    }

    #[tokio::test]
    async fn failed_status_resets_to_pending_and_retries() {
        let dedup = dedup();
        let a = write_tmp(b"failed-once");
        let (_, file_id, _) = dedup.process_new_file(a.path(), FileType::Image).await.unwrap();
        dedup.store.update_file_status(&file_id, ProcessingStatus::Failed).await.unwrap();

        let (is_new, id, outcome) = dedup.process_new_file(a.path(), FileType::Image).await.unwrap();
        assert!(is_new);
        assert_eq!(id, file_id);
        assert_eq!(outcome, DedupOutcome::Retry);

        let record = dedup.store.get_file(&file_id).await.unwrap().unwrap();
        assert_eq!(record.processing_status, ProcessingStatus::Pending);
    }

    #[tokio::test]
    async fn pending_or_processing_is_skipped() {
        let dedup = dedup();
        let a = write_tmp(b"in-flight");
        let (_, file_id, _) = dedup.process_new_file(a.path(), FileType::Image).await.unwrap();
        dedup.store.update_file_status(&file_id, ProcessingStatus::Processing).await.unwrap();

        let (is_new, id, outcome) = dedup.process_new_file(a.path(), FileType::Image).await.unwrap();
        assert!(!is_new);
        assert_eq!(id, file_id);
        assert_eq!(outcome, DedupOutcome::Skipped);
    }

    #[test]
    fn hash_cache_batch_evicts_oldest_20_percent_over_capacity() {
        let mut cache = HashCache::new(DedupConfig { hash_cache_capacity: 10, ..DedupConfig::default() });
        for i in 0..11 {
            cache.put(format!("path-{i}"), format!("hash-{i}"));
        }
        // 11 > capacity 10 triggers eviction of oldest max(11/5, 1) = 2 entries
        assert!(cache.entries.len() <= 10);
        assert!(!cache.entries.contains_key("path-0"));
    }
}
