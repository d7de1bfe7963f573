//! FileRecord: the external store's canonical record for one content-hash.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::ids::FileId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum FileType {
    Image,
    Video,
    Audio,
}

impl FileType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileType::Image => "image",
            FileType::Video => "video",
            FileType::Audio => "audio",
        }
    }
}

impl std::fmt::Display for FileType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingStatus {
    #[default]
    Pending,
    Processing,
    Completed,
    Failed,
}

impl ProcessingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessingStatus::Pending => "pending",
            ProcessingStatus::Processing => "processing",
            ProcessingStatus::Completed => "completed",
            ProcessingStatus::Failed => "failed",
        }
    }
}

/// Persisted (by an external collaborator) record of one file's content.
///
/// `file_hash` uniquely identifies content: two records with identical
/// `file_hash` represent the same bytes at possibly different paths.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct FileRecord {
    pub file_id: FileId,
    pub file_path: String,
    pub file_type: FileType,
    pub file_size: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_hash: Option<String>,
    pub processing_status: ProcessingStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl FileRecord {
    pub fn new(file_path: impl Into<String>, file_type: FileType, file_size: u64) -> Self {
        let now = Utc::now();
        Self {
            file_id: FileId::new(),
            file_path: file_path.into(),
            file_type,
            file_size,
            file_hash: None,
            processing_status: ProcessingStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_hash(mut self, hash: impl Into<String>) -> Self {
        self.file_hash = Some(hash.into());
        self
    }

    pub fn set_status(&mut self, status: ProcessingStatus) {
        self.processing_status = status;
        self.updated_at = Utc::now();
    }

    pub fn set_path(&mut self, path: impl Into<String>) {
        self.file_path = path.into();
        self.updated_at = Utc::now();
    }
}

/// Outcome of `ContentHashDeduplicator::process_new_file`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum DedupOutcome {
    New,
    Retry,
    UpdatePath,
    Skipped,
}

impl DedupOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            DedupOutcome::New => "new",
            DedupOutcome::Retry => "retry",
            DedupOutcome::UpdatePath => "update_path",
            DedupOutcome::Skipped => "skipped",
        }
    }
}
