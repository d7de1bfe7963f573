//! Task: an immutable-identity record of a unit of work.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ids::{FileId, TaskId};

/// Closed set of task types the core schedules and executes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    PreprocessImage,
    PreprocessVideo,
    PreprocessAudio,
    SegmentVideo,
    EmbedImage,
    EmbedVideo,
    EmbedAudio,
    GenerateThumbnail,
    GeneratePreview,
    ScanFile,
}

impl TaskType {
    /// The base-priority tier for this type (see `PriorityCalculator`).
    pub fn base_priority(&self) -> i64 {
        match self {
            TaskType::PreprocessImage | TaskType::PreprocessVideo | TaskType::PreprocessAudio => 1,
            TaskType::EmbedImage | TaskType::EmbedVideo | TaskType::EmbedAudio => 1,
            TaskType::SegmentVideo => 3,
            TaskType::ScanFile => 3,
            TaskType::GenerateThumbnail | TaskType::GeneratePreview => 2,
        }
    }

    /// The finer-grained type-priority tier.
    pub fn type_priority(&self) -> i64 {
        match self {
            TaskType::EmbedImage => 1,
            TaskType::EmbedVideo => 2,
            TaskType::EmbedAudio => 3,
            TaskType::PreprocessImage | TaskType::PreprocessVideo | TaskType::PreprocessAudio => 4,
            TaskType::SegmentVideo => 2,
            TaskType::ScanFile => 3,
            TaskType::GenerateThumbnail => 5,
            TaskType::GeneratePreview => 6,
        }
    }

    /// Whether this type belongs to the preprocess -> embed pipeline chain
    /// that the pipeline lock (`TaskGroupManager`) keeps contiguous.
    pub fn is_pipeline_task(&self) -> bool {
        matches!(
            self,
            TaskType::PreprocessImage
                | TaskType::PreprocessVideo
                | TaskType::PreprocessAudio
                | TaskType::SegmentVideo
                | TaskType::EmbedImage
                | TaskType::EmbedVideo
                | TaskType::EmbedAudio
        )
    }

    /// Whether this type is non-critical and may be skipped while the
    /// resource state is `warning` (thumbnails/previews).
    pub fn is_non_critical(&self) -> bool {
        matches!(self, TaskType::GenerateThumbnail | TaskType::GeneratePreview)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskType::PreprocessImage => "preprocess_image",
            TaskType::PreprocessVideo => "preprocess_video",
            TaskType::PreprocessAudio => "preprocess_audio",
            TaskType::SegmentVideo => "segment_video",
            TaskType::EmbedImage => "embed_image",
            TaskType::EmbedVideo => "embed_video",
            TaskType::EmbedAudio => "embed_audio",
            TaskType::GenerateThumbnail => "generate_thumbnail",
            TaskType::GeneratePreview => "generate_preview",
            TaskType::ScanFile => "scan_file",
        }
    }
}

impl std::fmt::Display for TaskType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Task lifecycle status. Transitions form a DAG with sinks
/// `{completed, failed, cancelled}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Pending,
    WaitingDeps,
    WaitingPipeline,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Cancelled)
    }

    /// Whether the queue should treat an entry with this status as eligible
    /// for dequeue (stale entries with any other status are dropped).
    pub fn is_schedulable(&self) -> bool {
        matches!(self, TaskStatus::Pending | TaskStatus::WaitingPipeline)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::WaitingDeps => "waiting_deps",
            TaskStatus::WaitingPipeline => "waiting_pipeline",
            TaskStatus::Running => "running",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
            TaskStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Closed set of error kinds a task's failure may carry (spec.md section 7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum TaskErrorKind {
    InputError,
    DependencyUnsatisfied,
    HandlerError,
    ResourcePressure,
    DuplicateFile,
    CacheInsertFail,
    LockTimeout,
}

impl TaskErrorKind {
    /// Whether a failure of this kind is eligible for the executor's retry loop.
    pub fn is_retryable(&self) -> bool {
        matches!(self, TaskErrorKind::HandlerError)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskErrorKind::InputError => "input_error",
            TaskErrorKind::DependencyUnsatisfied => "dependency_unsatisfied",
            TaskErrorKind::HandlerError => "handler_error",
            TaskErrorKind::ResourcePressure => "resource_pressure",
            TaskErrorKind::DuplicateFile => "duplicate_file",
            TaskErrorKind::CacheInsertFail => "cache_insert_fail",
            TaskErrorKind::LockTimeout => "lock_timeout",
        }
    }
}

impl std::fmt::Display for TaskErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A task's terminal error: a stable kind tag plus a human message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct TaskError {
    pub kind: TaskErrorKind,
    pub message: String,
}

impl TaskError {
    pub fn new(kind: TaskErrorKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into() }
    }
}

impl std::fmt::Display for TaskError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

fn default_max_retries() -> u32 {
    3
}

/// A unit of work. Identity is assigned once at creation and never reused.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Task {
    pub id: TaskId,
    #[serde(rename = "type")]
    pub task_type: TaskType,
    /// Opaque payload interpreted only by the type's registered handler.
    #[serde(default)]
    pub payload: Value,
    /// Signed schedule key; lower is more urgent. Recomputed on enqueue.
    #[serde(default)]
    pub priority: i64,
    #[serde(default)]
    pub status: TaskStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_id: Option<FileId>,
    #[serde(default)]
    pub depends_on: BTreeSet<TaskId>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub retry_count: u32,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<TaskError>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
}

impl Task {
    /// Create a new task of `task_type`, unscheduled (`priority` is filled
    /// in by the `PriorityCalculator` before the first enqueue).
    pub fn new(task_type: TaskType, payload: Value) -> Self {
        let now = Utc::now();
        Self {
            id: TaskId::new(),
            task_type,
            payload,
            priority: 0,
            status: TaskStatus::Pending,
            file_id: None,
            depends_on: BTreeSet::new(),
            created_at: now,
            started_at: None,
            completed_at: None,
            updated_at: now,
            retry_count: 0,
            max_retries: default_max_retries(),
            error: None,
            result: None,
        }
    }

    pub fn with_file_id(mut self, file_id: FileId) -> Self {
        self.file_id = Some(file_id);
        self
    }

    pub fn with_depends_on(mut self, depends_on: impl IntoIterator<Item = TaskId>) -> Self {
        self.depends_on.extend(depends_on);
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn is_pipeline_task(&self) -> bool {
        self.task_type.is_pipeline_task()
    }

    /// Transition `pending -> running`, stamping `started_at`.
    pub fn start(mut self) -> Self {
        self.status = TaskStatus::Running;
        self.started_at = Some(Utc::now());
        self.updated_at = Utc::now();
        self
    }

    /// Transition to `completed`, recording the handler's result.
    pub fn complete(mut self, result: Value) -> Self {
        self.status = TaskStatus::Completed;
        self.result = Some(result);
        self.error = None;
        self.completed_at = Some(Utc::now());
        self.updated_at = Utc::now();
        self
    }

    /// Transition to `failed`, recording the terminal error.
    pub fn fail(mut self, error: TaskError) -> Self {
        self.status = TaskStatus::Failed;
        self.error = Some(error);
        self.completed_at = Some(Utc::now());
        self.updated_at = Utc::now();
        self
    }

    /// Transition to `cancelled`.
    pub fn cancel(mut self) -> Self {
        self.status = TaskStatus::Cancelled;
        self.completed_at = Some(Utc::now());
        self.updated_at = Utc::now();
        self
    }

    /// Increment the retry counter. Caller is responsible for checking
    /// `retry_count <= max_retries` beforehand.
    pub fn record_retry(mut self) -> Self {
        self.retry_count += 1;
        self.status = TaskStatus::Pending;
        self.updated_at = Utc::now();
        self
    }

    pub fn can_retry(&self) -> bool {
        self.retry_count < self.max_retries
    }

    pub fn set_status(&mut self, status: TaskStatus) {
        self.status = status;
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_task_starts_pending_with_zero_retries() {
        let task = Task::new(TaskType::EmbedImage, Value::Null);
        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.retry_count, 0);
        assert!(task.can_retry());
    }

    #[test]
    fn fail_then_retry_resets_to_pending_and_bumps_count() {
        let task = Task::new(TaskType::EmbedImage, Value::Null).start();
        let failed = task.fail(TaskError::new(TaskErrorKind::HandlerError, "boom"));
        assert_eq!(failed.status, TaskStatus::Failed);
        let retried = failed.record_retry();
        assert_eq!(retried.status, TaskStatus::Pending);
        assert_eq!(retried.retry_count, 1);
    }

    #[test]
    fn max_retries_zero_means_no_retry_budget() {
        let task = Task::new(TaskType::EmbedImage, Value::Null).with_max_retries(0);
        assert!(!task.can_retry());
    }

    #[test]
    fn pipeline_task_classification_matches_spec_set() {
        assert!(TaskType::PreprocessVideo.is_pipeline_task());
        assert!(TaskType::SegmentVideo.is_pipeline_task());
        assert!(TaskType::EmbedAudio.is_pipeline_task());
        assert!(!TaskType::ScanFile.is_pipeline_task());
        assert!(!TaskType::GenerateThumbnail.is_pipeline_task());
    }
}
