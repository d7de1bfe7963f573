//! Structured task logging: consistent tracing spans keyed by `task_id` and
//! `file_id`, the core's analogue of the teacher's `JobLogger`.

use midx_models::{FileId, TaskId};
use tracing::{error, info, warn, Span};

#[derive(Debug, Clone)]
pub struct TaskLogger {
    task_id: String,
    file_id: Option<String>,
    task_type: String,
}

impl TaskLogger {
    pub fn new(task_id: &TaskId, file_id: Option<&FileId>, task_type: &str) -> Self {
        Self {
            task_id: task_id.to_string(),
            file_id: file_id.map(|f| f.to_string()),
            task_type: task_type.to_string(),
        }
    }

    pub fn log_start(&self, message: &str) {
        info!(task_id = %self.task_id, file_id = ?self.file_id, task_type = %self.task_type, "task started: {}", message);
    }

    pub fn log_progress(&self, message: &str) {
        info!(task_id = %self.task_id, file_id = ?self.file_id, task_type = %self.task_type, "task progress: {}", message);
    }

    pub fn log_warning(&self, message: &str) {
        warn!(task_id = %self.task_id, file_id = ?self.file_id, task_type = %self.task_type, "task warning: {}", message);
    }

    pub fn log_error(&self, message: &str) {
        error!(task_id = %self.task_id, file_id = ?self.file_id, task_type = %self.task_type, "task error: {}", message);
    }

    pub fn log_completion(&self, message: &str) {
        info!(task_id = %self.task_id, file_id = ?self.file_id, task_type = %self.task_type, "task completed: {}", message);
    }

    pub fn create_span(&self) -> Span {
        tracing::info_span!("task", task_id = %self.task_id, file_id = ?self.file_id, task_type = %self.task_type)
    }
}
