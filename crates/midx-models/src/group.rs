//! TaskGroup: the per-file collection of tasks and its pipeline lock.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::ids::{FileId, TaskId};

/// The holder of a group's pipeline lock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct PipelineLockHolder {
    pub owner_task_id: TaskId,
    pub acquired_at: DateTime<Utc>,
}

impl PipelineLockHolder {
    pub fn new(owner_task_id: TaskId) -> Self {
        Self { owner_task_id, acquired_at: Utc::now() }
    }

    /// Whether this lock is older than `timeout` and thus eligible for a
    /// forced release by the group manager.
    pub fn is_stale(&self, timeout: chrono::Duration, now: DateTime<Utc>) -> bool {
        now - self.acquired_at > timeout
    }
}

/// A collection of tasks sharing a `file_id`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct TaskGroup {
    pub file_id: FileId,
    pub file_path: String,
    pub created_at: DateTime<Utc>,
    pub tasks: BTreeSet<TaskId>,
    pub pipeline_lock: Option<PipelineLockHolder>,
}

impl TaskGroup {
    pub fn new(file_id: FileId, file_path: impl Into<String>) -> Self {
        Self {
            file_id,
            file_path: file_path.into(),
            created_at: Utc::now(),
            tasks: BTreeSet::new(),
            pipeline_lock: None,
        }
    }

    pub fn add_task(&mut self, task_id: TaskId) {
        self.tasks.insert(task_id);
    }

    pub fn is_locked(&self) -> bool {
        self.pipeline_lock.is_some()
    }

    /// Whether `task_id` currently holds (or would hold, re-entrantly) the
    /// group's pipeline lock.
    pub fn is_held_by(&self, task_id: &TaskId) -> bool {
        self.pipeline_lock.as_ref().is_some_and(|h| &h.owner_task_id == task_id)
    }
}
