//! TaskGroupManager (C4): per-file task grouping and the pipeline lock.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::Utc;
use midx_models::{FileId, PipelineLockHolder, Task, TaskGroup, TaskId};
use midx_queue::GroupContinuityLookup;
use tracing::warn;

use crate::config::PipelineConfig;

struct GroupState {
    group: TaskGroup,
    /// Count of this group's pipeline tasks that have reached `completed`,
    /// tracked via `mark_pipeline_task_completed` since the group doesn't
    /// hold task records itself (`TaskMonitor` is the index of record).
    completed_pipeline_count: u32,
}

/// Owns one `TaskGroup` per `file_id` plus its pipeline lock. Implements
/// `midx_queue::GroupContinuityLookup` so `PriorityCalculator` can read the
/// continuity bonus without the queue crate depending on this one.
pub struct TaskGroupManager {
    config: PipelineConfig,
    groups: Mutex<HashMap<FileId, GroupState>>,
}

impl TaskGroupManager {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config, groups: Mutex::new(HashMap::new()) }
    }

    /// Register `task` under its `file_id`, creating the group lazily.
    /// A no-op for tasks with no `file_id`.
    pub fn add(&self, task: &Task, file_path: &str) {
        let Some(file_id) = &task.file_id else { return };
        let mut groups = self.groups.lock().expect("group manager mutex poisoned");
        let entry = groups
            .entry(file_id.clone())
            .or_insert_with(|| GroupState { group: TaskGroup::new(file_id.clone(), file_path), completed_pipeline_count: 0 });
        entry.group.add_task(task.id.clone());
    }

    /// `acquire_pipeline_lock` per spec.md 4.4: trivially true for
    /// non-pipeline tasks; true if the lock is unheld or already held by a
    /// task from the same group (re-entrant); false otherwise (held by
    /// another group, unless stale, in which case it is force-released
    /// first).
    pub fn acquire_pipeline_lock(&self, task: &Task) -> bool {
        if !task.is_pipeline_task() {
            return true;
        }
        let Some(file_id) = &task.file_id else { return false };
        let mut groups = self.groups.lock().expect("group manager mutex poisoned");
        let entry = groups
            .entry(file_id.clone())
            .or_insert_with(|| GroupState { group: TaskGroup::new(file_id.clone(), ""), completed_pipeline_count: 0 });

        if let Some(holder) = &entry.group.pipeline_lock {
            if holder.owner_task_id == task.id {
                return true;
            }
            let timeout = chrono::Duration::seconds(self.config.lock_timeout_secs);
            if holder.is_stale(timeout, Utc::now()) {
                warn!(file_id = %file_id, task_id = %task.id, "force-releasing stale pipeline lock");
                entry.group.pipeline_lock = Some(PipelineLockHolder::new(task.id.clone()));
                return true;
            }
            return false;
        }
        entry.group.pipeline_lock = Some(PipelineLockHolder::new(task.id.clone()));
        true
    }

    /// Release the lock if `task` holds it. A no-op otherwise (including
    /// for non-pipeline tasks, which never hold it).
    pub fn release_pipeline_lock(&self, task: &Task) {
        let Some(file_id) = &task.file_id else { return };
        let mut groups = self.groups.lock().expect("group manager mutex poisoned");
        if let Some(entry) = groups.get_mut(file_id) {
            if entry.group.is_held_by(&task.id) {
                entry.group.pipeline_lock = None;
            }
        }
    }

    /// Record that one of `file_id`'s pipeline tasks reached `completed`,
    /// feeding the continuity bonus the priority calculator applies to the
    /// next pipeline task in the same group.
    pub fn mark_pipeline_task_completed(&self, file_id: &FileId) {
        let mut groups = self.groups.lock().expect("group manager mutex poisoned");
        if let Some(entry) = groups.get_mut(file_id) {
            entry.completed_pipeline_count += 1;
        }
    }

    /// Force-release any lock older than `lock_timeout`, returning the ids
    /// of tasks whose lock was released this way (the caller should mark
    /// them `failed` with `TaskErrorKind::LockTimeout`).
    pub fn release_stale_locks(&self) -> Vec<TaskId> {
        let timeout = chrono::Duration::seconds(self.config.lock_timeout_secs);
        let now = Utc::now();
        let mut released = Vec::new();
        let mut groups = self.groups.lock().expect("group manager mutex poisoned");
        for entry in groups.values_mut() {
            if let Some(holder) = &entry.group.pipeline_lock {
                if holder.is_stale(timeout, now) {
                    released.push(holder.owner_task_id.clone());
                    entry.group.pipeline_lock = None;
                }
            }
        }
        released
    }

    pub fn is_locked(&self, file_id: &FileId) -> bool {
        let groups = self.groups.lock().expect("group manager mutex poisoned");
        groups.get(file_id).is_some_and(|e| e.group.is_locked())
    }
}

impl GroupContinuityLookup for TaskGroupManager {
    fn has_completed_pipeline_task(&self, file_id: &FileId) -> bool {
        let groups = self.groups.lock().expect("group manager mutex poisoned");
        groups.get(file_id).is_some_and(|e| e.completed_pipeline_count > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use midx_models::TaskType;
    use serde_json::Value;

    fn pipeline_task(file_id: FileId) -> Task {
        Task::new(TaskType::PreprocessVideo, Value::Null).with_file_id(file_id)
    }

    #[test]
    fn non_pipeline_task_always_acquires() {
        let manager = TaskGroupManager::new(PipelineConfig::default());
        let task = Task::new(TaskType::GenerateThumbnail, Value::Null);
        assert!(manager.acquire_pipeline_lock(&task));
    }

    #[test]
    fn second_task_from_other_group_blocked_until_release() {
        let manager = TaskGroupManager::new(PipelineConfig::default());
        let file_a = FileId::new();
        let file_b = FileId::new();
        let task_a = pipeline_task(file_a.clone());
        let task_b = pipeline_task(file_b);

        assert!(manager.acquire_pipeline_lock(&task_a));
        assert!(manager.acquire_pipeline_lock(&task_b), "different group, lock unheld for it");

        let task_a2 = pipeline_task(file_a.clone());
        assert!(!manager.acquire_pipeline_lock(&task_a2), "file_a's lock is held by task_a");

        manager.release_pipeline_lock(&task_a);
        assert!(manager.acquire_pipeline_lock(&task_a2));
    }

    #[test]
    fn same_task_reacquires_reentrantly() {
        let manager = TaskGroupManager::new(PipelineConfig::default());
        let file_id = FileId::new();
        let task = pipeline_task(file_id);
        assert!(manager.acquire_pipeline_lock(&task));
        assert!(manager.acquire_pipeline_lock(&task));
    }

    #[test]
    fn stale_lock_is_force_released() {
        let manager = TaskGroupManager::new(PipelineConfig { lock_timeout_secs: 0 });
        let file_id = FileId::new();
        let holder = pipeline_task(file_id.clone());
        assert!(manager.acquire_pipeline_lock(&holder));

        std::thread::sleep(std::time::Duration::from_millis(5));
        let other = pipeline_task(file_id);
        assert!(manager.acquire_pipeline_lock(&other), "zero timeout lock should already be stale");
    }

    #[test]
    fn continuity_lookup_reflects_completed_predecessors() {
        let manager = TaskGroupManager::new(PipelineConfig::default());
        let file_id = FileId::new();
        assert!(!manager.has_completed_pipeline_task(&file_id));
        manager.mark_pipeline_task_completed(&file_id);
        assert!(manager.has_completed_pipeline_task(&file_id));
    }
}
