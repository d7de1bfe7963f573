//! PriorityCalculator (C2): a deterministic function `task -> schedule key`.

use chrono::{DateTime, Utc};
use midx_models::{FileId, Task};

use crate::config::PriorityConfig;

/// Read-only lookup the calculator needs to determine the continuity bonus,
/// implemented by whatever owns file groups (`TaskGroupManager`). Kept as a
/// trait here so the queue crate never depends on the worker crate.
pub trait GroupContinuityLookup {
    /// Whether `file_id`'s group has at least one already-completed
    /// pipeline task.
    fn has_completed_pipeline_task(&self, file_id: &FileId) -> bool;
}

/// A lookup with no groups; every task is treated as having no completed
/// predecessor. Useful for tests and for tasks with no `file_id`.
pub struct NoGroups;

impl GroupContinuityLookup for NoGroups {
    fn has_completed_pipeline_task(&self, _file_id: &FileId) -> bool {
        false
    }
}

/// Per-term breakdown of a computed priority key, for observability and
/// for asserting P1/P2 in tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriorityBreakdown {
    pub base_priority: i64,
    pub type_priority: i64,
    pub wait_compensation: i64,
    pub continuity_bonus: i64,
    pub total: i64,
}

/// Pure priority-key function. Holds only configuration; recomputing a key
/// never mutates anything.
#[derive(Debug, Clone)]
pub struct PriorityCalculator {
    config: PriorityConfig,
}

impl PriorityCalculator {
    pub fn new(config: PriorityConfig) -> Self {
        Self { config }
    }

    /// Compute the full breakdown of a task's priority key at `now`.
    pub fn breakdown(&self, task: &Task, groups: &impl GroupContinuityLookup, now: DateTime<Utc>) -> PriorityBreakdown {
        let base_priority = task.task_type.base_priority();
        let type_priority = task.task_type.type_priority();
        let wait_compensation = self.wait_compensation(task, now);
        let continuity_bonus = self.continuity_bonus(task, groups);

        let total = base_priority * 1000 + type_priority * 10 + wait_compensation + continuity_bonus;
        PriorityBreakdown { base_priority, type_priority, wait_compensation, continuity_bonus, total }
    }

    /// Compute the scheduling key. Smaller is more urgent.
    ///
    /// Note: `base_priority` is scaled by 1000 and an orthogonal per-file
    /// priority term is intentionally not modelled (no external caller in
    /// this design supplies one) — see DESIGN.md for the resolved open
    /// question on the spec's `file_priority * 100` term.
    pub fn priority(&self, task: &Task, groups: &impl GroupContinuityLookup, now: DateTime<Utc>) -> i64 {
        self.breakdown(task, groups, now).total
    }

    fn wait_compensation(&self, task: &Task, now: DateTime<Utc>) -> i64 {
        let elapsed = (now - task.created_at).num_seconds().max(0);
        if self.config.wait_interval_secs <= 0 {
            return 0;
        }
        let steps = elapsed / self.config.wait_interval_secs;
        (steps * self.config.wait_step_value).min(self.config.max_wait)
    }

    fn continuity_bonus(&self, task: &Task, groups: &impl GroupContinuityLookup) -> i64 {
        if !task.is_pipeline_task() {
            return 0;
        }
        let Some(file_id) = &task.file_id else { return 0 };
        if groups.has_completed_pipeline_task(file_id) {
            self.config.continuity_bonus
        } else {
            0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use midx_models::TaskType;
    use serde_json::Value;

    fn calc() -> PriorityCalculator {
        PriorityCalculator::new(PriorityConfig::default())
    }

    #[test]
    fn p1_wait_compensation_is_monotone_in_elapsed_time() {
        let calc = calc();
        let task = Task::new(TaskType::EmbedImage, Value::Null);
        let t0 = task.created_at;
        let key_at_0 = calc.priority(&task, &NoGroups, t0);
        let key_at_later = calc.priority(&task, &NoGroups, t0 + chrono::Duration::seconds(600));
        assert!(key_at_later <= key_at_0, "wait compensation must never increase the key");
    }

    #[test]
    fn wait_compensation_is_capped_at_max_wait() {
        let calc = calc();
        let task = Task::new(TaskType::EmbedImage, Value::Null);
        let far_future = task.created_at + chrono::Duration::days(365);
        let breakdown = calc.breakdown(&task, &NoGroups, far_future);
        assert_eq!(breakdown.wait_compensation, 999);
    }

    #[test]
    fn continuity_bonus_only_applies_to_pipeline_tasks_with_a_completed_predecessor() {
        struct AlwaysTrue;
        impl GroupContinuityLookup for AlwaysTrue {
            fn has_completed_pipeline_task(&self, _file_id: &FileId) -> bool {
                true
            }
        }

        let calc = calc();
        let file_id = FileId::new();
        let pipeline_task = Task::new(TaskType::EmbedVideo, Value::Null).with_file_id(file_id.clone());
        let scan_task = Task::new(TaskType::ScanFile, Value::Null).with_file_id(file_id);

        let now = Utc::now();
        assert_eq!(calc.breakdown(&pipeline_task, &AlwaysTrue, now).continuity_bonus, -20);
        assert_eq!(calc.breakdown(&scan_task, &AlwaysTrue, now).continuity_bonus, 0);
    }

    #[test]
    fn embed_image_outranks_preprocess_video_all_else_equal() {
        let calc = calc();
        let now = Utc::now();
        let embed = Task::new(TaskType::EmbedImage, Value::Null);
        let preprocess = Task::new(TaskType::PreprocessVideo, Value::Null);
        assert!(calc.priority(&embed, &NoGroups, now) < calc.priority(&preprocess, &NoGroups, now));
    }
}
