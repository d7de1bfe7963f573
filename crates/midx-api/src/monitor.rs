//! TaskMonitor (C8): the task index, status tracking, and event fan-out.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use midx_models::{FileId, Task, TaskId, TaskStatus, TaskType};
use tokio::sync::broadcast;

/// A task's status transition, published for external observers (e.g. an
/// HTTP adapter's websocket, out of scope here, or a test harness).
#[derive(Debug, Clone)]
pub struct TaskEvent {
    pub task_id: TaskId,
    pub previous_status: TaskStatus,
    pub new_status: TaskStatus,
    pub at: DateTime<Utc>,
}

/// Filter for `TaskMonitor::list`. Every field is optional; a `None`
/// matches any value for that field.
#[derive(Debug, Clone, Default)]
pub struct TaskFilter {
    pub status: Option<TaskStatus>,
    pub task_type: Option<TaskType>,
    pub file_id: Option<FileId>,
    pub created_after: Option<DateTime<Utc>>,
    pub created_before: Option<DateTime<Utc>>,
}

impl TaskFilter {
    fn matches(&self, task: &Task) -> bool {
        if let Some(status) = self.status {
            if task.status != status {
                return false;
            }
        }
        if let Some(task_type) = self.task_type {
            if task.task_type != task_type {
                return false;
            }
        }
        if let Some(file_id) = &self.file_id {
            if task.file_id.as_ref() != Some(file_id) {
                return false;
            }
        }
        if let Some(after) = self.created_after {
            if task.created_at < after {
                return false;
            }
        }
        if let Some(before) = self.created_before {
            if task.created_at > before {
                return false;
            }
        }
        true
    }
}

#[derive(Debug, Clone, Default)]
pub struct TaskStats {
    pub queue_size: usize,
    pub running: usize,
    pub completed: usize,
    pub failed: usize,
    pub cancelled: usize,
    pub by_type: HashMap<String, usize>,
}

/// Single exclusive lock per mutation; readers take a consistent snapshot
/// under the same lock (spec.md 5: "single exclusive lock per mutation").
pub struct TaskMonitor {
    tasks: Mutex<HashMap<TaskId, Task>>,
    events: broadcast::Sender<TaskEvent>,
}

impl Default for TaskMonitor {
    fn default() -> Self {
        let (events, _) = broadcast::channel(256);
        Self { tasks: Mutex::new(HashMap::new()), events }
    }
}

impl TaskMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TaskEvent> {
        self.events.subscribe()
    }

    pub fn insert(&self, task: Task) {
        let mut tasks = self.tasks.lock().expect("task monitor mutex poisoned");
        tasks.insert(task.id.clone(), task);
    }

    pub fn get(&self, id: &TaskId) -> Option<Task> {
        self.tasks.lock().expect("task monitor mutex poisoned").get(id).cloned()
    }

    /// Replace the stored task with a new snapshot, emitting a
    /// `TaskEvent` if the status changed.
    pub fn update(&self, task: Task) {
        let mut tasks = self.tasks.lock().expect("task monitor mutex poisoned");
        let previous_status = tasks.get(&task.id).map(|t| t.status);
        let new_status = task.status;
        let task_id = task.id.clone();
        tasks.insert(task_id.clone(), task);
        drop(tasks);

        if let Some(previous_status) = previous_status {
            if previous_status != new_status {
                let _ = self.events.send(TaskEvent { task_id, previous_status, new_status, at: Utc::now() });
            }
        }
    }

    pub fn list(&self, filter: &TaskFilter) -> Vec<Task> {
        let tasks = self.tasks.lock().expect("task monitor mutex poisoned");
        tasks.values().filter(|t| filter.matches(t)).cloned().collect()
    }

    pub fn running_count(&self) -> usize {
        let tasks = self.tasks.lock().expect("task monitor mutex poisoned");
        tasks.values().filter(|t| t.status == TaskStatus::Running).count()
    }

    /// Tasks depending on `completed_id` whose full `depends_on` set is
    /// now satisfied, currently sitting in `waiting_deps`.
    pub fn unblocked_by(&self, completed_id: &TaskId) -> Vec<TaskId> {
        let tasks = self.tasks.lock().expect("task monitor mutex poisoned");
        tasks
            .values()
            .filter(|t| t.status == TaskStatus::WaitingDeps && t.depends_on.contains(completed_id))
            .filter(|t| t.depends_on.iter().all(|dep| tasks.get(dep).is_some_and(|d| d.status == TaskStatus::Completed)))
            .map(|t| t.id.clone())
            .collect()
    }

    /// Ids of all non-terminal tasks that list `id` in their `depends_on`,
    /// regardless of whether their *other* dependencies are satisfied.
    /// Used to cascade a `DependencyUnsatisfied` failure down the DAG when
    /// `id` itself fails or is cancelled (spec.md section 7).
    pub fn dependents_of(&self, id: &TaskId) -> Vec<TaskId> {
        let tasks = self.tasks.lock().expect("task monitor mutex poisoned");
        tasks
            .values()
            .filter(|t| !t.status.is_terminal() && t.depends_on.contains(id))
            .map(|t| t.id.clone())
            .collect()
    }

    pub fn stats(&self) -> TaskStats {
        let tasks = self.tasks.lock().expect("task monitor mutex poisoned");
        let mut stats = TaskStats::default();
        for task in tasks.values() {
            match task.status {
                TaskStatus::Running => stats.running += 1,
                TaskStatus::Completed => stats.completed += 1,
                TaskStatus::Failed => stats.failed += 1,
                TaskStatus::Cancelled => stats.cancelled += 1,
                TaskStatus::Pending | TaskStatus::WaitingDeps | TaskStatus::WaitingPipeline => {
                    stats.queue_size += 1;
                }
            }
            *stats.by_type.entry(task.task_type.as_str().to_string()).or_insert(0) += 1;
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use midx_models::{TaskError, TaskErrorKind, TaskType};
    use serde_json::Value;

    #[test]
    fn update_emits_event_only_on_status_change() {
        let monitor = TaskMonitor::new();
        let mut rx = monitor.subscribe();
        let task = Task::new(TaskType::EmbedImage, Value::Null);
        monitor.insert(task.clone());

        monitor.update(task.clone());
        assert!(rx.try_recv().is_err(), "no status change, no event");

        let started = task.start();
        monitor.update(started);
        let event = rx.try_recv().unwrap();
        assert_eq!(event.previous_status, TaskStatus::Pending);
        assert_eq!(event.new_status, TaskStatus::Running);
    }

    #[test]
    fn list_filters_by_status_and_type() {
        let monitor = TaskMonitor::new();
        monitor.insert(Task::new(TaskType::EmbedImage, Value::Null));
        monitor.insert(Task::new(TaskType::EmbedVideo, Value::Null).start());

        let running = monitor.list(&TaskFilter { status: Some(TaskStatus::Running), ..Default::default() });
        assert_eq!(running.len(), 1);
        assert_eq!(running[0].task_type, TaskType::EmbedVideo);
    }

    #[test]
    fn dependents_of_ignores_terminal_tasks() {
        let monitor = TaskMonitor::new();
        let dep = Task::new(TaskType::PreprocessImage, Value::Null);
        let waiting = Task::new(TaskType::EmbedImage, Value::Null).with_depends_on([dep.id.clone()]);
        let already_failed =
            Task::new(TaskType::EmbedImage, Value::Null).with_depends_on([dep.id.clone()]).start().fail(TaskError::new(TaskErrorKind::HandlerError, "x"));

        monitor.insert(dep.clone());
        monitor.insert(waiting.clone());
        monitor.insert(already_failed);

        assert_eq!(monitor.dependents_of(&dep.id), vec![waiting.id]);
    }

    #[test]
    fn unblocked_by_requires_all_dependencies_completed() {
        let monitor = TaskMonitor::new();
        let dep_a = Task::new(TaskType::PreprocessImage, Value::Null);
        let dep_b = Task::new(TaskType::PreprocessImage, Value::Null);
        let mut waiting = Task::new(TaskType::EmbedImage, Value::Null).with_depends_on([dep_a.id.clone(), dep_b.id.clone()]);
        waiting.set_status(TaskStatus::WaitingDeps);

        monitor.insert(dep_a.clone());
        monitor.insert(dep_b.clone());
        monitor.insert(waiting.clone());

        assert!(monitor.unblocked_by(&dep_a.id).is_empty(), "dep_b not completed yet");

        monitor.update(dep_a.complete(Value::Null));
        monitor.update(dep_b.complete(Value::Null));
        assert_eq!(monitor.unblocked_by(&dep_b.id), vec![waiting.id]);
    }
}
