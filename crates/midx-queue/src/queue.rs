//! TaskQueue (C3): priority-ordered waiting set.
//!
//! Holds full `Task` values for not-yet-dispatched tasks only; once a task
//! is dequeued, ownership of the canonical record passes to the caller
//! (`TaskMonitor` remains the authoritative index for a task's whole
//! lifetime, per spec's arena-by-id design). The internal heap stores only
//! ids and priority keys, so the synchronised structure mutation itself
//! never touches task payloads.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use midx_models::{Task, TaskId};
use tracing::trace;

/// One entry in the priority heap. `BinaryHeap` is a max-heap, so `Ord` is
/// implemented in reverse of the natural key ordering to get min-heap
/// (lowest key first) behaviour.
#[derive(Debug, Clone, Eq, PartialEq)]
struct HeapEntry {
    task_id: TaskId,
    priority: i64,
    created_at: DateTime<Utc>,
}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .priority
            .cmp(&self.priority)
            .then_with(|| other.created_at.cmp(&self.created_at))
            .then_with(|| other.task_id.cmp(&self.task_id))
    }
}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

struct Inner {
    heap: BinaryHeap<HeapEntry>,
    tasks: HashMap<TaskId, Task>,
}

/// Priority-ordered waiting set with O(log n) insert/pop and O(n)
/// priority update (via remove+reinsert).
pub struct TaskQueue {
    inner: Mutex<Inner>,
}

impl Default for TaskQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskQueue {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner { heap: BinaryHeap::new(), tasks: HashMap::new() }),
        }
    }

    /// Insert `task`, keyed by its current `priority` field. Idempotent on
    /// task id: re-enqueuing an id already present replaces its record and
    /// returns `false`.
    pub fn enqueue(&self, task: Task) -> bool {
        let mut inner = self.inner.lock().expect("queue mutex poisoned");
        let is_new = !inner.tasks.contains_key(&task.id);
        let entry = HeapEntry {
            task_id: task.id.clone(),
            priority: task.priority,
            created_at: task.created_at,
        };
        inner.tasks.insert(task.id.clone(), task);
        inner.heap.push(entry);
        trace!(is_new, "task enqueued");
        is_new
    }

    /// Remove and return the task with the lowest priority key, skipping
    /// (and silently dropping) any stale heap entry whose task is no
    /// longer schedulable or has been removed.
    pub fn dequeue(&self) -> Option<Task> {
        let mut inner = self.inner.lock().expect("queue mutex poisoned");
        loop {
            let entry = inner.heap.pop()?;
            match inner.tasks.remove(&entry.task_id) {
                None => continue,
                Some(task) if !task.status.is_schedulable() => continue,
                Some(task) => return Some(task),
            }
        }
    }

    /// Return a clone of the next-to-dequeue task without removing it.
    pub fn peek(&self) -> Option<Task> {
        let inner = self.inner.lock().expect("queue mutex poisoned");
        inner
            .heap
            .iter()
            .filter_map(|entry| inner.tasks.get(&entry.task_id))
            .find(|task| task.status.is_schedulable())
            .cloned()
    }

    /// Remove a task by id. Returns whether it was present.
    pub fn remove(&self, id: &TaskId) -> bool {
        let mut inner = self.inner.lock().expect("queue mutex poisoned");
        inner.tasks.remove(id).is_some()
    }

    /// Update a queued task's priority key in place.
    pub fn update_priority(&self, id: &TaskId, new_priority: i64) -> bool {
        let mut inner = self.inner.lock().expect("queue mutex poisoned");
        let Some(task) = inner.tasks.get_mut(id) else { return false };
        task.priority = new_priority;
        let entry = HeapEntry {
            task_id: task.id.clone(),
            priority: new_priority,
            created_at: task.created_at,
        };
        inner.heap.push(entry);
        true
    }

    /// Number of live (non-stale) waiting tasks.
    pub fn size(&self) -> usize {
        let inner = self.inner.lock().expect("queue mutex poisoned");
        inner.tasks.values().filter(|t| t.status.is_schedulable()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Best-effort compaction of the heap: drops entries whose task has
    /// since been removed or gone stale. Amortises the cost of
    /// `update_priority`'s append-only reinsertion.
    pub fn compact(&self) {
        let mut inner = self.inner.lock().expect("queue mutex poisoned");
        let live: BinaryHeap<HeapEntry> = inner
            .heap
            .drain()
            .filter(|e| inner.tasks.get(&e.task_id).is_some_and(|t| t.status.is_schedulable()))
            .collect();
        inner.heap = live;
    }
}
