//! TaskOrchestrator (C9): the main loop wiring C2-C8 together (spec.md
//! section 4.9). A single bounded scan-and-defer tick per iteration rather
//! than one dequeue per iteration, so the loop always makes forward
//! progress across the whole ready set instead of head-of-line blocking on
//! whichever task happens to sort first when it can't yet run.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use midx_models::{ResourceState, Task, TaskError, TaskErrorKind, TaskId, TaskStatus};
use midx_queue::{GroupContinuityLookup, PriorityCalculator, TaskQueue};
use midx_worker::{CancellationToken, ConcurrencyController, ResourceMonitor, RetryConfig, TaskExecutor, TaskGroupManager};
use tokio::sync::watch;
use tracing::warn;

use crate::monitor::TaskMonitor;

/// Per-tick scan is capped at this many dequeued entries, regardless of
/// how deep the ready set is, so one tick can never block on draining an
/// entire large backlog (see DESIGN.md).
const MAX_SCAN_PER_TICK: usize = 64;

pub struct TaskOrchestrator {
    queue: Arc<TaskQueue>,
    monitor: Arc<TaskMonitor>,
    groups: Arc<TaskGroupManager>,
    resources: Arc<ResourceMonitor>,
    concurrency: Arc<ConcurrencyController>,
    executor: Arc<TaskExecutor>,
    calculator: PriorityCalculator,
    retry: RetryConfig,
    scheduler_poll: Duration,
    cancel_tokens: Arc<Mutex<std::collections::HashMap<TaskId, CancellationToken>>>,
}

impl TaskOrchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        queue: Arc<TaskQueue>,
        monitor: Arc<TaskMonitor>,
        groups: Arc<TaskGroupManager>,
        resources: Arc<ResourceMonitor>,
        concurrency: Arc<ConcurrencyController>,
        executor: Arc<TaskExecutor>,
        calculator: PriorityCalculator,
        retry: RetryConfig,
        scheduler_poll: Duration,
    ) -> Self {
        Self {
            queue,
            monitor,
            groups,
            resources,
            concurrency,
            executor,
            calculator,
            retry,
            scheduler_poll,
            cancel_tokens: Arc::new(Mutex::new(std::collections::HashMap::new())),
        }
    }

    /// Register every task in a freshly-built file pipeline: add it to its
    /// group, and either enqueue it (no unsatisfied dependency) or park it
    /// `waiting_deps`.
    pub fn submit_tasks(&self, tasks: Vec<Task>, file_path: &str) {
        let now = Utc::now();
        for mut task in tasks {
            self.groups.add(&task, file_path);
            if Self::dependencies_satisfied(&self.monitor, &task) {
                task.priority = self.calculator.priority(&task, self.groups.as_ref(), now);
                self.monitor.insert(task.clone());
                self.queue.enqueue(task);
            } else {
                task.set_status(TaskStatus::WaitingDeps);
                self.monitor.insert(task);
            }
        }
    }

    pub fn cancel_task(&self, id: &TaskId) -> bool {
        let Some(task) = self.monitor.get(id) else { return false };
        if task.status.is_terminal() {
            return false;
        }
        if task.status == TaskStatus::Running {
            if let Some(cancel) = self.cancel_tokens.lock().expect("cancel token map poisoned").get(id) {
                cancel.cancel();
            }
            return true;
        }
        self.queue.remove(id);
        let cancelled = task.cancel();
        self.monitor.update(cancelled);
        Self::cascade_dependency_failures(&self.queue, &self.monitor, id);
        true
    }

    pub fn set_priority(&self, id: &TaskId, priority: i64) -> bool {
        let Some(mut task) = self.monitor.get(id) else { return false };
        task.priority = priority;
        self.monitor.update(task.clone());
        self.queue.update_priority(id, priority);
        true
    }

    /// Run the main loop until `shutdown` fires.
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.scheduler_poll);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.tick().await;
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        return;
                    }
                }
            }
        }
    }

    /// Background sweep that force-releases stale pipeline locks and fails
    /// their holder with `LockTimeout` (spec.md section 4.4/7).
    pub async fn run_lock_sweep(self: Arc<Self>, interval: Duration, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    for id in self.groups.release_stale_locks() {
                        self.fail_task(&id, TaskError::new(TaskErrorKind::LockTimeout, "pipeline lock exceeded its timeout"));
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        return;
                    }
                }
            }
        }
    }

    /// One scheduling pass: spec.md section 4.9 steps 1-6, bounded to
    /// `MAX_SCAN_PER_TICK` dequeued entries. Ineligible entries are
    /// re-enqueued once the scan completes rather than on the spot, so a
    /// single tick never re-examines the same entry twice.
    pub async fn tick(&self) {
        let state = self.resources.state();
        let target = self.concurrency.target();
        let running = self.monitor.running_count();
        if running >= target {
            return;
        }

        let mut budget = target - running;
        let batch_size = self.queue.size().min(MAX_SCAN_PER_TICK);
        let mut deferred = Vec::new();
        let mut examined = 0;

        while budget > 0 && examined < batch_size {
            let Some(mut task) = self.queue.dequeue() else { break };
            examined += 1;

            if !Self::dependencies_satisfied(&self.monitor, &task) {
                task.set_status(TaskStatus::WaitingDeps);
                self.monitor.update(task.clone());
                self.queue.enqueue(task);
                continue;
            }

            if self.is_gated_by_resource_state(state, &task) {
                warn!(
                    task_id = %task.id,
                    task_type = %task.task_type,
                    kind = %TaskErrorKind::ResourcePressure,
                    ?state,
                    "deferring task under resource back-pressure"
                );
                deferred.push(task);
                continue;
            }

            if task.is_pipeline_task() && !self.groups.acquire_pipeline_lock(&task) {
                task.set_status(TaskStatus::WaitingPipeline);
                self.monitor.update(task.clone());
                self.queue.enqueue(task);
                continue;
            }

            self.dispatch(task);
            budget -= 1;
        }

        for task in deferred {
            self.queue.enqueue(task);
        }
    }

    fn dependencies_satisfied(monitor: &TaskMonitor, task: &Task) -> bool {
        task.depends_on.iter().all(|dep| monitor.get(dep).is_some_and(|t| t.status == TaskStatus::Completed))
    }

    /// `pause` defers everything except a pipeline task whose group has
    /// already completed a predecessor (letting in-flight chains finish is
    /// worth more than starting fresh work under pressure); `warning`
    /// defers only non-critical (thumbnail/preview) tasks.
    fn is_gated_by_resource_state(&self, state: ResourceState, task: &Task) -> bool {
        match state {
            ResourceState::Pause => !self.is_critical(task),
            ResourceState::Warning => task.task_type.is_non_critical(),
            ResourceState::Normal => false,
        }
    }

    fn is_critical(&self, task: &Task) -> bool {
        task.is_pipeline_task() && task.file_id.as_ref().is_some_and(|f| self.groups.has_completed_pipeline_task(f))
    }

    fn dispatch(&self, task: Task) {
        let task = task.start();
        self.monitor.update(task.clone());

        let cancel = CancellationToken::new();
        self.cancel_tokens.lock().expect("cancel token map poisoned").insert(task.id.clone(), cancel.clone());

        let queue = self.queue.clone();
        let monitor = self.monitor.clone();
        let groups = self.groups.clone();
        let calculator = self.calculator.clone();
        let executor = self.executor.clone();
        let retry = self.retry.clone();
        let cancel_tokens = self.cancel_tokens.clone();

        tokio::spawn(async move {
            let finished = executor.execute(task, &retry, cancel).await;
            cancel_tokens.lock().expect("cancel token map poisoned").remove(&finished.id);
            Self::finish(&queue, &monitor, &groups, &calculator, finished);
        });
    }

    /// Post-execution bookkeeping: release the pipeline lock, mark group
    /// continuity on success, then either unblock dependents or cascade a
    /// `DependencyUnsatisfied` failure through the DAG (spec.md section
    /// 4.9 step 7; the cascade on failure/cancellation is this crate's
    /// resolution of what "unblock" must mean on the failure path, since a
    /// dependency that will never complete can never unblock its
    /// dependents either — see DESIGN.md).
    fn finish(queue: &TaskQueue, monitor: &TaskMonitor, groups: &TaskGroupManager, calculator: &PriorityCalculator, task: Task) {
        groups.release_pipeline_lock(&task);
        if task.status == TaskStatus::Completed && task.is_pipeline_task() {
            if let Some(file_id) = &task.file_id {
                groups.mark_pipeline_task_completed(file_id);
            }
        }

        let finished_id = task.id.clone();
        let status = task.status;
        monitor.update(task);

        match status {
            TaskStatus::Completed => {
                let now = Utc::now();
                for id in monitor.unblocked_by(&finished_id) {
                    let Some(mut next) = monitor.get(&id) else { continue };
                    next.set_status(TaskStatus::Pending);
                    next.priority = calculator.priority(&next, groups, now);
                    monitor.update(next.clone());
                    queue.enqueue(next);
                }
            }
            TaskStatus::Failed | TaskStatus::Cancelled => {
                Self::cascade_dependency_failures(queue, monitor, &finished_id);
            }
            _ => {}
        }
    }

    fn fail_task(&self, id: &TaskId, error: TaskError) {
        let Some(task) = self.monitor.get(id) else { return };
        if task.status.is_terminal() {
            return;
        }
        self.queue.remove(id);
        let failed = task.fail(error);
        self.monitor.update(failed);
        Self::cascade_dependency_failures(&self.queue, &self.monitor, id);
    }

    /// BFS over `dependents_of`, failing every non-terminal descendant
    /// with `DependencyUnsatisfied` (no retry, per spec.md section 7).
    fn cascade_dependency_failures(queue: &TaskQueue, monitor: &TaskMonitor, root: &TaskId) {
        let mut frontier = VecDeque::new();
        frontier.push_back(root.clone());
        while let Some(id) = frontier.pop_front() {
            for dependent_id in monitor.dependents_of(&id) {
                let Some(dependent) = monitor.get(&dependent_id) else { continue };
                if dependent.status.is_terminal() {
                    continue;
                }
                queue.remove(&dependent.id);
                let failed = dependent.fail(TaskError::new(TaskErrorKind::DependencyUnsatisfied, format!("dependency {id} did not complete")));
                monitor.update(failed);
                frontier.push_back(dependent_id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use midx_models::{FileId, TaskType};
    use midx_worker::{ExecutionContext, HandlerFailure, PipelineConfig, TaskHandler};
    use serde_json::Value;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn orchestrator(executor: Arc<TaskExecutor>) -> Arc<TaskOrchestrator> {
        Arc::new(TaskOrchestrator::new(
            Arc::new(TaskQueue::new()),
            Arc::new(TaskMonitor::new()),
            Arc::new(TaskGroupManager::new(PipelineConfig::default())),
            Arc::new(ResourceMonitor::new(midx_worker::ResourceConfig::default())),
            Arc::new(ConcurrencyController::new(midx_worker::ConcurrencyConfig {
                mode: midx_worker::ConcurrencyMode::Static,
                base_concurrent: 4,
                ..Default::default()
            })),
            executor,
            PriorityCalculator::new(midx_queue::PriorityConfig::default()),
            RetryConfig { max_attempts: 3, backoff_secs: 0 },
            Duration::from_millis(5),
        ))
    }

    struct Echo;

    #[async_trait]
    impl TaskHandler for Echo {
        async fn handle(&self, _payload: &Value, _ctx: &ExecutionContext) -> Result<Value, HandlerFailure> {
            Ok(Value::Null)
        }
    }

    struct CountingFails(Arc<AtomicUsize>);

    #[async_trait]
    impl TaskHandler for CountingFails {
        async fn handle(&self, _payload: &Value, _ctx: &ExecutionContext) -> Result<Value, HandlerFailure> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Err(HandlerFailure::new("always fails"))
        }
    }

    #[tokio::test]
    async fn dependency_unblocks_after_predecessor_completes() {
        let executor = Arc::new(TaskExecutor::new());
        executor.register(TaskType::PreprocessImage, Arc::new(Echo));
        executor.register(TaskType::EmbedImage, Arc::new(Echo));
        let orch = orchestrator(executor);

        let file_id = FileId::new();
        let preprocess = Task::new(TaskType::PreprocessImage, Value::Null).with_file_id(file_id.clone());
        let embed = Task::new(TaskType::EmbedImage, Value::Null)
            .with_file_id(file_id)
            .with_depends_on([preprocess.id.clone()]);
        let embed_id = embed.id.clone();
        orch.submit_tasks(vec![preprocess, embed], "/a/cat.jpg");

        assert_eq!(orch.monitor.get(&embed_id).unwrap().status, TaskStatus::WaitingDeps);

        for _ in 0..50 {
            orch.tick().await;
            if orch.monitor.get(&embed_id).unwrap().status == TaskStatus::Completed {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(orch.monitor.get(&embed_id).unwrap().status, TaskStatus::Completed);
    }

    #[tokio::test]
    async fn failed_preprocess_cascades_dependency_unsatisfied_to_embed() {
        let calls = Arc::new(AtomicUsize::new(0));
        let executor = Arc::new(TaskExecutor::new());
        executor.register(TaskType::PreprocessImage, Arc::new(CountingFails(calls.clone())));
        executor.register(TaskType::EmbedImage, Arc::new(Echo));
        let orch = orchestrator(executor);

        let file_id = FileId::new();
        let preprocess = Task::new(TaskType::PreprocessImage, Value::Null).with_file_id(file_id.clone()).with_max_retries(0);
        let embed = Task::new(TaskType::EmbedImage, Value::Null)
            .with_file_id(file_id)
            .with_depends_on([preprocess.id.clone()]);
        let embed_id = embed.id.clone();
        orch.submit_tasks(vec![preprocess, embed], "/a/cat.jpg");

        for _ in 0..50 {
            orch.tick().await;
            if orch.monitor.get(&embed_id).unwrap().status == TaskStatus::Failed {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        let embed = orch.monitor.get(&embed_id).unwrap();
        assert_eq!(embed.status, TaskStatus::Failed);
        assert_eq!(embed.error.unwrap().kind, TaskErrorKind::DependencyUnsatisfied);
    }

    #[tokio::test]
    async fn cancelling_a_waiting_task_removes_it_from_the_queue() {
        let executor = Arc::new(TaskExecutor::new());
        let orch = orchestrator(executor);
        let task = Task::new(TaskType::GenerateThumbnail, Value::Null);
        let id = task.id.clone();
        orch.submit_tasks(vec![task], "/a/cat.jpg");

        assert!(orch.cancel_task(&id));
        assert_eq!(orch.monitor.get(&id).unwrap().status, TaskStatus::Cancelled);
        assert!(!orch.cancel_task(&id), "already terminal, cancel is a no-op");
    }

    #[tokio::test]
    async fn set_priority_updates_the_queued_key() {
        let executor = Arc::new(TaskExecutor::new());
        let orch = orchestrator(executor);
        let task = Task::new(TaskType::GenerateThumbnail, Value::Null);
        let id = task.id.clone();
        orch.submit_tasks(vec![task], "/a/cat.jpg");

        assert!(orch.set_priority(&id, -999));
        assert_eq!(orch.monitor.get(&id).unwrap().priority, -999);
    }
}
