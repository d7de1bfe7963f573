//! TaskExecutor (C7): dispatch to registered type handlers, with retries.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use midx_models::{FileId, Task, TaskError, TaskErrorKind, TaskId, TaskType};
use serde_json::Value;
use tracing::{error, info, warn};

use crate::cancel::CancellationToken;
use crate::config::RetryConfig;

/// Context passed to a handler alongside its task's `payload`. Handlers
/// are expected to poll `is_cancelled` at safe points and unwind early.
pub struct ExecutionContext {
    pub task_id: TaskId,
    pub file_id: Option<FileId>,
    cancel: CancellationToken,
}

impl ExecutionContext {
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// A failure surfaced by a handler. Always retryable up to the task's
/// `max_retries` (spec.md's only retryable kind, `HandlerError`); a
/// handler that wants a non-retryable failure should not implement retry
/// logic of its own and instead rely on the executor exhausting the
/// retry budget, or set `max_retries = 0` on the task at creation.
#[derive(Debug, Clone)]
pub struct HandlerFailure {
    pub message: String,
}

impl HandlerFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

/// A pure-ish function of `(payload, context) -> result`, registered per
/// `TaskType`. May fail; the executor owns retry policy, not the handler.
#[async_trait]
pub trait TaskHandler: Send + Sync {
    async fn handle(&self, payload: &Value, ctx: &ExecutionContext) -> Result<Value, HandlerFailure>;
}

#[derive(Default)]
pub struct TaskExecutor {
    handlers: Mutex<HashMap<TaskType, Arc<dyn TaskHandler>>>,
}

impl TaskExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the handler for `task_type`. Safe to call
    /// after `execute` has already started running other tasks — the
    /// registry lock is held only long enough to clone the handler `Arc`
    /// out, never across a handler's own execution.
    pub fn register(&self, task_type: TaskType, handler: Arc<dyn TaskHandler>) {
        self.handlers.lock().expect("executor registry mutex poisoned").insert(task_type, handler);
    }

    /// Run `task` to a terminal status, handling retries internally: a
    /// `HandlerError` backs off for `retry.backoff_seconds` and
    /// re-attempts until `max_retries` is exhausted. Isolated by
    /// construction — a handler panic would only take down the task's own
    /// `tokio::spawn`, never the caller.
    pub async fn execute(&self, task: Task, retry: &RetryConfig, cancel: CancellationToken) -> Task {
        let mut task = task.start();
        info!(task_id = %task.id, task_type = %task.task_type, "task started");

        let handler = self.handlers.lock().expect("executor registry mutex poisoned").get(&task.task_type).cloned();
        let Some(handler) = handler else {
            warn!(task_id = %task.id, task_type = %task.task_type, "no handler registered");
            return task.fail(TaskError::new(TaskErrorKind::HandlerError, format!("no handler registered for {}", task.task_type)));
        };

        loop {
            let ctx = ExecutionContext { task_id: task.id.clone(), file_id: task.file_id.clone(), cancel: cancel.clone() };
            match handler.handle(&task.payload, &ctx).await {
                Ok(result) => {
                    info!(task_id = %task.id, "task completed");
                    return task.complete(result);
                }
                Err(failure) => {
                    if cancel.is_cancelled() {
                        info!(task_id = %task.id, "task cancelled cooperatively, not retrying");
                        return task.cancel();
                    }
                    if task.can_retry() {
                        warn!(task_id = %task.id, retry_count = task.retry_count, error = %failure.message, "task failed, retrying");
                        task = task.record_retry();
                        tokio::time::sleep(std::time::Duration::from_secs(retry.backoff_secs)).await;
                        task.set_status(midx_models::TaskStatus::Running);
                        continue;
                    }
                    error!(task_id = %task.id, error = %failure.message, "task failed, retries exhausted");
                    return task.fail(TaskError::new(TaskErrorKind::HandlerError, failure.message));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct FlakyHandler {
        failures_remaining: AtomicU32,
    }

    #[async_trait]
    impl TaskHandler for FlakyHandler {
        async fn handle(&self, _payload: &Value, _ctx: &ExecutionContext) -> Result<Value, HandlerFailure> {
            if self.failures_remaining.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| if n > 0 { Some(n - 1) } else { None }).is_ok() {
                return Err(HandlerFailure::new("simulated failure"));
            }
            Ok(serde_json::json!({"ok": true}))
        }
    }

    struct AlwaysFails;

    #[async_trait]
    impl TaskHandler for AlwaysFails {
        async fn handle(&self, _payload: &Value, _ctx: &ExecutionContext) -> Result<Value, HandlerFailure> {
            Err(HandlerFailure::new("nope"))
        }
    }

    #[tokio::test]
    async fn scenario_6_retry_then_succeed() {
        let mut executor = TaskExecutor::new();
        executor.register(TaskType::EmbedImage, Arc::new(FlakyHandler { failures_remaining: AtomicU32::new(2) }));

        let task = Task::new(TaskType::EmbedImage, Value::Null).with_max_retries(3);
        let retry = RetryConfig { max_attempts: 3, backoff_secs: 1 };
        let result = executor.execute(task, &retry, CancellationToken::new()).await;

        assert_eq!(result.status, midx_models::TaskStatus::Completed);
        assert_eq!(result.retry_count, 2);
        let started = result.started_at.unwrap();
        let completed = result.completed_at.unwrap();
        assert!(completed - started >= chrono::Duration::seconds(2));
    }

    #[tokio::test]
    async fn retries_exhausted_transitions_to_failed() {
        let mut executor = TaskExecutor::new();
        executor.register(TaskType::EmbedImage, Arc::new(AlwaysFails));

        let task = Task::new(TaskType::EmbedImage, Value::Null).with_max_retries(1);
        let retry = RetryConfig { max_attempts: 1, backoff_secs: 0 };
        let result = executor.execute(task, &retry, CancellationToken::new()).await;

        assert_eq!(result.status, midx_models::TaskStatus::Failed);
        assert_eq!(result.retry_count, 1);
        assert_eq!(result.error.unwrap().kind, TaskErrorKind::HandlerError);
    }

    #[tokio::test]
    async fn cooperative_cancellation_short_circuits_retry() {
        let mut executor = TaskExecutor::new();
        executor.register(TaskType::EmbedImage, Arc::new(AlwaysFails));

        let task = Task::new(TaskType::EmbedImage, Value::Null).with_max_retries(5);
        let retry = RetryConfig { max_attempts: 5, backoff_secs: 0 };
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = executor.execute(task, &retry, cancel).await;

        assert_eq!(result.status, midx_models::TaskStatus::Cancelled);
        assert_eq!(result.retry_count, 0);
    }

    #[tokio::test]
    async fn missing_handler_fails_immediately() {
        let executor = TaskExecutor::new();
        let task = Task::new(TaskType::ScanFile, Value::Null);
        let retry = RetryConfig::default();
        let result = executor.execute(task, &retry, CancellationToken::new()).await;
        assert_eq!(result.status, midx_models::TaskStatus::Failed);
        assert_eq!(result.retry_count, 0);
    }
}
