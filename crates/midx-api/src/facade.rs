//! `MidxCore`: the embedded-library facade from spec.md section 6, wiring
//! C1-C12 into the single entry point a caller (an HTTP adapter, a CLI, a
//! batch importer) embeds. Grounded in the teacher's `AppState::new`
//! aggregation pattern (`vclip-api/src/state.rs`) — here there is no axum
//! server to hand it to, since the HTTP surface is explicitly out of
//! scope (see SPEC_FULL.md section 13).

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use midx_embedding::EmbeddingVector;
use midx_metadata::{ContentHashDeduplicator, FileMetadataStore};
use midx_models::{FileId, FileType, Task, TaskId, TaskType};
use midx_queue::{PriorityCalculator, TaskQueue};
use midx_segment::{SceneDetector, VideoSegmentPlanner};
use midx_storage::CacheStrategyManager;
use midx_worker::{ConcurrencyController, ResourceMonitor, TaskExecutor, TaskGroupManager, TaskHandler};
use tokio::sync::{broadcast, watch};

use crate::config::ApiConfig;
use crate::dag::FilePipeline;
use crate::error::ApiResult;
use crate::media::{detect_file_type, DurationProbe};
use crate::monitor::{TaskEvent, TaskFilter, TaskMonitor, TaskStats};
use crate::orchestrator::TaskOrchestrator;

/// A cached preprocessing artifact: opaque bytes plus whatever embedding
/// vector a handler chose to keep alongside them. The cache itself never
/// interprets either (`CacheStrategyManager<V>` is value-agnostic).
#[derive(Debug, Clone)]
pub struct CachedArtifact {
    pub bytes: Arc<[u8]>,
    pub embedding: Option<EmbeddingVector>,
}

pub struct MidxCore {
    monitor: Arc<TaskMonitor>,
    groups: Arc<TaskGroupManager>,
    resources: Arc<ResourceMonitor>,
    concurrency: Arc<ConcurrencyController>,
    executor: Arc<TaskExecutor>,
    orchestrator: Arc<TaskOrchestrator>,
    dedup: Arc<ContentHashDeduplicator>,
    segment_planner: Arc<VideoSegmentPlanner>,
    duration_probe: Arc<dyn DurationProbe>,
    cache: Arc<CacheStrategyManager<CachedArtifact>>,
    shutdown_tx: watch::Sender<bool>,
    lock_sweep_interval: Duration,
}

impl MidxCore {
    pub fn new(
        config: ApiConfig,
        metadata_store: Arc<dyn FileMetadataStore>,
        scene_detector: Arc<dyn SceneDetector>,
        duration_probe: Arc<dyn DurationProbe>,
    ) -> Self {
        let queue = Arc::new(TaskQueue::new());
        let monitor = Arc::new(TaskMonitor::new());
        let groups = Arc::new(TaskGroupManager::new(config.pipeline.clone()));
        let resources = Arc::new(ResourceMonitor::new(config.resource.clone()));
        let concurrency = Arc::new(ConcurrencyController::new(config.concurrency.clone()));
        let executor = Arc::new(TaskExecutor::new());
        let calculator = PriorityCalculator::new(config.priority);
        let lock_sweep_interval = Duration::from_secs(config.pipeline.lock_timeout_secs.max(1) as u64);

        let orchestrator = Arc::new(TaskOrchestrator::new(
            queue,
            monitor.clone(),
            groups.clone(),
            resources.clone(),
            concurrency.clone(),
            executor.clone(),
            calculator,
            config.retry,
            Duration::from_millis(config.scheduler_poll_ms),
        ));

        let dedup = Arc::new(ContentHashDeduplicator::new(config.dedup, metadata_store));
        let segment_planner = Arc::new(VideoSegmentPlanner::new(config.segment, scene_detector));
        let cache = Arc::new(CacheStrategyManager::new(config.cache));
        let (shutdown_tx, _) = watch::channel(false);

        Self {
            monitor,
            groups,
            resources,
            concurrency,
            executor,
            orchestrator,
            dedup,
            segment_planner,
            duration_probe,
            cache,
            shutdown_tx,
            lock_sweep_interval,
        }
    }

    /// Register the handler a `TaskType` dispatches to. Safe to call
    /// before or after `start`.
    pub fn register_handler(&self, task_type: TaskType, handler: Arc<dyn TaskHandler>) {
        self.executor.register(task_type, handler);
    }

    pub fn cache(&self) -> &CacheStrategyManager<CachedArtifact> {
        &self.cache
    }

    /// Spawn every background loop: resource sampling, the dynamic
    /// concurrency adjustment, the main scheduling tick, and the stale
    /// pipeline-lock sweep. All four exit together when `shutdown` fires.
    pub fn start(self: &Arc<Self>) {
        let resources = self.resources.clone();
        let shutdown = self.shutdown_tx.subscribe();
        tokio::spawn(async move { resources.run(shutdown).await });

        let concurrency = self.concurrency.clone();
        let resources = self.resources.clone();
        let shutdown = self.shutdown_tx.subscribe();
        tokio::spawn(async move { concurrency.run(&resources, shutdown).await });

        let orchestrator = self.orchestrator.clone();
        let shutdown = self.shutdown_tx.subscribe();
        tokio::spawn(orchestrator.run(shutdown));

        let orchestrator = self.orchestrator.clone();
        let interval = self.lock_sweep_interval;
        let shutdown = self.shutdown_tx.subscribe();
        tokio::spawn(orchestrator.run_lock_sweep(interval, shutdown));
    }

    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    /// `submit_file` (spec.md section 6): detect type, deduplicate by
    /// content hash, plan video segments if needed, build and submit the
    /// file's task DAG. Returns the file's id whether or not new tasks
    /// were created (a duplicate still resolves to the existing file).
    pub async fn submit_file(&self, path: &Path) -> ApiResult<FileId> {
        let file_type = detect_file_type(path)?;
        let (should_process, file_id, _outcome) = self.dedup.process_new_file(path, file_type).await?;
        if !should_process {
            return Ok(file_id);
        }

        let file_path = path.to_string_lossy().to_string();
        let segments = if file_type == FileType::Video {
            let duration = self.duration_probe.probe_duration_secs(path).await?;
            self.segment_planner.plan(path, duration).await?
        } else {
            Vec::new()
        };

        let pipeline = FilePipeline::for_file_type(&file_id, &file_path, file_type, &segments);
        self.orchestrator.submit_tasks(pipeline.tasks, &file_path);
        Ok(file_id)
    }

    pub fn get_task(&self, id: &TaskId) -> Option<Task> {
        self.monitor.get(id)
    }

    pub fn list_tasks(&self, filter: &TaskFilter) -> Vec<Task> {
        self.monitor.list(filter)
    }

    pub fn cancel_task(&self, id: &TaskId) -> bool {
        self.orchestrator.cancel_task(id)
    }

    pub fn set_priority(&self, id: &TaskId, priority: i64) -> bool {
        self.orchestrator.set_priority(id, priority)
    }

    pub fn stats(&self) -> TaskStats {
        self.monitor.stats()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<TaskEvent> {
        self.monitor.subscribe()
    }

    pub fn resource_state(&self) -> midx_models::ResourceState {
        self.resources.state()
    }

    pub fn is_file_locked(&self, file_id: &FileId) -> bool {
        self.groups.is_locked(file_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use midx_metadata::InMemoryFileMetadataStore;
    use midx_segment::NoSceneDetector;
    use midx_worker::{ExecutionContext, HandlerFailure};
    use serde_json::Value;
    use std::io::Write;

    struct Echo;

    #[async_trait]
    impl TaskHandler for Echo {
        async fn handle(&self, _payload: &Value, _ctx: &ExecutionContext) -> Result<Value, HandlerFailure> {
            Ok(Value::Null)
        }
    }

    fn core() -> Arc<MidxCore> {
        let mut config = ApiConfig::default();
        config.scheduler_poll_ms = 5;
        let core = MidxCore::new(
            config,
            Arc::new(InMemoryFileMetadataStore::new()),
            Arc::new(NoSceneDetector),
            crate::media::FixedDurationProbe::new(3.0),
        );
        core.register_handler(TaskType::PreprocessImage, Arc::new(Echo));
        core.register_handler(TaskType::EmbedImage, Arc::new(Echo));
        core.register_handler(TaskType::GenerateThumbnail, Arc::new(Echo));
        Arc::new(core)
    }

    #[tokio::test]
    async fn submitting_an_image_runs_its_whole_pipeline_to_completion() {
        let core = core();
        core.start();

        let mut tmp = tempfile::Builder::new().suffix(".jpg").tempfile().unwrap();
        tmp.write_all(b"jpeg-bytes").unwrap();
        let file_id = core.submit_file(tmp.path()).await.unwrap();

        let mut completed = false;
        for _ in 0..200 {
            let stats = core.stats();
            if stats.completed == 3 && stats.queue_size == 0 && stats.running == 0 {
                completed = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(completed, "pipeline did not settle: {:?}", core.stats());

        let tasks = core.list_tasks(&TaskFilter { file_id: Some(file_id), ..Default::default() });
        assert_eq!(tasks.len(), 3);
        assert!(tasks.iter().all(|t| t.status == midx_models::TaskStatus::Completed));

        core.shutdown();
    }

    #[tokio::test]
    async fn resubmitting_the_same_bytes_does_not_create_new_tasks() {
        let core = core();
        core.start();

        let mut tmp = tempfile::Builder::new().suffix(".jpg").tempfile().unwrap();
        tmp.write_all(b"identical-bytes").unwrap();
        let first = core.submit_file(tmp.path()).await.unwrap();

        for _ in 0..200 {
            if core.stats().completed >= 3 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        let mut tmp2 = tempfile::Builder::new().suffix(".jpg").tempfile().unwrap();
        tmp2.write_all(b"identical-bytes").unwrap();
        let second = core.submit_file(tmp2.path()).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(core.list_tasks(&TaskFilter::default()).len(), 3);

        core.shutdown();
    }
}
