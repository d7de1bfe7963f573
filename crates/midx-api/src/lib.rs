//! The midx task orchestration core: a single embedded-library facade
//! (`MidxCore`) over the priority queue, pipeline locks, resource-aware
//! concurrency, content-hash dedup, bounded cache, and video segment
//! planning that the rest of the workspace implements. No HTTP surface
//! lives here — an adapter embeds this crate and exposes whatever
//! transport it needs (see SPEC_FULL.md section 13).

mod config;
mod dag;
mod error;
mod facade;
mod logging;
mod media;
mod monitor;
mod orchestrator;

pub use config::ApiConfig;
pub use dag::FilePipeline;
pub use error::{ApiError, ApiResult};
pub use facade::{CachedArtifact, MidxCore};
pub use logging::TaskLogger;
pub use media::{detect_file_type, DurationProbe, FixedDurationProbe};
pub use monitor::{TaskEvent, TaskFilter, TaskMonitor, TaskStats};
pub use orchestrator::TaskOrchestrator;

pub use midx_embedding::{DeterministicEmbeddingService, EmbeddingService, EmbeddingVector, InMemoryVectorStore, Modality, SearchHit, VectorStore};
pub use midx_metadata::{ContentHashDeduplicator, FileMetadataStore, InMemoryFileMetadataStore};
pub use midx_models::{
    CacheEntry, DedupOutcome, EvictionPolicy, FileId, FileRecord, FileType, ProcessingStatus, ResourceState, ResourceUsage, SceneInfo, Task, TaskError,
    TaskErrorKind, TaskId, TaskStatus, TaskType, VideoSegment,
};
pub use midx_queue::{GroupContinuityLookup, PriorityCalculator, PriorityConfig, TaskQueue};
pub use midx_segment::{FixedIntervalSceneDetector, NoSceneDetector, SceneDetector, SegmentConfig, VideoSegmentPlanner};
pub use midx_storage::{CacheConfig, CacheStats, CacheStrategyManager};
pub use midx_worker::{
    CancellationToken, ConcurrencyConfig, ConcurrencyController, ConcurrencyMode, ExecutionContext, HandlerFailure, PipelineConfig, ResourceConfig,
    ResourceEvent, ResourceMonitor, ResourceSignal, RetryConfig, TaskExecutor, TaskGroupManager, TaskHandler,
};
