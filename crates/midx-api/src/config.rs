//! Core configuration: one struct aggregating every concern's config,
//! mirroring the teacher's `ApiConfig::from_env()` idiom.

use midx_metadata::DedupConfig;
use midx_queue::PriorityConfig;
use midx_segment::SegmentConfig;
use midx_storage::CacheConfig;
use midx_worker::{ConcurrencyConfig, PipelineConfig, ResourceConfig, RetryConfig};

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub priority: PriorityConfig,
    pub resource: ResourceConfig,
    pub concurrency: ConcurrencyConfig,
    pub pipeline: PipelineConfig,
    pub dedup: DedupConfig,
    pub cache: CacheConfig,
    pub segment: SegmentConfig,
    pub retry: RetryConfig,
    /// Ceiling on the main loop's idle sleeps (spec.md 5: "limited to
    /// short timed waits, <= 100 ms").
    pub scheduler_poll_ms: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            priority: PriorityConfig::default(),
            resource: ResourceConfig::default(),
            concurrency: ConcurrencyConfig::default(),
            pipeline: PipelineConfig::default(),
            dedup: DedupConfig::default(),
            cache: CacheConfig::default(),
            segment: SegmentConfig::default(),
            retry: RetryConfig::default(),
            scheduler_poll_ms: 50,
        }
    }
}

impl ApiConfig {
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            priority: PriorityConfig::from_env(),
            resource: ResourceConfig::from_env(),
            concurrency: ConcurrencyConfig::from_env(),
            pipeline: PipelineConfig::from_env(),
            dedup: DedupConfig::from_env(),
            cache: CacheConfig::from_env(),
            segment: SegmentConfig::from_env(),
            retry: RetryConfig::from_env(),
            scheduler_poll_ms: std::env::var("MIDX_SCHEDULER_POLL_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(default.scheduler_poll_ms),
        }
    }
}
