//! Resource, concurrency, pipeline-lock and retry configuration.

/// A warn/pause threshold pair for one monitored signal.
#[derive(Debug, Clone, Copy)]
pub struct ResourceThresholds {
    pub warn: f64,
    pub pause: f64,
}

impl ResourceThresholds {
    fn default_pair() -> Self {
        Self { warn: 80.0, pause: 95.0 }
    }
}

#[derive(Debug, Clone)]
pub struct ResourceConfig {
    pub sample_interval_secs: u64,
    pub cpu: ResourceThresholds,
    pub memory: ResourceThresholds,
    pub gpu: ResourceThresholds,
    /// How many samples `ResourceMonitor` retains for `trend()`.
    pub history_capacity: usize,
}

impl Default for ResourceConfig {
    fn default() -> Self {
        Self {
            sample_interval_secs: 5,
            cpu: ResourceThresholds::default_pair(),
            memory: ResourceThresholds::default_pair(),
            gpu: ResourceThresholds::default_pair(),
            history_capacity: 60,
        }
    }
}

impl ResourceConfig {
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            sample_interval_secs: std::env::var("MIDX_RESOURCE_SAMPLE_INTERVAL_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(default.sample_interval_secs),
            cpu: default.cpu,
            memory: ResourceThresholds {
                warn: std::env::var("MIDX_RESOURCE_MEMORY_WARN")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(default.memory.warn),
                pause: std::env::var("MIDX_RESOURCE_MEMORY_PAUSE")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(default.memory.pause),
            },
            gpu: ResourceThresholds {
                warn: std::env::var("MIDX_RESOURCE_GPU_WARN")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(default.gpu.warn),
                pause: std::env::var("MIDX_RESOURCE_GPU_PAUSE")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(default.gpu.pause),
            },
            history_capacity: default.history_capacity,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConcurrencyMode {
    Static,
    Dynamic,
}

#[derive(Debug, Clone)]
pub struct ConcurrencyConfig {
    pub mode: ConcurrencyMode,
    pub base_concurrent: usize,
    pub min: usize,
    pub max: usize,
    pub adjust_interval_secs: u64,
    pub step: usize,
    pub target_cpu: f64,
    pub target_memory: f64,
    pub target_gpu: f64,
}

impl Default for ConcurrencyConfig {
    fn default() -> Self {
        Self {
            mode: ConcurrencyMode::Dynamic,
            base_concurrent: 4,
            min: 1,
            max: 8,
            adjust_interval_secs: 10,
            step: 1,
            target_cpu: 70.0,
            target_memory: 70.0,
            target_gpu: 80.0,
        }
    }
}

impl ConcurrencyConfig {
    pub fn from_env() -> Self {
        let default = Self::default();
        let mode = match std::env::var("MIDX_CONCURRENCY_MODE").ok().as_deref() {
            Some("static") => ConcurrencyMode::Static,
            Some("dynamic") => ConcurrencyMode::Dynamic,
            _ => default.mode,
        };
        Self {
            mode,
            base_concurrent: std::env::var("MIDX_CONCURRENCY_BASE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(default.base_concurrent),
            min: std::env::var("MIDX_CONCURRENCY_MIN")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(default.min),
            max: std::env::var("MIDX_CONCURRENCY_MAX")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(default.max),
            adjust_interval_secs: std::env::var("MIDX_CONCURRENCY_ADJUST_INTERVAL_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(default.adjust_interval_secs),
            step: std::env::var("MIDX_CONCURRENCY_STEP")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(default.step),
            target_cpu: default.target_cpu,
            target_memory: default.target_memory,
            target_gpu: default.target_gpu,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub lock_timeout_secs: i64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self { lock_timeout_secs: 300 }
    }
}

impl PipelineConfig {
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            lock_timeout_secs: std::env::var("MIDX_PIPELINE_LOCK_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(default.lock_timeout_secs),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub backoff_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self { max_attempts: 3, backoff_secs: 1 }
    }
}

impl RetryConfig {
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            max_attempts: std::env::var("MIDX_RETRY_MAX_ATTEMPTS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(default.max_attempts),
            backoff_secs: std::env::var("MIDX_RETRY_BACKOFF_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(default.backoff_secs),
        }
    }
}
