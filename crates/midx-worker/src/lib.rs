//! Concurrency and execution layer for the midx task orchestration core:
//! the pipeline lock (C4), resource back-pressure (C5), the dynamic
//! worker-pool target (C6), and handler dispatch with retries (C7).

mod cancel;
mod concurrency;
mod config;
mod error;
mod executor;
mod group_manager;
mod resource_monitor;

pub use cancel::CancellationToken;
pub use concurrency::ConcurrencyController;
pub use config::{ConcurrencyConfig, ConcurrencyMode, PipelineConfig, ResourceConfig, ResourceThresholds, RetryConfig};
pub use error::{WorkerError, WorkerResult};
pub use executor::{ExecutionContext, HandlerFailure, TaskExecutor, TaskHandler};
pub use group_manager::TaskGroupManager;
pub use resource_monitor::{ResourceEvent, ResourceMonitor, ResourceSignal};
