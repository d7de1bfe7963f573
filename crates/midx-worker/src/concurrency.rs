//! ConcurrencyController (C6): the target worker-pool size.

use std::sync::atomic::{AtomicUsize, Ordering};

use midx_models::ResourceUsage;
use tracing::debug;

use crate::config::{ConcurrencyConfig, ConcurrencyMode};

/// Source of truth for how many tasks may run concurrently. Never blocks
/// execution itself; the orchestrator reads `target()` at each scheduling
/// decision.
pub struct ConcurrencyController {
    config: ConcurrencyConfig,
    target: AtomicUsize,
}

impl ConcurrencyController {
    pub fn new(config: ConcurrencyConfig) -> Self {
        let initial = match config.mode {
            ConcurrencyMode::Static => config.base_concurrent,
            ConcurrencyMode::Dynamic => config.base_concurrent,
        };
        Self { target: AtomicUsize::new(initial), config }
    }

    pub fn target(&self) -> usize {
        self.target.load(Ordering::Relaxed)
    }

    pub fn adjust_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.config.adjust_interval_secs)
    }

    /// Re-derive the target from the latest sample. A no-op in `static`
    /// mode.
    pub fn adjust(&self, usage: &ResourceUsage) {
        if self.config.mode == ConcurrencyMode::Static {
            return;
        }
        let current = self.target.load(Ordering::Relaxed);
        let exceeds_target = usage.cpu_percent > self.config.target_cpu
            || usage.memory_percent > self.config.target_memory
            || usage.gpu_memory_percent.map_or(false, |g| g > self.config.target_gpu);

        let next = if exceeds_target {
            current.saturating_sub(self.config.step).max(self.config.min)
        } else {
            let headroom = usage.cpu_percent <= 0.8 * self.config.target_cpu
                && usage.memory_percent <= 0.8 * self.config.target_memory
                && usage.gpu_memory_percent.map_or(true, |g| g <= 0.8 * self.config.target_gpu);
            if headroom {
                (current + self.config.step).min(self.config.max)
            } else {
                current
            }
        };

        if next != current {
            debug!(previous = current, next, "concurrency target adjusted");
            self.target.store(next, Ordering::Relaxed);
        }
    }

    /// Background adjustment loop driven by `monitor`'s latest sample.
    pub async fn run(
        &self,
        monitor: &crate::resource_monitor::ResourceMonitor,
        mut shutdown: tokio::sync::watch::Receiver<bool>,
    ) {
        let mut ticker = tokio::time::interval(self.adjust_interval());
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let usage = monitor.sample();
                    self.adjust(&usage);
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        return;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn usage(cpu: f64, memory: f64) -> ResourceUsage {
        ResourceUsage { cpu_percent: cpu, memory_percent: memory, memory_available_bytes: 0, gpu_memory_percent: None }
    }

    #[test]
    fn static_mode_never_adjusts() {
        let controller = ConcurrencyController::new(ConcurrencyConfig { mode: ConcurrencyMode::Static, ..ConcurrencyConfig::default() });
        controller.adjust(&usage(99.0, 99.0));
        assert_eq!(controller.target(), ConcurrencyConfig::default().base_concurrent);
    }

    #[test]
    fn dynamic_mode_shrinks_target_under_pressure() {
        let config = ConcurrencyConfig { mode: ConcurrencyMode::Dynamic, base_concurrent: 4, min: 1, max: 8, step: 1, ..ConcurrencyConfig::default() };
        let controller = ConcurrencyController::new(config);
        controller.adjust(&usage(90.0, 10.0));
        assert_eq!(controller.target(), 3);
    }

    #[test]
    fn dynamic_mode_grows_target_with_headroom() {
        let config = ConcurrencyConfig { mode: ConcurrencyMode::Dynamic, base_concurrent: 4, min: 1, max: 8, step: 1, ..ConcurrencyConfig::default() };
        let controller = ConcurrencyController::new(config);
        controller.adjust(&usage(5.0, 5.0));
        assert_eq!(controller.target(), 5);
    }

    #[test]
    fn target_never_drops_below_min_or_above_max() {
        let config = ConcurrencyConfig { mode: ConcurrencyMode::Dynamic, base_concurrent: 1, min: 1, max: 2, step: 5, ..ConcurrencyConfig::default() };
        let controller = ConcurrencyController::new(config);
        controller.adjust(&usage(99.0, 99.0));
        assert_eq!(controller.target(), 1);
        controller.adjust(&usage(0.0, 0.0));
        controller.adjust(&usage(0.0, 0.0));
        assert_eq!(controller.target(), 2);
    }
}
