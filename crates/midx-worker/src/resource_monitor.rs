//! ResourceMonitor (C5): sampled system-pressure signal with hysteresis.

use std::collections::VecDeque;
use std::sync::Mutex;

use midx_models::{ResourceState, ResourceUsage, Trend};
use sysinfo::System;
use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::config::ResourceConfig;

/// Which monitored signal(s) drove a state transition, carried in the
/// emitted event rather than in the state itself (the state is a single
/// three-valued aggregate; see spec's `ResourceState`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceSignal {
    Cpu,
    Memory,
    Gpu,
}

#[derive(Debug, Clone)]
pub struct ResourceEvent {
    pub previous: ResourceState,
    pub current: ResourceState,
    pub usage: ResourceUsage,
    pub cause: Vec<ResourceSignal>,
}

struct MonitorState {
    system: System,
    state: ResourceState,
    history: VecDeque<ResourceUsage>,
}

/// Samples CPU/memory (and, when available, GPU) pressure on an interval
/// and derives a hysteretic `{normal, warning, pause}` state. GPU sampling
/// has no backing signal in this workspace (no bundled GPU telemetry
/// crate) so `gpu_memory_percent` is always `None`; the threshold checks
/// skip it exactly as they would for a real machine with no GPU.
pub struct ResourceMonitor {
    config: ResourceConfig,
    inner: Mutex<MonitorState>,
    events: broadcast::Sender<ResourceEvent>,
}

impl ResourceMonitor {
    pub fn new(config: ResourceConfig) -> Self {
        let (events, _) = broadcast::channel(32);
        Self {
            inner: Mutex::new(MonitorState {
                system: System::new(),
                state: ResourceState::Normal,
                history: VecDeque::with_capacity(config.history_capacity),
            }),
            config,
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ResourceEvent> {
        self.events.subscribe()
    }

    /// The current state, without sampling. Cheap; safe to call on every
    /// scheduling decision.
    pub fn state(&self) -> ResourceState {
        self.inner.lock().expect("resource monitor mutex poisoned").state
    }

    /// Take one sample, recompute the state, and emit an event on change.
    pub fn sample(&self) -> ResourceUsage {
        let mut inner = self.inner.lock().expect("resource monitor mutex poisoned");
        inner.system.refresh_cpu_usage();
        inner.system.refresh_memory();

        let cpu_percent = inner.system.global_cpu_usage() as f64;
        let total = inner.system.total_memory();
        let available = inner.system.available_memory();
        let memory_percent = if total == 0 { 0.0 } else { (1.0 - available as f64 / total as f64) * 100.0 };

        let usage = ResourceUsage { cpu_percent, memory_percent, memory_available_bytes: available, gpu_memory_percent: None };

        let previous = inner.state;
        let (next, cause) = next_state(previous, &usage, &self.config);
        inner.state = next;

        if inner.history.len() == self.config.history_capacity {
            inner.history.pop_front();
        }
        inner.history.push_back(usage);

        if next != previous {
            if next == ResourceState::Pause {
                warn!(?cause, cpu = usage.cpu_percent, memory = usage.memory_percent, "resource state -> pause");
            } else {
                info!(?previous, ?next, "resource state transition");
            }
            let _ = self.events.send(ResourceEvent { previous, current: next, usage, cause });
        }

        usage
    }

    /// Direction of change for one signal over the retained history.
    /// Compares the mean of the first and second half of the ring buffer;
    /// needs at least 4 samples, otherwise `Stable`.
    pub fn trend(&self, signal: ResourceSignal) -> Trend {
        let inner = self.inner.lock().expect("resource monitor mutex poisoned");
        if inner.history.len() < 4 {
            return Trend::Stable;
        }
        let values: Vec<f64> = inner
            .history
            .iter()
            .map(|u| match signal {
                ResourceSignal::Cpu => u.cpu_percent,
                ResourceSignal::Memory => u.memory_percent,
                ResourceSignal::Gpu => u.gpu_memory_percent.unwrap_or(0.0),
            })
            .collect();
        let mid = values.len() / 2;
        let first_half: f64 = values[..mid].iter().sum::<f64>() / mid as f64;
        let second_half: f64 = values[mid..].iter().sum::<f64>() / (values.len() - mid) as f64;
        let delta = second_half - first_half;
        if delta > 2.0 {
            Trend::Increasing
        } else if delta < -2.0 {
            Trend::Decreasing
        } else {
            Trend::Stable
        }
    }

    pub fn sample_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.config.sample_interval_secs)
    }

    /// Background sampling loop. Runs until `shutdown` fires.
    pub async fn run(&self, mut shutdown: tokio::sync::watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.sample_interval());
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.sample();
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

fn next_state(previous: ResourceState, usage: &ResourceUsage, config: &ResourceConfig) -> (ResourceState, Vec<ResourceSignal>) {
    let mut pause_cause = Vec::new();
    if usage.cpu_percent >= config.cpu.pause {
        pause_cause.push(ResourceSignal::Cpu);
    }
    if usage.memory_percent >= config.memory.pause {
        pause_cause.push(ResourceSignal::Memory);
    }
    if usage.gpu_memory_percent.is_some_and(|g| g >= config.gpu.pause) {
        pause_cause.push(ResourceSignal::Gpu);
    }
    if !pause_cause.is_empty() {
        return (ResourceState::Pause, pause_cause);
    }

    let mut warn_cause = Vec::new();
    if usage.cpu_percent >= config.cpu.warn {
        warn_cause.push(ResourceSignal::Cpu);
    }
    if usage.memory_percent >= config.memory.warn {
        warn_cause.push(ResourceSignal::Memory);
    }
    if usage.gpu_memory_percent.is_some_and(|g| g >= config.gpu.warn) {
        warn_cause.push(ResourceSignal::Gpu);
    }

    if previous == ResourceState::Normal {
        return if warn_cause.is_empty() { (ResourceState::Normal, vec![]) } else { (ResourceState::Warning, warn_cause) };
    }

    // Already warning/pause: only drop back to normal once every signal
    // is at or below (warn - 5%); otherwise stay at least at `warning`.
    let recovered = usage.cpu_percent <= config.cpu.warn - 5.0
        && usage.memory_percent <= config.memory.warn - 5.0
        && usage.gpu_memory_percent.map_or(true, |g| g <= config.gpu.warn - 5.0);

    if recovered {
        (ResourceState::Normal, vec![])
    } else if !warn_cause.is_empty() {
        (ResourceState::Warning, warn_cause)
    } else {
        (previous, vec![])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn usage(cpu: f64, memory: f64) -> ResourceUsage {
        ResourceUsage { cpu_percent: cpu, memory_percent: memory, memory_available_bytes: 0, gpu_memory_percent: None }
    }

    #[test]
    fn normal_stays_normal_below_warn() {
        let config = ResourceConfig::default();
        let (state, _) = next_state(ResourceState::Normal, &usage(10.0, 10.0), &config);
        assert_eq!(state, ResourceState::Normal);
    }

    #[test]
    fn crossing_warn_threshold_transitions_to_warning() {
        let config = ResourceConfig::default();
        let (state, cause) = next_state(ResourceState::Normal, &usage(85.0, 10.0), &config);
        assert_eq!(state, ResourceState::Warning);
        assert_eq!(cause, vec![ResourceSignal::Cpu]);
    }

    #[test]
    fn crossing_pause_threshold_transitions_to_pause_from_any_state() {
        let config = ResourceConfig::default();
        let (state, _) = next_state(ResourceState::Normal, &usage(10.0, 96.0), &config);
        assert_eq!(state, ResourceState::Pause);
    }

    #[test]
    fn hysteresis_keeps_warning_until_signal_drops_5_points_below_warn() {
        let config = ResourceConfig::default();
        // Memory warn=80; sitting at 78% is below warn but not below
        // (warn - 5) = 75, so it must stay in warning.
        let (state, _) = next_state(ResourceState::Warning, &usage(10.0, 78.0), &config);
        assert_eq!(state, ResourceState::Warning);

        let (state, _) = next_state(ResourceState::Warning, &usage(10.0, 70.0), &config);
        assert_eq!(state, ResourceState::Normal);
    }

    #[test]
    fn pause_drops_to_warning_once_below_pause_but_still_above_recovery() {
        let config = ResourceConfig::default();
        let (state, _) = next_state(ResourceState::Pause, &usage(10.0, 85.0), &config);
        assert_eq!(state, ResourceState::Warning);
    }

    #[test]
    fn trend_needs_at_least_four_samples() {
        let monitor = ResourceMonitor::new(ResourceConfig::default());
        assert_eq!(monitor.trend(ResourceSignal::Cpu), Trend::Stable);
    }
}
