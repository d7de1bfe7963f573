//! Shared resource-pressure vocabulary used by `ResourceMonitor`,
//! `ConcurrencyController` and the core facade's `stats()`.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Three-valued back-pressure state. See `ResourceMonitor` for the
/// hysteresis rule governing transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum ResourceState {
    #[default]
    Normal,
    Warning,
    Pause,
}

impl ResourceState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceState::Normal => "normal",
            ResourceState::Warning => "warning",
            ResourceState::Pause => "pause",
        }
    }
}

impl std::fmt::Display for ResourceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single sample of system resource usage. Missing signals (e.g. no GPU
/// present) are represented as `None` and excluded from threshold checks.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ResourceUsage {
    pub cpu_percent: f64,
    pub memory_percent: f64,
    pub memory_available_bytes: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gpu_memory_percent: Option<f64>,
}

impl ResourceUsage {
    pub fn zero() -> Self {
        Self {
            cpu_percent: 0.0,
            memory_percent: 0.0,
            memory_available_bytes: 0,
            gpu_memory_percent: None,
        }
    }

    /// The worst (highest) signal value, used against a single threshold.
    pub fn max_signal(&self) -> f64 {
        self.cpu_percent
            .max(self.memory_percent)
            .max(self.gpu_memory_percent.unwrap_or(0.0))
    }
}

/// Direction of change derived from the monitor's sample history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    Increasing,
    Decreasing,
    Stable,
}
