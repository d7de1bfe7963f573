//! Priority calculator configuration.

/// Tunables for `PriorityCalculator`'s wait-compensation and
/// continuity-bonus terms.
#[derive(Debug, Clone, Copy)]
pub struct PriorityConfig {
    /// Seconds of wait time per compensation step.
    pub wait_interval_secs: i64,
    /// Priority-key reduction applied per elapsed wait step.
    pub wait_step_value: i64,
    /// Ceiling on total wait compensation.
    pub max_wait: i64,
    /// Priority-key reduction for a pipeline task whose group has already
    /// completed at least one pipeline predecessor.
    pub continuity_bonus: i64,
}

impl Default for PriorityConfig {
    fn default() -> Self {
        Self {
            wait_interval_secs: 60,
            wait_step_value: 1,
            max_wait: 999,
            continuity_bonus: -20,
        }
    }
}

impl PriorityConfig {
    /// Create config from environment variables, falling back to spec
    /// defaults on anything unset or unparseable.
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            wait_interval_secs: std::env::var("MIDX_PRIORITY_WAIT_INTERVAL_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(default.wait_interval_secs),
            wait_step_value: std::env::var("MIDX_PRIORITY_WAIT_STEP")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(default.wait_step_value),
            max_wait: std::env::var("MIDX_PRIORITY_MAX_WAIT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(default.max_wait),
            continuity_bonus: std::env::var("MIDX_PRIORITY_CONTINUITY_BONUS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(default.continuity_bonus),
        }
    }
}
