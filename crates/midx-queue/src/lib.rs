//! Priority calculator and priority queue for the midx task orchestration core.

mod calculator;
mod config;
mod error;
mod queue;

pub use calculator::{GroupContinuityLookup, NoGroups, PriorityBreakdown, PriorityCalculator};
pub use config::PriorityConfig;
pub use error::{QueueError, QueueResult};
pub use queue::TaskQueue;
