//! VideoSegmentPlanner (C12) for the midx orchestration core.

mod config;
mod error;
mod planner;
mod scene_detector;

pub use config::SegmentConfig;
pub use error::{SegmentError, SegmentResult};
pub use planner::VideoSegmentPlanner;
pub use scene_detector::{FixedIntervalSceneDetector, NoSceneDetector, SceneDetector};
