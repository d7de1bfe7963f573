//! Segment planner error types.

use thiserror::Error;

pub type SegmentResult<T> = Result<T, SegmentError>;

#[derive(Debug, Error)]
pub enum SegmentError {
    #[error("scene detection failed: {0}")]
    SceneDetection(String),

    #[error("invalid media duration: {0}")]
    InvalidDuration(f64),
}
