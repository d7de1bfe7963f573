//! The external scene-detection collaborator the planner consults for
//! scene-based segmentation. No detection algorithm is specified here —
//! spec.md treats it as an external signal.

use std::path::Path;

use async_trait::async_trait;

use crate::error::SegmentResult;

/// Detects candidate scene-boundary timestamps within a video. Returned
/// boundaries are interior points only (excluding `0` and the media
/// duration, which the planner always adds itself).
#[async_trait]
pub trait SceneDetector: Send + Sync {
    async fn detect_boundaries(&self, path: &Path, duration_secs: f64, threshold: f64) -> SegmentResult<Vec<f64>>;
}

/// A detector that finds no interior boundaries, collapsing scene-based
/// planning to a single span covering the whole video (still subject to
/// the planner's max-duration split pass). Used when no real detector is
/// wired, and in tests.
pub struct NoSceneDetector;

#[async_trait]
impl SceneDetector for NoSceneDetector {
    async fn detect_boundaries(&self, _path: &Path, _duration_secs: f64, _threshold: f64) -> SegmentResult<Vec<f64>> {
        Ok(Vec::new())
    }
}

/// A detector standing in for a real scene-cut signal, for tests and
/// demos: reports boundaries at a fixed interval.
pub struct FixedIntervalSceneDetector {
    pub interval_secs: f64,
}

#[async_trait]
impl SceneDetector for FixedIntervalSceneDetector {
    async fn detect_boundaries(&self, _path: &Path, duration_secs: f64, _threshold: f64) -> SegmentResult<Vec<f64>> {
        let mut boundaries = Vec::new();
        let mut t = self.interval_secs;
        while t < duration_secs {
            boundaries.push(t);
            t += self.interval_secs;
        }
        Ok(boundaries)
    }
}
