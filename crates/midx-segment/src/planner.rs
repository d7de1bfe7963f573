//! VideoSegmentPlanner (C12): a time-range plan for long videos.

use std::path::Path;
use std::sync::Arc;

use midx_models::{SceneInfo, VideoSegment};
use tracing::debug;

use crate::config::SegmentConfig;
use crate::error::{SegmentError, SegmentResult};
use crate::scene_detector::SceneDetector;

pub struct VideoSegmentPlanner {
    config: SegmentConfig,
    scene_detector: Arc<dyn SceneDetector>,
}

impl VideoSegmentPlanner {
    pub fn new(config: SegmentConfig, scene_detector: Arc<dyn SceneDetector>) -> Self {
        Self { config, scene_detector }
    }

    /// Produce the segment plan for a video of `duration_secs`.
    pub async fn plan(&self, path: &Path, duration_secs: f64) -> SegmentResult<Vec<VideoSegment>> {
        if duration_secs <= 0.0 {
            return Err(SegmentError::InvalidDuration(duration_secs));
        }

        if duration_secs <= self.config.short_video_threshold_secs {
            return Ok(vec![VideoSegment::full_video(round_to(duration_secs, self.config.timestamp_precision_secs))]);
        }

        let boundaries = if self.config.scene_detect_enabled {
            self.scene_based_boundaries(path, duration_secs).await?
        } else {
            self.time_based_boundaries(duration_secs)
        };

        Ok(self.boundaries_to_segments(boundaries))
    }

    async fn scene_based_boundaries(&self, path: &Path, duration_secs: f64) -> SegmentResult<Vec<f64>> {
        let interior = self
            .scene_detector
            .detect_boundaries(path, duration_secs, self.config.scene_detect_threshold)
            .await?;

        let mut boundaries = vec![0.0];
        boundaries.extend(interior.into_iter().filter(|b| *b > 0.0 && *b < duration_secs));
        boundaries.push(duration_secs);
        boundaries.dedup_by(|a, b| (*a - *b).abs() < f64::EPSILON);

        let merged = merge_short_scenes(boundaries, self.config.min_scene_duration_secs);
        Ok(split_long_segments(merged, self.config.max_duration_secs))
    }

    /// Contiguous fixed-length segments; a short tail folds into the
    /// previous segment instead of becoming its own.
    fn time_based_boundaries(&self, duration_secs: f64) -> Vec<f64> {
        let mut boundaries = vec![0.0];
        let mut cursor = 0.0;
        while cursor < duration_secs {
            cursor = (cursor + self.config.max_duration_secs).min(duration_secs);
            boundaries.push(cursor);
        }

        if boundaries.len() >= 3 {
            let tail_len = boundaries[boundaries.len() - 1] - boundaries[boundaries.len() - 2];
            if tail_len < self.config.min_duration_secs {
                boundaries.remove(boundaries.len() - 2);
            }
        }
        boundaries
    }

    fn boundaries_to_segments(&self, boundaries: Vec<f64>) -> Vec<VideoSegment> {
        let precision = self.config.timestamp_precision_secs;
        boundaries
            .windows(2)
            .enumerate()
            .map(|(index, pair)| {
                let start = round_to(pair[0], precision);
                let end = round_to(pair[1], precision);
                let mut segment = VideoSegment::range(index, start, end);
                if self.config.scene_detect_enabled {
                    segment = segment.with_scene_info(SceneInfo {
                        scene_index: index as u32,
                        boundary_confidence: 1.0,
                    });
                }
                segment
            })
            .collect()
    }
}

fn round_to(value: f64, precision: f64) -> f64 {
    if precision <= 0.0 {
        return value;
    }
    (value / precision).round() * precision
}

/// Merge boundaries whose resulting segment falls below `min_scene_duration`
/// into the following segment (the final boundary, the media duration, is
/// always kept).
fn merge_short_scenes(boundaries: Vec<f64>, min_scene_duration: f64) -> Vec<f64> {
    if boundaries.len() <= 2 {
        return boundaries;
    }
    let mut result = vec![boundaries[0]];
    for (i, candidate) in boundaries.iter().enumerate().skip(1) {
        let is_last = i == boundaries.len() - 1;
        let seg_len = candidate - result.last().copied().unwrap_or(0.0);
        if seg_len < min_scene_duration && !is_last {
            debug!(candidate, seg_len, "merging short scene boundary");
            continue;
        }
        result.push(*candidate);
    }
    result
}

/// Split any segment whose length exceeds `max_duration` into contiguous
/// `max_duration`-length chunks (the final chunk may be shorter).
fn split_long_segments(boundaries: Vec<f64>, max_duration: f64) -> Vec<f64> {
    let mut result = vec![boundaries[0]];
    for pair in boundaries.windows(2) {
        let (start, end) = (pair[0], pair[1]);
        let mut cursor = start;
        while end - cursor > max_duration {
            cursor += max_duration;
            result.push(cursor);
        }
        result.push(end);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene_detector::{FixedIntervalSceneDetector, NoSceneDetector};
    use std::path::PathBuf;

    fn planner(config: SegmentConfig) -> VideoSegmentPlanner {
        VideoSegmentPlanner::new(config, Arc::new(NoSceneDetector))
    }

    fn dummy_path() -> PathBuf {
        PathBuf::from("/tmp/clip.mp4")
    }

    #[tokio::test]
    async fn short_video_boundary_yields_one_full_segment() {
        let config = SegmentConfig { short_video_threshold_secs: 6.0, ..SegmentConfig::default() };
        let segments = planner(config).plan(&dummy_path(), 6.0).await.unwrap();
        assert_eq!(segments.len(), 1);
        assert!(segments[0].is_full_video);
        assert_eq!(segments[0].end_time, 6.0);
    }

    #[tokio::test]
    async fn scenario_2_short_video_clip_gets_full_video_segment() {
        let config = SegmentConfig::default();
        let segments = planner(config).plan(&dummy_path(), 4.0).await.unwrap();
        assert_eq!(segments.len(), 1);
        assert!(segments[0].is_full_video);
    }

    #[tokio::test]
    async fn scenario_3_long_video_time_based_produces_ten_segments() {
        let config = SegmentConfig {
            short_video_threshold_secs: 6.0,
            max_duration_secs: 5.0,
            min_duration_secs: 1.0,
            scene_detect_enabled: false,
            timestamp_precision_secs: 1.0,
            ..SegmentConfig::default()
        };
        let segments = planner(config).plan(&dummy_path(), 47.0).await.unwrap();
        assert_eq!(segments.len(), 10);

        let expected: Vec<(f64, f64)> = (0..9).map(|i| (i as f64 * 5.0, (i + 1) as f64 * 5.0)).chain([(45.0, 47.0)]).collect();
        for (segment, (start, end)) in segments.iter().zip(expected) {
            assert_eq!(segment.start_time, start);
            assert_eq!(segment.end_time, end);
        }
    }

    #[tokio::test]
    async fn segments_cover_0_to_duration_contiguously() {
        let config = SegmentConfig {
            short_video_threshold_secs: 6.0,
            max_duration_secs: 5.0,
            min_duration_secs: 1.0,
            timestamp_precision_secs: 1.0,
            ..SegmentConfig::default()
        };
        let segments = planner(config).plan(&dummy_path(), 23.0).await.unwrap();
        assert_eq!(segments.first().unwrap().start_time, 0.0);
        assert_eq!(segments.last().unwrap().end_time, 23.0);
        for pair in segments.windows(2) {
            assert_eq!(pair[0].end_time, pair[1].start_time);
        }
    }

    #[tokio::test]
    async fn short_tail_folds_into_previous_segment() {
        let config = SegmentConfig {
            short_video_threshold_secs: 6.0,
            max_duration_secs: 5.0,
            min_duration_secs: 2.0,
            timestamp_precision_secs: 1.0,
            ..SegmentConfig::default()
        };
        // 21s: 4 segments of 5s (0-20) plus a 1s tail, folded into the
        // last segment since 1 < min_duration(2).
        let segments = planner(config).plan(&dummy_path(), 21.0).await.unwrap();
        assert_eq!(segments.len(), 4);
        assert_eq!(segments.last().unwrap().end_time, 21.0);
    }

    #[tokio::test]
    async fn scene_based_splits_overlong_scenes_by_time() {
        let config = SegmentConfig {
            short_video_threshold_secs: 6.0,
            max_duration_secs: 5.0,
            min_scene_duration_secs: 0.5,
            scene_detect_enabled: true,
            timestamp_precision_secs: 1.0,
            ..SegmentConfig::default()
        };
        let detector = Arc::new(FixedIntervalSceneDetector { interval_secs: 12.0 });
        let planner = VideoSegmentPlanner::new(config, detector);
        let segments = planner.plan(&dummy_path(), 24.0).await.unwrap();
        for segment in &segments {
            assert!(segment.duration() <= 5.0 + f64::EPSILON);
        }
        assert_eq!(segments.first().unwrap().start_time, 0.0);
        assert_eq!(segments.last().unwrap().end_time, 24.0);
    }

    #[tokio::test]
    async fn scene_based_merges_short_scenes_with_neighbour() {
        let config = SegmentConfig {
            short_video_threshold_secs: 6.0,
            max_duration_secs: 50.0,
            min_scene_duration_secs: 3.0,
            scene_detect_enabled: true,
            timestamp_precision_secs: 1.0,
            ..SegmentConfig::default()
        };
        // interior boundaries at 10 and 10.5: the 10-10.5 scene is below
        // min_scene_duration(3) and must merge forward.
        struct TwoCloseBoundaries;
        #[async_trait::async_trait]
        impl crate::scene_detector::SceneDetector for TwoCloseBoundaries {
            async fn detect_boundaries(&self, _: &Path, _: f64, _: f64) -> SegmentResult<Vec<f64>> {
                Ok(vec![10.0, 10.5])
            }
        }
        let planner = VideoSegmentPlanner::new(config, Arc::new(TwoCloseBoundaries));
        let segments = planner.plan(&dummy_path(), 20.0).await.unwrap();
        for segment in &segments {
            assert!(segment.duration() >= 3.0 - f64::EPSILON || segment.end_time == 20.0);
        }
    }
}
