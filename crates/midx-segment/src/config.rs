//! Segment planner configuration.

#[derive(Debug, Clone)]
pub struct SegmentConfig {
    /// Videos at or below this duration get a single full-video segment.
    pub short_video_threshold_secs: f64,
    pub min_duration_secs: f64,
    pub max_duration_secs: f64,
    /// Scene boundaries shorter than this are merged with a neighbour.
    pub min_scene_duration_secs: f64,
    pub scene_detect_enabled: bool,
    pub scene_detect_threshold: f64,
    pub timestamp_precision_secs: f64,
}

impl Default for SegmentConfig {
    fn default() -> Self {
        Self {
            short_video_threshold_secs: 6.0,
            min_duration_secs: 1.0,
            max_duration_secs: 5.0,
            min_scene_duration_secs: 1.0,
            scene_detect_enabled: false,
            scene_detect_threshold: 0.3,
            timestamp_precision_secs: 0.1,
        }
    }
}

impl SegmentConfig {
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            short_video_threshold_secs: std::env::var("MIDX_VIDEO_SHORT_THRESHOLD_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(default.short_video_threshold_secs),
            min_duration_secs: std::env::var("MIDX_VIDEO_SEGMENT_MIN_DURATION_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(default.min_duration_secs),
            max_duration_secs: std::env::var("MIDX_VIDEO_SEGMENT_MAX_DURATION_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(default.max_duration_secs),
            min_scene_duration_secs: std::env::var("MIDX_VIDEO_MIN_SCENE_DURATION_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(default.min_scene_duration_secs),
            scene_detect_enabled: std::env::var("MIDX_VIDEO_SCENE_DETECT_ENABLED")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(default.scene_detect_enabled),
            scene_detect_threshold: std::env::var("MIDX_VIDEO_SCENE_DETECT_THRESHOLD")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(default.scene_detect_threshold),
            timestamp_precision_secs: std::env::var("MIDX_VIDEO_TIMESTAMP_PRECISION_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(default.timestamp_precision_secs),
        }
    }
}
