//! VideoSegment: a planned time-range for per-segment embedding.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Scene-detection metadata attached to a scene-based segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SceneInfo {
    pub scene_index: u32,
    pub boundary_confidence: f64,
}

/// One planned time-range within a video, produced by `VideoSegmentPlanner`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct VideoSegment {
    pub segment_id: String,
    pub start_time: f64,
    pub end_time: f64,
    pub is_full_video: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scene_info: Option<SceneInfo>,
}

impl VideoSegment {
    pub fn full_video(end_time: f64) -> Self {
        Self {
            segment_id: "full".to_string(),
            start_time: 0.0,
            end_time,
            is_full_video: true,
            scene_info: None,
        }
    }

    pub fn range(index: usize, start_time: f64, end_time: f64) -> Self {
        Self {
            segment_id: format!("seg-{index}"),
            start_time,
            end_time,
            is_full_video: false,
            scene_info: None,
        }
    }

    pub fn with_scene_info(mut self, scene_info: SceneInfo) -> Self {
        self.scene_info = Some(scene_info);
        self
    }

    pub fn duration(&self) -> f64 {
        self.end_time - self.start_time
    }
}
