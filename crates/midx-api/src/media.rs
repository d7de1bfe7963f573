//! File-type detection and video-duration probing for the facade's
//! `submit_file`. Both are extension/metadata-level concerns the core
//! performs itself (type detection) or delegates to an external
//! collaborator (duration), never a decoding library — no model or codec
//! dependency is pulled in here (see SPEC_FULL.md section 13).
//!
//! Extension sets are ported from the original `file_monitor.py`'s
//! `file_extensions` config (image/video/audio), the only place the
//! source enumerates supported modalities by suffix.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use midx_models::FileType;

use crate::error::{ApiError, ApiResult};

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "gif", "webp"];
const VIDEO_EXTENSIONS: &[&str] = &["mp4", "avi", "mov", "mkv", "webm", "wmv", "flv"];
const AUDIO_EXTENSIONS: &[&str] = &["mp3", "wav", "ogg", "flac", "aac", "wma"];

/// Detect a file's modality from its extension. Returns `InputError` (no
/// task is created, per spec.md section 7) for an unrecognized suffix.
pub fn detect_file_type(path: &Path) -> ApiResult<FileType> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .ok_or_else(|| ApiError::InputError(format!("no file extension: {}", path.display())))?;

    if IMAGE_EXTENSIONS.contains(&extension.as_str()) {
        Ok(FileType::Image)
    } else if VIDEO_EXTENSIONS.contains(&extension.as_str()) {
        Ok(FileType::Video)
    } else if AUDIO_EXTENSIONS.contains(&extension.as_str()) {
        Ok(FileType::Audio)
    } else {
        Err(ApiError::InputError(format!("unrecognized file type: .{extension}")))
    }
}

/// External collaborator supplying a video's duration, standing in for the
/// original's `ffprobe` shell-out (`video_segment_manager.py:
/// _get_video_duration`). Not specified by spec.md beyond "media duration
/// D is given"; kept as a trait so the core never depends on a concrete
/// media-probing library.
#[async_trait]
pub trait DurationProbe: Send + Sync {
    async fn probe_duration_secs(&self, path: &Path) -> ApiResult<f64>;
}

/// A probe returning a fixed duration regardless of path, for tests and
/// for wiring the core without a real prober.
pub struct FixedDurationProbe {
    pub duration_secs: f64,
}

impl FixedDurationProbe {
    pub fn new(duration_secs: f64) -> Arc<Self> {
        Arc::new(Self { duration_secs })
    }
}

#[async_trait]
impl DurationProbe for FixedDurationProbe {
    async fn probe_duration_secs(&self, _path: &Path) -> ApiResult<f64> {
        Ok(self.duration_secs)
    }
}
