//! Builds the fixed per-file task DAG (`preprocess -> (optional) segment ->
//! embed`, spec.md section 2) that `submit_file` pushes through the
//! priority calculator and into the queue.
//!
//! Segmentation for video is planned eagerly, inline, rather than as its
//! own persisted `segment_video` task: spec.md section 4's concrete
//! end-to-end scenarios (2 and 3) show a two-task DAG (`preprocess_video`
//! followed directly by one or more `embed_video` tasks) with no
//! `segment_video` task id ever appearing, so this is the literal DAG shape
//! those scenarios require. `TaskType::SegmentVideo` remains a first-class
//! type in the closed set (for a caller who wants to register a handler
//! and drive segmentation as its own task), it is simply not the shape the
//! facade itself emits. See DESIGN.md.

use midx_models::{FileId, FileType, Task, TaskType, VideoSegment};
use serde_json::json;

/// One file's freshly-built task DAG, in creation order (dependencies
/// always precede their dependents).
pub struct FilePipeline {
    pub tasks: Vec<Task>,
}

impl FilePipeline {
    /// `preprocess_image -> embed_image`, plus a non-critical thumbnail.
    pub fn for_image(file_id: &FileId, file_path: &str) -> Self {
        let preprocess = pipeline_task(TaskType::PreprocessImage, file_id, json!({ "file_path": file_path }));
        let embed = pipeline_task(TaskType::EmbedImage, file_id, json!({ "file_path": file_path }))
            .with_depends_on([preprocess.id.clone()]);
        let thumbnail = ancillary_task(TaskType::GenerateThumbnail, file_id, json!({ "file_path": file_path }))
            .with_depends_on([preprocess.id.clone()]);
        Self { tasks: vec![preprocess, embed, thumbnail] }
    }

    /// `preprocess_audio -> embed_audio`.
    pub fn for_audio(file_id: &FileId, file_path: &str) -> Self {
        let preprocess = pipeline_task(TaskType::PreprocessAudio, file_id, json!({ "file_path": file_path }));
        let embed = pipeline_task(TaskType::EmbedAudio, file_id, json!({ "file_path": file_path }))
            .with_depends_on([preprocess.id.clone()]);
        Self { tasks: vec![preprocess, embed] }
    }

    /// `preprocess_video -> embed_video` (one per planned segment), plus a
    /// non-critical preview. `segments` is the planner's already-computed
    /// plan (see `VideoSegmentPlanner::plan`); a short video yields exactly
    /// one `is_full_video` segment and so exactly one `embed_video` task,
    /// matching scenario 2; a long video yields one per planned range,
    /// matching scenario 3.
    pub fn for_video(file_id: &FileId, file_path: &str, segments: &[VideoSegment]) -> Self {
        let preprocess = pipeline_task(TaskType::PreprocessVideo, file_id, json!({ "file_path": file_path }));

        let mut tasks = Vec::with_capacity(segments.len() + 2);
        for segment in segments {
            let embed = pipeline_task(
                TaskType::EmbedVideo,
                file_id,
                json!({
                    "file_path": file_path,
                    "segment_id": segment.segment_id,
                    "start_time": segment.start_time,
                    "end_time": segment.end_time,
                    "is_full_video": segment.is_full_video,
                }),
            )
            .with_depends_on([preprocess.id.clone()]);
            tasks.push(embed);
        }

        let preview = ancillary_task(TaskType::GeneratePreview, file_id, json!({ "file_path": file_path }))
            .with_depends_on([preprocess.id.clone()]);

        tasks.insert(0, preprocess);
        tasks.push(preview);
        Self { tasks }
    }

    pub fn for_file_type(file_id: &FileId, file_path: &str, file_type: FileType, segments: &[VideoSegment]) -> Self {
        match file_type {
            FileType::Image => Self::for_image(file_id, file_path),
            FileType::Audio => Self::for_audio(file_id, file_path),
            FileType::Video => Self::for_video(file_id, file_path, segments),
        }
    }
}

fn pipeline_task(task_type: TaskType, file_id: &FileId, payload: serde_json::Value) -> Task {
    debug_assert!(task_type.is_pipeline_task());
    Task::new(task_type, payload).with_file_id(file_id.clone())
}

fn ancillary_task(task_type: TaskType, file_id: &FileId, payload: serde_json::Value) -> Task {
    debug_assert!(!task_type.is_pipeline_task());
    Task::new(task_type, payload).with_file_id(file_id.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use midx_models::TaskStatus;

    #[test]
    fn scenario_2_short_video_yields_two_task_chain() {
        let file_id = FileId::new();
        let segments = vec![VideoSegment::full_video(4.0)];
        let pipeline = FilePipeline::for_video(&file_id, "/v/clip.mp4", &segments);

        let embeds: Vec<_> = pipeline.tasks.iter().filter(|t| t.task_type == TaskType::EmbedVideo).collect();
        assert_eq!(embeds.len(), 1);
        assert_eq!(embeds[0].payload["segment_id"], "full");

        let preprocess = pipeline.tasks.iter().find(|t| t.task_type == TaskType::PreprocessVideo).unwrap();
        assert!(embeds[0].depends_on.contains(&preprocess.id));
        assert_eq!(preprocess.status, TaskStatus::Pending);
    }

    #[test]
    fn scenario_3_long_video_yields_ten_embed_tasks_all_depending_on_preprocess() {
        let file_id = FileId::new();
        let segments: Vec<VideoSegment> = (0..10)
            .map(|i| VideoSegment::range(i, i as f64 * 5.0, ((i + 1) * 5).min(47) as f64))
            .collect();
        let pipeline = FilePipeline::for_video(&file_id, "/v/long.mp4", &segments);

        let preprocess = pipeline.tasks.iter().find(|t| t.task_type == TaskType::PreprocessVideo).unwrap();
        let embeds: Vec<_> = pipeline.tasks.iter().filter(|t| t.task_type == TaskType::EmbedVideo).collect();
        assert_eq!(embeds.len(), 10);
        assert!(embeds.iter().all(|e| e.depends_on == [preprocess.id.clone()].into_iter().collect()));
    }

    #[test]
    fn image_pipeline_includes_a_non_critical_thumbnail() {
        let file_id = FileId::new();
        let pipeline = FilePipeline::for_image(&file_id, "/a/cat.jpg");
        let thumbnail = pipeline.tasks.iter().find(|t| t.task_type == TaskType::GenerateThumbnail).unwrap();
        assert!(!thumbnail.is_pipeline_task());
        assert!(thumbnail.task_type.is_non_critical());
    }

    #[test]
    fn every_task_in_the_dag_shares_the_same_file_id() {
        let file_id = FileId::new();
        let pipeline = FilePipeline::for_audio(&file_id, "/a/song.flac");
        assert!(pipeline.tasks.iter().all(|t| t.file_id.as_ref() == Some(&file_id)));
    }
}
