//! Errors surfaced by the core facade.

use thiserror::Error;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    /// `submit_file`'s `InputError` kind: the path does not exist, is
    /// unreadable, or fails type detection. No task is created.
    #[error("input error: {0}")]
    InputError(String),

    #[error("dedup error: {0}")]
    Dedup(#[from] midx_metadata::DedupError),

    #[error("segment planning error: {0}")]
    Segment(#[from] midx_segment::SegmentError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
