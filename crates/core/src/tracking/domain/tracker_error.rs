use thiserror::Error;

use crate::detection::domain::multi_scale_detector::DetectionError;
use crate::matching::domain::patch_matcher::MatchError;
use crate::shared::frame::FrameError;
use crate::video::domain::frame_source::FrameSourceError;

#[derive(Error, Debug)]
pub enum TrackerError {
    #[error("face detector has no model loaded")]
    InvalidDetector,
    #[error("detection failed: {0}")]
    Detection(#[from] DetectionError),
    #[error("template matching failed: {0}")]
    Matching(#[from] MatchError),
    #[error("frame conversion failed: {0}")]
    Frame(#[from] FrameError),
    #[error("frame source failed: {0}")]
    Source(#[from] FrameSourceError),
}
