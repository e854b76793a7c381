use std::path::PathBuf;

use thiserror::Error;

use crate::shared::frame::Frame;

#[derive(Error, Debug)]
pub enum FrameSourceError {
    #[error("failed to open {path}: {reason}")]
    Open { path: PathBuf, reason: String },
    #[error("no video stream found in {0}")]
    NoVideoStream(PathBuf),
    #[error("failed to decode frame: {0}")]
    Decode(String),
    #[error("no images found in {0}")]
    NoImages(PathBuf),
    #[error(transparent)]
    Image(#[from] image::ImageError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Produces frames in presentation order.
///
/// Implementations own the underlying handle (decoder, directory listing)
/// and number frames from zero. `Ok(None)` means the source is exhausted.
pub trait FrameSource: Send {
    fn next_frame(&mut self) -> Result<Option<Frame>, FrameSourceError>;
}
