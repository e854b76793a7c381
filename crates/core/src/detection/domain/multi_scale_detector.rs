use std::path::PathBuf;

use thiserror::Error;

use crate::shared::frame::Frame;
use crate::shared::geometry::{Rect, Size};

#[derive(Error, Debug)]
pub enum DetectionError {
    #[error("failed to load detector model {path}: {reason}")]
    ModelLoad { path: PathBuf, reason: String },
    #[error("inference failed: {0}")]
    Inference(String),
    #[error("unexpected model output: {0}")]
    UnexpectedOutput(String),
    #[error("no detector model loaded")]
    NotLoaded,
}

/// Domain interface for multi-scale face detection.
///
/// Returns candidate rectangles in `frame`-local coordinates whose width and
/// height both lie within `[min_size, max_size]`. Implementations must not
/// modify the frame. `&mut self` allows backends that keep inference state.
pub trait MultiScaleDetector: Send {
    fn detect(
        &mut self,
        frame: &Frame,
        min_size: Size,
        max_size: Size,
    ) -> Result<Vec<Rect>, DetectionError>;

    /// True when the detector has no usable model (e.g. loading failed).
    fn is_empty(&self) -> bool {
        false
    }
}

/// Keeps candidates whose size lies within `[min_size, max_size]`.
pub fn filter_by_size(candidates: Vec<Rect>, min_size: Size, max_size: Size) -> Vec<Rect> {
    candidates
        .into_iter()
        .filter(|r| {
            r.width >= min_size.width
                && r.height >= min_size.height
                && r.width <= max_size.width
                && r.height <= max_size.height
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::inside(Rect::new(0, 0, 50, 50), true)]
    #[case::at_min(Rect::new(0, 0, 20, 20), true)]
    #[case::at_max(Rect::new(0, 0, 80, 80), true)]
    #[case::too_narrow(Rect::new(0, 0, 19, 50), false)]
    #[case::too_tall(Rect::new(0, 0, 50, 81), false)]
    fn test_filter_by_size(#[case] r: Rect, #[case] kept: bool) {
        let out = filter_by_size(vec![r], Size::square(20), Size::square(80));
        assert_eq!(out.len() == 1, kept);
    }

    #[test]
    fn test_filter_by_size_keeps_order() {
        let faces = vec![
            Rect::new(0, 0, 30, 30),
            Rect::new(0, 0, 5, 5),
            Rect::new(10, 10, 40, 40),
        ];
        let out = filter_by_size(faces, Size::square(20), Size::square(80));
        assert_eq!(out, vec![Rect::new(0, 0, 30, 30), Rect::new(10, 10, 40, 40)]);
    }
}
