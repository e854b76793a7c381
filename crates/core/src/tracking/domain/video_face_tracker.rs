use crate::detection::domain::multi_scale_detector::MultiScaleDetector;
use crate::matching::infrastructure::template_matcher::TemplateMatcher;
use crate::shared::frame::Frame;
use crate::shared::geometry::Point;
use crate::video::domain::frame_source::FrameSource;

use super::face_tracker::FaceTracker;
use super::tracker_error::TrackerError;

/// A [`FaceTracker`] bound to the frame source it pulls from.
pub struct VideoFaceTracker {
    source: Box<dyn FrameSource>,
    tracker: FaceTracker,
}

impl VideoFaceTracker {
    /// Tracks with `detector` and the default template matcher.
    pub fn new(detector: Box<dyn MultiScaleDetector>, source: Box<dyn FrameSource>) -> Self {
        let tracker = FaceTracker::new(detector, Box::new(TemplateMatcher::default()));
        Self::with_tracker(tracker, source)
    }

    pub fn with_tracker(tracker: FaceTracker, source: Box<dyn FrameSource>) -> Self {
        Self { source, tracker }
    }

    /// Reads the next frame and advances tracking on it.
    ///
    /// Returns the frame together with the face center in its coordinates,
    /// or `None` once the source is exhausted.
    pub fn next_frame_and_detect(&mut self) -> Result<Option<(Frame, Point)>, TrackerError> {
        if !self.tracker.has_valid_detector() {
            return Err(TrackerError::InvalidDetector);
        }
        let Some(frame) = self.source.next_frame()? else {
            return Ok(None);
        };
        let position = self.tracker.process_frame(&frame)?;
        Ok(Some((frame, position)))
    }

    pub fn set_frame_source(&mut self, source: Box<dyn FrameSource>) {
        self.source = source;
    }

    pub fn set_detector(&mut self, detector: Box<dyn MultiScaleDetector>) {
        self.tracker.set_detector(detector);
    }

    pub fn tracker(&self) -> &FaceTracker {
        &self.tracker
    }

    pub fn tracker_mut(&mut self) -> &mut FaceTracker {
        &mut self.tracker
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    use crate::detection::domain::multi_scale_detector::DetectionError;
    use crate::shared::geometry::{Rect, Size};
    use crate::tracking::domain::tracking_state::TrackingStep;
    use crate::video::domain::frame_source::FrameSourceError;

    struct ScriptedDetector {
        faces: VecDeque<Vec<Rect>>,
        empty: bool,
    }

    impl ScriptedDetector {
        fn boxed(faces: Vec<Vec<Rect>>) -> Box<Self> {
            Box::new(Self {
                faces: faces.into(),
                empty: false,
            })
        }
    }

    impl MultiScaleDetector for ScriptedDetector {
        fn detect(&mut self, _: &Frame, _: Size, _: Size) -> Result<Vec<Rect>, DetectionError> {
            Ok(self.faces.pop_front().unwrap_or_default())
        }

        fn is_empty(&self) -> bool {
            self.empty
        }
    }

    struct CountingSource {
        remaining: usize,
        produced: usize,
    }

    impl CountingSource {
        fn boxed(frames: usize) -> Box<Self> {
            Box::new(Self {
                remaining: frames,
                produced: 0,
            })
        }
    }

    impl FrameSource for CountingSource {
        fn next_frame(&mut self) -> Result<Option<Frame>, FrameSourceError> {
            if self.remaining == 0 {
                return Ok(None);
            }
            self.remaining -= 1;
            let frame = Frame::new(vec![0u8; 320 * 240 * 3], 320, 240, 3, self.produced);
            self.produced += 1;
            Ok(Some(frame))
        }
    }

    struct FailingSource;

    impl FrameSource for FailingSource {
        fn next_frame(&mut self) -> Result<Option<Frame>, FrameSourceError> {
            Err(FrameSourceError::Decode("corrupt packet".into()))
        }
    }

    #[test]
    fn test_returns_frame_and_face_center() {
        let mut vft = VideoFaceTracker::new(
            ScriptedDetector::boxed(vec![vec![Rect::new(100, 60, 80, 80)]]),
            CountingSource::boxed(2),
        );

        let (frame, position) = vft.next_frame_and_detect().unwrap().unwrap();

        assert_eq!(frame.index(), 0);
        assert_eq!(position, Point::new(140, 100));
        assert!(vft.tracker().is_face_found());
    }

    #[test]
    fn test_exhausted_source_returns_none() {
        let mut vft = VideoFaceTracker::new(ScriptedDetector::boxed(vec![]), CountingSource::boxed(1));

        assert!(vft.next_frame_and_detect().unwrap().is_some());
        assert!(vft.next_frame_and_detect().unwrap().is_none());
    }

    #[test]
    fn test_source_error_propagates() {
        let mut vft = VideoFaceTracker::new(ScriptedDetector::boxed(vec![]), Box::new(FailingSource));
        assert!(matches!(
            vft.next_frame_and_detect(),
            Err(TrackerError::Source(_))
        ));
    }

    #[test]
    fn test_invalid_detector_is_reported_before_reading() {
        let detector = Box::new(ScriptedDetector {
            faces: VecDeque::new(),
            empty: true,
        });
        let mut vft = VideoFaceTracker::new(detector, CountingSource::boxed(1));

        assert!(matches!(
            vft.next_frame_and_detect(),
            Err(TrackerError::InvalidDetector)
        ));

        vft.set_detector(ScriptedDetector::boxed(vec![]));
        assert!(vft.next_frame_and_detect().unwrap().is_some());
    }

    #[test]
    fn test_set_frame_source_keeps_tracking_state() {
        let mut vft = VideoFaceTracker::new(
            ScriptedDetector::boxed(vec![vec![Rect::new(100, 60, 80, 80)], vec![Rect::new(10, 10, 80, 80)]]),
            CountingSource::boxed(1),
        );
        vft.next_frame_and_detect().unwrap();

        vft.set_frame_source(CountingSource::boxed(1));
        let (frame, _) = vft.next_frame_and_detect().unwrap().unwrap();

        assert_eq!(frame.index(), 0);
        assert_eq!(vft.tracker().last_step(), TrackingStep::RoiDetection);
    }
}
