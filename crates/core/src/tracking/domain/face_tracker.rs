use std::time::Duration;

use crate::detection::domain::multi_scale_detector::MultiScaleDetector;
use crate::matching::domain::patch_matcher::PatchMatcher;
use crate::shared::frame::Frame;
use crate::shared::geometry::{
    biggest_face, center_of_rect, double_rect_size, extract_template, Point, Rect,
};

use super::fallback_timer::{Clock, FallbackTimer};
use super::scale_manager::ScaleManager;
use super::tracker_config::TrackerConfig;
use super::tracker_error::TrackerError;
use super::tracking_state::{TrackingState, TrackingStep};

/// Single-face tracker that alternates between full-frame detection,
/// ROI-restricted detection and short-lived template matching.
///
/// Each call to [`FaceTracker::process_frame`] downscales the frame to the
/// working width and runs exactly one strategy:
///
/// - no face: search the whole frame for faces between 1/5 and 2/3 of the
///   frame height and keep the largest;
/// - tracking: search the ROI (the tracked face doubled around its center)
///   for faces within ±20% of the tracked size;
/// - fallback: after an ROI miss, locate the saved template inside the ROI
///   until the ROI detector hits again or the fallback outlives its maximum
///   duration, at which point the face is dropped.
///
/// The tracked face, ROI, template and position always change together and
/// are stored in working-frame coordinates. Public accessors convert back to
/// the original frame.
pub struct FaceTracker {
    detector: Box<dyn MultiScaleDetector>,
    matcher: Box<dyn PatchMatcher>,
    config: TrackerConfig,
    scale: ScaleManager,
    timer: FallbackTimer,
    state: TrackingState,
    last_step: TrackingStep,
    tracked_face: Rect,
    face_roi: Rect,
    face_template: Frame,
    face_position: Point,
}

impl FaceTracker {
    pub fn new(detector: Box<dyn MultiScaleDetector>, matcher: Box<dyn PatchMatcher>) -> Self {
        Self::with_config(detector, matcher, TrackerConfig::default())
    }

    pub fn with_config(
        detector: Box<dyn MultiScaleDetector>,
        matcher: Box<dyn PatchMatcher>,
        config: TrackerConfig,
    ) -> Self {
        Self {
            detector,
            matcher,
            scale: ScaleManager::new(config.resized_width),
            config,
            timer: FallbackTimer::default(),
            state: TrackingState::NoFace,
            last_step: TrackingStep::Idle,
            tracked_face: Rect::default(),
            face_roi: Rect::default(),
            face_template: Frame::empty(3),
            face_position: Point::default(),
        }
    }

    /// Replaces the clock that times the fallback.
    pub fn with_clock(mut self, clock: Box<dyn Clock>) -> Self {
        self.timer = FallbackTimer::new(clock);
        self
    }

    /// Advances tracking by one frame and returns the face center in
    /// `frame` coordinates (the origin when no face is held).
    pub fn process_frame(&mut self, frame: &Frame) -> Result<Point, TrackerError> {
        if self.detector.is_empty() {
            return Err(TrackerError::InvalidDetector);
        }

        let working = self.scale.downscale(frame)?;
        self.last_step = match self.state {
            TrackingState::NoFace => self.detect_all_sizes(&working)?,
            TrackingState::Tracking {
                fallback_active: false,
            } => self.detect_around_roi(&working)?,
            TrackingState::Tracking {
                fallback_active: true,
            } => self.track_with_fallback(&working)?,
        };
        log::trace!("frame {}: {:?}", frame.index(), self.last_step);

        Ok(self.face_position())
    }

    fn detect_all_sizes(&mut self, frame: &Frame) -> Result<TrackingStep, TrackerError> {
        let (min_size, max_size) = self.config.full_frame_bounds(frame.height());
        let faces = self.detector.detect(frame, min_size, max_size)?;
        if faces.is_empty() {
            return Ok(TrackingStep::FullFrameDetection { found: false });
        }

        self.set_tracked_face(frame, biggest_face(&faces));
        self.timer.stop();
        self.state = TrackingState::Tracking {
            fallback_active: false,
        };
        log::info!("Face acquired at {:?}", self.face());
        Ok(TrackingStep::FullFrameDetection { found: true })
    }

    fn detect_around_roi(&mut self, frame: &Frame) -> Result<TrackingStep, TrackerError> {
        if let Some(face) = self.search_roi(frame)? {
            self.accept_roi_detection(frame, face);
            return Ok(TrackingStep::RoiDetection);
        }

        if !self.timer.is_running() {
            log::debug!("ROI detection missed, falling back to template matching");
        }
        self.timer.start();
        self.state = TrackingState::Tracking {
            fallback_active: true,
        };
        Ok(TrackingStep::FallbackStarted)
    }

    fn track_with_fallback(&mut self, frame: &Frame) -> Result<TrackingStep, TrackerError> {
        if let Some(face) = self.search_roi(frame)? {
            log::debug!(
                "Face re-detected after {:.2}s of template matching",
                self.timer.elapsed().as_secs_f64()
            );
            self.accept_roi_detection(frame, face);
            return Ok(TrackingStep::RoiDetection);
        }

        let elapsed = self.timer.elapsed();
        if elapsed > self.config.max_fallback_duration() {
            log::info!(
                "Face lost after {:.2}s of template matching",
                elapsed.as_secs_f64()
            );
            self.reset();
            return Ok(TrackingStep::Lost);
        }
        if self.face_template.width() <= 1 || self.face_template.height() <= 1 {
            log::warn!(
                "Face template degenerated to {}x{}, dropping face",
                self.face_template.width(),
                self.face_template.height()
            );
            self.reset();
            return Ok(TrackingStep::Lost);
        }

        let search = frame.crop(&self.face_roi);
        if search.width() < self.face_template.width()
            || search.height() < self.face_template.height()
        {
            log::debug!("ROI {:?} cannot hold the template, dropping face", self.face_roi);
            self.reset();
            return Ok(TrackingStep::Lost);
        }

        let best = self.matcher.match_template(&search, &self.face_template)?;
        let matched = Rect::new(
            best.location.x + self.face_roi.x,
            best.location.y + self.face_roi.y,
            self.face_template.width() as i32,
            self.face_template.height() as i32,
        );
        let face = double_rect_size(&matched, &frame.bounds());
        self.set_tracked_face(frame, face);
        Ok(TrackingStep::TemplateMatching)
    }

    /// Runs restricted detection inside the ROI. Hits are returned in
    /// working-frame coordinates.
    fn search_roi(&mut self, frame: &Frame) -> Result<Option<Rect>, TrackerError> {
        let search = frame.crop(&self.face_roi);
        if search.is_empty() {
            return Ok(None);
        }

        let (min_size, max_size) = self.config.roi_bounds(&self.tracked_face);
        let faces = self.detector.detect(&search, min_size, max_size)?;
        if faces.is_empty() {
            return Ok(None);
        }
        Ok(Some(biggest_face(&faces).translated(self.face_roi.top_left())))
    }

    fn accept_roi_detection(&mut self, frame: &Frame, face: Rect) {
        self.timer.stop();
        self.set_tracked_face(frame, face);
        self.state = TrackingState::Tracking {
            fallback_active: false,
        };
    }

    fn set_tracked_face(&mut self, frame: &Frame, face: Rect) {
        let bounds = frame.bounds();
        self.tracked_face = face.intersect(&bounds);
        self.face_template = extract_template(frame, &self.tracked_face);
        self.face_roi = double_rect_size(&self.tracked_face, &bounds);
        self.face_position = center_of_rect(&self.tracked_face);
    }

    fn reset(&mut self) {
        self.state = TrackingState::NoFace;
        self.timer.stop();
        self.tracked_face = Rect::default();
        self.face_roi = Rect::default();
        self.face_template = Frame::empty(self.face_template.channels());
        self.face_position = Point::default();
    }

    /// Tracked face in original-frame coordinates.
    pub fn face(&self) -> Rect {
        self.scale.to_original_rect(&self.tracked_face)
    }

    /// Center of the tracked face in original-frame coordinates.
    pub fn face_position(&self) -> Point {
        self.scale.to_original_point(self.face_position)
    }

    pub fn is_face_found(&self) -> bool {
        self.state.is_tracking()
    }

    pub fn is_fallback_active(&self) -> bool {
        self.state.is_fallback_active()
    }

    pub fn state(&self) -> TrackingState {
        self.state
    }

    pub fn last_step(&self) -> TrackingStep {
        self.last_step
    }

    /// Tracked face in working-frame coordinates.
    pub fn working_face(&self) -> Rect {
        self.tracked_face
    }

    /// Search region for the next frame, in working-frame coordinates.
    pub fn face_roi(&self) -> Rect {
        self.face_roi
    }

    pub fn face_template(&self) -> &Frame {
        &self.face_template
    }

    /// Time spent in the current fallback; zero outside fallback.
    pub fn fallback_elapsed(&self) -> Duration {
        self.timer.elapsed()
    }

    pub fn scale(&self) -> f64 {
        self.scale.scale()
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    pub fn resized_width(&self) -> u32 {
        self.scale.resized_width()
    }

    pub fn set_resized_width(&mut self, width: u32) {
        self.scale.set_resized_width(width);
        self.config.resized_width = self.scale.resized_width();
    }

    pub fn template_matching_max_duration(&self) -> Duration {
        self.config.max_fallback_duration()
    }

    pub fn set_template_matching_max_duration(&mut self, duration: Duration) {
        self.config.template_matching_max_duration = duration.as_secs_f64();
    }

    /// False when the detector failed to load a model; frames are refused
    /// until a working detector is installed.
    pub fn has_valid_detector(&self) -> bool {
        !self.detector.is_empty()
    }

    /// Swaps the detector. Tracking state is kept.
    pub fn set_detector(&mut self, detector: Box<dyn MultiScaleDetector>) {
        self.detector = detector;
    }
}
