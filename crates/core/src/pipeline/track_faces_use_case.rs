use std::time::Instant;

use serde::Serialize;

use crate::pipeline::pipeline_logger::PipelineLogger;
use crate::shared::geometry::{Point, Rect};
use crate::tracking::domain::tracker_error::TrackerError;
use crate::tracking::domain::tracking_state::TrackingStep;
use crate::tracking::domain::video_face_tracker::VideoFaceTracker;

/// Per-frame tracking result, in original-frame coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct FaceObservation {
    pub frame_index: usize,
    pub found: bool,
    pub face: Rect,
    pub center: Point,
    pub step: TrackingStep,
    pub fallback_active: bool,
    /// Wall time spent reading and tracking this frame.
    pub time_ms: f64,
    /// Exponentially smoothed frames per second.
    pub fps: f64,
}

/// Totals for a finished run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct TrackingSummary {
    pub frames: usize,
    pub frames_with_face: usize,
    pub cancelled: bool,
}

/// Smooths instantaneous frame rates with weight 1/16 on the newest sample.
#[derive(Clone, Copy, Debug, Default)]
pub struct FpsMeter {
    fps: f64,
}

impl FpsMeter {
    pub fn update(&mut self, seconds_per_frame: f64) -> f64 {
        if seconds_per_frame > 0.0 {
            self.fps = (15.0 * self.fps + 1.0 / seconds_per_frame) / 16.0;
        }
        self.fps
    }

    pub fn fps(&self) -> f64 {
        self.fps
    }
}

/// Pulls frames through a [`VideoFaceTracker`] and reports every result.
///
/// Stops when the source is exhausted, `max_frames` frames have been
/// processed, or the progress callback returns `false`.
pub struct TrackFacesUseCase {
    tracker: VideoFaceTracker,
    logger: Box<dyn PipelineLogger>,
    on_progress: Option<Box<dyn Fn(usize, usize) -> bool + Send>>,
    max_frames: Option<usize>,
    total_frames: usize,
}

impl TrackFacesUseCase {
    pub fn new(
        tracker: VideoFaceTracker,
        logger: Box<dyn PipelineLogger>,
        on_progress: Option<Box<dyn Fn(usize, usize) -> bool + Send>>,
    ) -> Self {
        Self {
            tracker,
            logger,
            on_progress,
            max_frames: None,
            total_frames: 0,
        }
    }

    pub fn with_max_frames(mut self, max_frames: Option<usize>) -> Self {
        self.max_frames = max_frames;
        self
    }

    /// Expected frame count for progress reporting; 0 if unknown.
    pub fn with_total_frames(mut self, total_frames: usize) -> Self {
        self.total_frames = total_frames;
        self
    }

    pub fn tracker(&self) -> &VideoFaceTracker {
        &self.tracker
    }

    pub fn execute(
        &mut self,
        mut on_observation: impl FnMut(&FaceObservation),
    ) -> Result<TrackingSummary, TrackerError> {
        let total = match (self.max_frames, self.total_frames) {
            (Some(max), 0) => max,
            (Some(max), total) => max.min(total),
            (None, total) => total,
        };
        let mut summary = TrackingSummary::default();
        let mut meter = FpsMeter::default();

        while self.max_frames.map_or(true, |max| summary.frames < max) {
            let start = Instant::now();
            let Some((frame, center)) = self.tracker.next_frame_and_detect()? else {
                break;
            };
            let elapsed = start.elapsed().as_secs_f64();

            let tracker = self.tracker.tracker();
            let observation = FaceObservation {
                frame_index: frame.index(),
                found: tracker.is_face_found(),
                face: tracker.face(),
                center,
                step: tracker.last_step(),
                fallback_active: tracker.is_fallback_active(),
                time_ms: elapsed * 1000.0,
                fps: meter.update(elapsed),
            };

            self.logger.timing("track", observation.time_ms);
            self.logger.metric("fps", observation.fps);
            self.logger.count(observation.step.name());
            on_observation(&observation);

            summary.frames += 1;
            if observation.found {
                summary.frames_with_face += 1;
            }
            self.logger.progress(summary.frames, total);

            if !self.report_progress(summary.frames, total) {
                self.logger.info("Tracking cancelled");
                summary.cancelled = true;
                break;
            }
        }

        self.logger.summary();
        Ok(summary)
    }

    fn report_progress(&self, current: usize, total: usize) -> bool {
        match self.on_progress {
            Some(ref callback) => callback(current, total),
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use approx::assert_relative_eq;

    use crate::detection::domain::multi_scale_detector::{DetectionError, MultiScaleDetector};
    use crate::pipeline::pipeline_logger::NullPipelineLogger;
    use crate::shared::frame::Frame;
    use crate::shared::geometry::Size;
    use crate::video::domain::frame_source::{FrameSource, FrameSourceError};

    struct ScriptedDetector {
        faces: VecDeque<Vec<Rect>>,
    }

    impl MultiScaleDetector for ScriptedDetector {
        fn detect(&mut self, _: &Frame, _: Size, _: Size) -> Result<Vec<Rect>, DetectionError> {
            Ok(self.faces.pop_front().unwrap_or_default())
        }
    }

    struct GraySource {
        remaining: usize,
        index: usize,
    }

    impl FrameSource for GraySource {
        fn next_frame(&mut self) -> Result<Option<Frame>, FrameSourceError> {
            if self.remaining == 0 {
                return Ok(None);
            }
            self.remaining -= 1;
            self.index += 1;
            Ok(Some(Frame::new(vec![90u8; 320 * 240], 320, 240, 1, self.index - 1)))
        }
    }

    /// Records counted events so tests can inspect them.
    struct RecordingLogger {
        counts: Arc<Mutex<Vec<String>>>,
    }

    impl PipelineLogger for RecordingLogger {
        fn progress(&mut self, _current: usize, _total: usize) {}
        fn timing(&mut self, _stage: &str, _duration_ms: f64) {}
        fn metric(&mut self, _name: &str, _value: f64) {}
        fn count(&mut self, name: &str) {
            self.counts.lock().unwrap().push(name.to_string());
        }
        fn info(&mut self, _message: &str) {}
    }

    fn video_tracker(faces: Vec<Vec<Rect>>, frames: usize) -> VideoFaceTracker {
        VideoFaceTracker::new(
            Box::new(ScriptedDetector {
                faces: faces.into(),
            }),
            Box::new(GraySource {
                remaining: frames,
                index: 0,
            }),
        )
    }

    #[test]
    fn test_runs_until_source_exhausted() {
        let mut use_case = TrackFacesUseCase::new(
            video_tracker(vec![vec![Rect::new(100, 80, 60, 60)]], 4),
            Box::new(NullPipelineLogger),
            None,
        );
        let mut observations = Vec::new();

        let summary = use_case.execute(|o| observations.push(*o)).unwrap();

        assert_eq!(summary.frames, 4);
        assert!(!summary.cancelled);
        assert_eq!(observations.len(), 4);
        assert_eq!(
            observations.iter().map(|o| o.frame_index).collect::<Vec<_>>(),
            vec![0, 1, 2, 3]
        );
        let first = observations[0];
        assert!(first.found);
        assert_eq!(first.face, Rect::new(100, 80, 60, 60));
        assert_eq!(first.center, Point::new(130, 110));
        assert_eq!(first.step, TrackingStep::FullFrameDetection { found: true });
        assert_eq!(observations[1].step, TrackingStep::FallbackStarted);
    }

    #[test]
    fn test_stops_at_max_frames() {
        let mut use_case = TrackFacesUseCase::new(
            video_tracker(vec![], 10),
            Box::new(NullPipelineLogger),
            None,
        )
        .with_max_frames(Some(3));

        let summary = use_case.execute(|_| {}).unwrap();

        assert_eq!(summary.frames, 3);
        assert_eq!(summary.frames_with_face, 0);
    }

    #[test]
    fn test_callback_cancels_run() {
        let seen = Arc::new(AtomicUsize::new(0));
        let seen_cb = seen.clone();
        let mut use_case = TrackFacesUseCase::new(
            video_tracker(vec![], 10),
            Box::new(NullPipelineLogger),
            Some(Box::new(move |current, _| {
                seen_cb.store(current, Ordering::SeqCst);
                current < 2
            })),
        );

        let summary = use_case.execute(|_| {}).unwrap();

        assert!(summary.cancelled);
        assert_eq!(summary.frames, 2);
        assert_eq!(seen.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_counts_each_step() {
        let counts = Arc::new(Mutex::new(Vec::new()));
        let mut use_case = TrackFacesUseCase::new(
            video_tracker(vec![vec![], vec![Rect::new(100, 80, 60, 60)]], 2),
            Box::new(RecordingLogger {
                counts: counts.clone(),
            }),
            None,
        );

        let summary = use_case.execute(|_| {}).unwrap();

        assert_eq!(summary.frames_with_face, 1);
        assert_eq!(
            *counts.lock().unwrap(),
            vec!["full_frame_miss".to_string(), "full_frame_detection".to_string()]
        );
    }

    #[test]
    fn test_observation_serializes_to_json() {
        let observation = FaceObservation {
            frame_index: 7,
            found: true,
            face: Rect::new(1, 2, 3, 4),
            center: Point::new(2, 4),
            step: TrackingStep::RoiDetection,
            fallback_active: false,
            time_ms: 1.5,
            fps: 20.0,
        };
        let json = serde_json::to_value(observation).unwrap();
        assert_eq!(json["frame_index"], 7);
        assert_eq!(json["face"]["width"], 3);
        assert_eq!(json["step"], "roi_detection");
    }

    #[test]
    fn test_fps_meter_smooths_toward_rate() {
        let mut meter = FpsMeter::default();
        assert_relative_eq!(meter.update(0.1), 10.0 / 16.0);
        for _ in 0..200 {
            meter.update(0.1);
        }
        assert_relative_eq!(meter.fps(), 10.0, epsilon = 1e-3);
        assert_relative_eq!(meter.update(0.0), meter.fps());
    }
}
