use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::matching::infrastructure::template_matcher::MatchMethod;
use crate::shared::constants::{
    DEFAULT_MAX_FACE_RATIO, DEFAULT_MIN_FACE_RATIO, DEFAULT_RESIZED_WIDTH, DEFAULT_SIZE_TOLERANCE,
    DEFAULT_TEMPLATE_MATCHING_MAX_DURATION,
};
use crate::shared::geometry::{Rect, Size};

/// Tunable tracking policy. Every field has a default, so a partial JSON
/// document is a valid configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Working-frame width in pixels.
    pub resized_width: u32,
    /// Seconds of template matching before the face is declared lost.
    pub template_matching_max_duration: f64,
    /// Smallest full-frame face, as a fraction of frame height.
    pub min_face_ratio: f64,
    /// Largest full-frame face, as a fraction of frame height.
    pub max_face_ratio: f64,
    /// Allowed relative size change between consecutive ROI detections.
    pub size_tolerance: f64,
    pub match_method: MatchMethod,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            resized_width: DEFAULT_RESIZED_WIDTH,
            template_matching_max_duration: DEFAULT_TEMPLATE_MATCHING_MAX_DURATION,
            min_face_ratio: DEFAULT_MIN_FACE_RATIO,
            max_face_ratio: DEFAULT_MAX_FACE_RATIO,
            size_tolerance: DEFAULT_SIZE_TOLERANCE,
            match_method: MatchMethod::default(),
        }
    }
}

impl TrackerConfig {
    /// Fallback limit as a [`Duration`]; values too large to represent
    /// saturate to [`Duration::MAX`].
    pub fn max_fallback_duration(&self) -> Duration {
        Duration::try_from_secs_f64(self.template_matching_max_duration.max(0.0))
            .unwrap_or(Duration::MAX)
    }

    /// Size bounds for a whole-frame search of a frame `frame_height` tall.
    pub fn full_frame_bounds(&self, frame_height: u32) -> (Size, Size) {
        let h = frame_height as f64;
        (
            Size::square((h * self.min_face_ratio) as i32),
            Size::square((h * self.max_face_ratio) as i32),
        )
    }

    /// Size bounds for a ROI search around the previously tracked `face`.
    pub fn roi_bounds(&self, face: &Rect) -> (Size, Size) {
        let low = 1.0 - self.size_tolerance;
        let high = 1.0 + self.size_tolerance;
        let w = face.width as f64;
        let h = face.height as f64;
        (
            Size::new((w * low) as i32, (h * low) as i32),
            Size::new((w * high) as i32, (h * high) as i32),
        )
    }

    /// Checks value ranges; returns a description of the first problem.
    pub fn validate(&self) -> Result<(), String> {
        if self.resized_width == 0 {
            return Err("resized_width must be at least 1".into());
        }
        if Duration::try_from_secs_f64(self.template_matching_max_duration).is_err() {
            return Err(format!(
                "template_matching_max_duration must be a finite number of seconds >= 0, got {}",
                self.template_matching_max_duration
            ));
        }
        if !(0.0 < self.min_face_ratio && self.min_face_ratio <= self.max_face_ratio) {
            return Err(format!(
                "face ratios must satisfy 0 < min <= max, got {} and {}",
                self.min_face_ratio, self.max_face_ratio
            ));
        }
        if !(0.0..1.0).contains(&self.size_tolerance) {
            return Err(format!(
                "size_tolerance must be in [0, 1), got {}",
                self.size_tolerance
            ));
        }
        Ok(())
    }
}
