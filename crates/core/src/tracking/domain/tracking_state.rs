use serde::Serialize;

/// Coarse tracker state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackingState {
    /// No face held; the next frame runs a full-frame search.
    #[default]
    NoFace,
    /// A face is held. `fallback_active` means ROI detection missed and
    /// positions now come from template matching.
    Tracking { fallback_active: bool },
}

impl TrackingState {
    pub fn is_tracking(self) -> bool {
        matches!(self, TrackingState::Tracking { .. })
    }

    pub fn is_fallback_active(self) -> bool {
        matches!(
            self,
            TrackingState::Tracking {
                fallback_active: true
            }
        )
    }
}

/// What the tracker did with the most recent frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackingStep {
    /// No frame processed yet.
    #[default]
    Idle,
    /// Whole-frame search; `found` says whether an episode started.
    FullFrameDetection { found: bool },
    /// Restricted search inside the ROI found the face.
    RoiDetection,
    /// Restricted search missed; fallback timer started or kept running.
    FallbackStarted,
    /// Position refined by template matching.
    TemplateMatching,
    /// Fallback expired or the template degenerated; face dropped.
    Lost,
}

impl TrackingStep {
    /// Stable snake_case label, matching the serialized variant name.
    pub fn name(self) -> &'static str {
        match self {
            TrackingStep::Idle => "idle",
            TrackingStep::FullFrameDetection { found: true } => "full_frame_detection",
            TrackingStep::FullFrameDetection { found: false } => "full_frame_miss",
            TrackingStep::RoiDetection => "roi_detection",
            TrackingStep::FallbackStarted => "fallback_started",
            TrackingStep::TemplateMatching => "template_matching",
            TrackingStep::Lost => "lost",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_no_face() {
        let state = TrackingState::default();
        assert!(!state.is_tracking());
        assert!(!state.is_fallback_active());
    }

    #[test]
    fn test_fallback_flag() {
        let tracking = TrackingState::Tracking {
            fallback_active: false,
        };
        let fallback = TrackingState::Tracking {
            fallback_active: true,
        };
        assert!(tracking.is_tracking());
        assert!(!tracking.is_fallback_active());
        assert!(fallback.is_tracking());
        assert!(fallback.is_fallback_active());
    }

    #[test]
    fn test_step_serializes_snake_case() {
        let json = serde_json::to_string(&TrackingStep::TemplateMatching).unwrap();
        assert_eq!(json, "\"template_matching\"");
    }

    #[test]
    fn test_step_names() {
        assert_eq!(TrackingStep::RoiDetection.name(), "roi_detection");
        assert_eq!(
            TrackingStep::FullFrameDetection { found: false }.name(),
            "full_frame_miss"
        );
    }
}
