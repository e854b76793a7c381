pub mod face_tracker;
pub mod fallback_timer;
pub mod scale_manager;
pub mod tracker_config;
pub mod tracker_error;
pub mod tracking_state;
pub mod video_face_tracker;
