pub mod multi_scale_detector;
