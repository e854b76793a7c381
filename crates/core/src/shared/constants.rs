pub const FACE_MODEL_NAME: &str = "yolo11n-pose_widerface.onnx";
pub const FACE_MODEL_URL: &str =
    "https://github.com/neutrinographics/faceguard/releases/download/v0.1.0/yolo11n-pose_widerface.onnx";

/// Width of the downscaled working frame.
pub const DEFAULT_RESIZED_WIDTH: u32 = 320;

/// Seconds of template matching before the face is declared lost.
pub const DEFAULT_TEMPLATE_MATCHING_MAX_DURATION: f64 = 3.0;

/// Full-frame search bounds, as fractions of the working-frame height.
pub const DEFAULT_MIN_FACE_RATIO: f64 = 1.0 / 5.0;
pub const DEFAULT_MAX_FACE_RATIO: f64 = 2.0 / 3.0;

/// ROI search accepts faces within ±20% of the previous size.
pub const DEFAULT_SIZE_TOLERANCE: f64 = 0.2;

pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "tiff", "tif", "webp"];
