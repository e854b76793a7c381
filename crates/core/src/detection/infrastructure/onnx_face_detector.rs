/// YOLO face detector using ONNX Runtime via `ort`.
///
/// Handles letterbox preprocessing, inference, NMS and size filtering. A
/// model that fails to load leaves the detector empty instead of failing
/// construction, so callers can query the condition and abort setup.
use std::path::Path;

use crate::detection::domain::multi_scale_detector::{
    filter_by_size, DetectionError, MultiScaleDetector,
};
use crate::shared::frame::Frame;
use crate::shared::geometry::{Rect, Size};

use super::math::{nms, ScoredBox};

/// Fallback YOLO model input resolution when the model doesn't specify dimensions.
const DEFAULT_INPUT_SIZE: u32 = 640;

/// Default confidence threshold for face detection.
pub const DEFAULT_CONFIDENCE: f64 = 0.25;

/// NMS IoU threshold.
const NMS_IOU_THRESH: f64 = 0.45;

pub struct OnnxFaceDetector {
    session: Option<ort::session::Session>,
    load_error: Option<DetectionError>,
    confidence: f64,
    input_size: u32,
}

impl OnnxFaceDetector {
    /// Loads a model, failing if it cannot be opened.
    pub fn new(model_path: &Path, confidence: f64) -> Result<Self, DetectionError> {
        let mut detector = Self::load(model_path, confidence);
        match detector.load_error.take() {
            Some(e) => Err(e),
            None => Ok(detector),
        }
    }

    /// Loads a model, recording any failure in [`Self::load_error`].
    pub fn load(model_path: &Path, confidence: f64) -> Self {
        let mut detector = Self {
            session: None,
            load_error: None,
            confidence,
            input_size: DEFAULT_INPUT_SIZE,
        };
        detector.load_model(model_path);
        detector
    }

    /// Replaces the current model. Returns whether a model is now loaded.
    ///
    /// On failure the previous model is discarded too.
    pub fn load_model(&mut self, model_path: &Path) -> bool {
        match build_session(model_path) {
            Ok(session) => {
                self.input_size = model_input_size(&session).unwrap_or(DEFAULT_INPUT_SIZE);
                self.session = Some(session);
                self.load_error = None;
                log::debug!(
                    "Loaded face model {} ({}px input)",
                    model_path.display(),
                    self.input_size
                );
            }
            Err(e) => {
                self.session = None;
                self.load_error = Some(DetectionError::ModelLoad {
                    path: model_path.to_path_buf(),
                    reason: e.to_string(),
                });
            }
        }
        self.session.is_some()
    }

    pub fn load_error(&self) -> Option<&DetectionError> {
        self.load_error.as_ref()
    }

    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    fn infer(&mut self, frame: &Frame) -> Result<Vec<ScoredBox>, DetectionError> {
        let input_size = self.input_size;
        let confidence = self.confidence;
        let session = self.session.as_mut().ok_or(DetectionError::NotLoaded)?;

        let (input_tensor, scale, pad_x, pad_y) = letterbox(frame, input_size);
        let input_value = ort::value::Tensor::from_array(input_tensor).map_err(inference)?;
        let outputs = session
            .run(ort::inputs![input_value])
            .map_err(inference)?;
        if outputs.len() == 0 {
            return Err(DetectionError::UnexpectedOutput(
                "model produced no outputs".into(),
            ));
        }
        let tensor = outputs[0].try_extract_array::<f32>().map_err(inference)?;
        let shape = tensor.shape().to_vec();

        // YOLO output is [1, features, detections] or [1, detections, features].
        if shape.len() != 3 {
            return Err(DetectionError::UnexpectedOutput(format!(
                "output shape {shape:?}"
            )));
        }
        let transposed = shape[1] < shape[2];
        let (num_dets, num_feats) = if transposed {
            (shape[2], shape[1])
        } else {
            (shape[1], shape[2])
        };
        if num_feats < 5 {
            return Err(DetectionError::UnexpectedOutput(format!(
                "{num_feats} features per detection"
            )));
        }
        let data = tensor
            .as_slice()
            .ok_or_else(|| DetectionError::UnexpectedOutput("non-contiguous output".into()))?;

        let feature = |det: usize, f: usize| -> f64 {
            if transposed {
                data[f * num_dets + det] as f64
            } else {
                data[det * num_feats + f] as f64
            }
        };

        let mut boxes = Vec::new();
        for i in 0..num_dets {
            let score = feature(i, 4);
            if score < confidence {
                continue;
            }
            let (cx, cy, w, h) = (feature(i, 0), feature(i, 1), feature(i, 2), feature(i, 3));
            boxes.push(ScoredBox {
                bbox: [
                    ((cx - w / 2.0) - pad_x as f64) / scale,
                    ((cy - h / 2.0) - pad_y as f64) / scale,
                    ((cx + w / 2.0) - pad_x as f64) / scale,
                    ((cy + h / 2.0) - pad_y as f64) / scale,
                ],
                score,
            });
        }
        Ok(boxes)
    }
}

impl MultiScaleDetector for OnnxFaceDetector {
    fn detect(
        &mut self,
        frame: &Frame,
        min_size: Size,
        max_size: Size,
    ) -> Result<Vec<Rect>, DetectionError> {
        if frame.is_empty() {
            return Ok(Vec::new());
        }
        let mut boxes = self.infer(frame)?;
        let kept = nms(&mut boxes, NMS_IOU_THRESH);
        let rects = to_frame_rects(&kept, frame.bounds());
        Ok(filter_by_size(rects, min_size, max_size))
    }

    fn is_empty(&self) -> bool {
        self.session.is_none()
    }
}

fn build_session(model_path: &Path) -> Result<ort::session::Session, Box<dyn std::error::Error>> {
    let session = ort::session::Session::builder()?
        .with_execution_providers(preferred_execution_providers())?
        .commit_from_file(model_path)?;
    Ok(session)
}

/// Hardware acceleration where the platform has it; CPU otherwise.
fn preferred_execution_providers() -> Vec<ort::execution_providers::ExecutionProviderDispatch> {
    #[cfg(target_os = "macos")]
    {
        vec![ort::execution_providers::CoreMLExecutionProvider::default().build()]
    }
    #[cfg(target_os = "windows")]
    {
        vec![ort::execution_providers::DirectMLExecutionProvider::default().build()]
    }
    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    {
        vec![]
    }
}

/// Input resolution from the model's NCHW input shape, if static.
fn model_input_size(session: &ort::session::Session) -> Option<u32> {
    session.inputs().first().and_then(|input| {
        if let ort::value::ValueType::Tensor { ref shape, .. } = input.dtype() {
            if shape.len() >= 4 && shape[2] > 0 {
                return Some(shape[2] as u32);
            }
        }
        None
    })
}

fn inference(e: impl std::fmt::Display) -> DetectionError {
    DetectionError::Inference(e.to_string())
}

/// Rounds boxes to integer rectangles clipped to `bounds`, dropping any
/// that end up empty.
fn to_frame_rects(boxes: &[ScoredBox], bounds: Rect) -> Vec<Rect> {
    boxes
        .iter()
        .map(|b| {
            let x1 = b.bbox[0].round() as i32;
            let y1 = b.bbox[1].round() as i32;
            let x2 = b.bbox[2].round() as i32;
            let y2 = b.bbox[3].round() as i32;
            Rect::new(x1, y1, x2 - x1, y2 - y1).intersect(&bounds)
        })
        .filter(|r| !r.is_empty())
        .collect()
}

/// Letterbox-resize a frame to `target_size` × `target_size`.
///
/// Returns `(NCHW float32 tensor, scale, pad_x, pad_y)`.
fn letterbox(frame: &Frame, target_size: u32) -> (ndarray::Array4<f32>, f64, u32, u32) {
    let fw = frame.width() as f64;
    let fh = frame.height() as f64;
    let target = target_size as f64;

    let scale = (target / fw).min(target / fh);
    let new_w = ((fw * scale).round() as u32).min(target_size);
    let new_h = ((fh * scale).round() as u32).min(target_size);
    let pad_x = (target_size - new_w) / 2;
    let pad_y = (target_size - new_h) / 2;

    // Padding uses 114/255 gray, the YOLO convention.
    let gray = 114.0f32 / 255.0;
    let mut tensor =
        ndarray::Array4::<f32>::from_elem((1, 3, target_size as usize, target_size as usize), gray);

    let src = frame.as_ndarray();
    let src_h = frame.height() as usize;
    let src_w = frame.width() as usize;
    let gray_input = frame.channels() < 3;

    for y in 0..new_h as usize {
        let src_y = ((y as f64 / scale) as usize).min(src_h - 1);
        for x in 0..new_w as usize {
            let src_x = ((x as f64 / scale) as usize).min(src_w - 1);
            let ty = pad_y as usize + y;
            let tx = pad_x as usize + x;
            for c in 0..3 {
                let sc = if gray_input { 0 } else { c };
                tensor[[0, c, ty, tx]] = src[[src_y, src_x, sc]] as f32 / 255.0;
            }
        }
    }

    (tensor, scale, pad_x, pad_y)
}
