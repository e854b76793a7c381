use crate::shared::frame::{Frame, FrameError};
use crate::shared::geometry::{Point, Rect};

/// Downscale factor between the original frame and the working frame.
///
/// Recomputed for every frame because the source resolution may change.
/// Tracking state is kept in working-frame coordinates; the `to_original_*`
/// conversions are what callers observe.
#[derive(Clone, Debug)]
pub struct ScaleManager {
    resized_width: u32,
    scale: f64,
}

impl ScaleManager {
    pub fn new(resized_width: u32) -> Self {
        Self {
            resized_width: resized_width.max(1),
            scale: 1.0,
        }
    }

    pub fn resized_width(&self) -> u32 {
        self.resized_width
    }

    /// Frames narrower than `width` are never upscaled. Clamped to >= 1.
    pub fn set_resized_width(&mut self, width: u32) {
        self.resized_width = width.max(1);
    }

    /// Working width over original width, from the most recent frame.
    pub fn scale(&self) -> f64 {
        self.scale
    }

    /// Recomputes the factor for a frame `original_width` pixels wide.
    pub fn update(&mut self, original_width: u32) -> f64 {
        if original_width > 0 {
            self.scale = self.resized_width.min(original_width) as f64 / original_width as f64;
        }
        self.scale
    }

    /// Working-frame dimensions for an original of `width` x `height`.
    pub fn working_size(&self, width: u32, height: u32) -> (u32, u32) {
        (
            (self.scale * width as f64) as u32,
            (self.scale * height as f64) as u32,
        )
    }

    /// Updates the factor from `frame` and returns the downscaled copy.
    pub fn downscale(&mut self, frame: &Frame) -> Result<Frame, FrameError> {
        self.update(frame.width());
        let (width, height) = self.working_size(frame.width(), frame.height());
        frame.resized(width, height)
    }

    pub fn to_original_rect(&self, rect: &Rect) -> Rect {
        rect.unscaled(self.scale)
    }

    pub fn to_original_point(&self, p: Point) -> Point {
        Point::new(
            (p.x as f64 / self.scale) as i32,
            (p.y as f64 / self.scale) as i32,
        )
    }

    pub fn to_working_rect(&self, rect: &Rect) -> Rect {
        Rect::new(
            (rect.x as f64 * self.scale) as i32,
            (rect.y as f64 * self.scale) as i32,
            (rect.width as f64 * self.scale) as i32,
            (rect.height as f64 * self.scale) as i32,
        )
    }
}
