use serde::Serialize;

use crate::shared::frame::Frame;

/// Integer pixel coordinate.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Width/height pair used for detector size bounds.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Size {
    pub width: i32,
    pub height: i32,
}

impl Size {
    pub const fn new(width: i32, height: i32) -> Self {
        Self { width, height }
    }

    pub fn square(side: i32) -> Self {
        Self::new(side, side)
    }
}

/// Axis-aligned rectangle in pixel coordinates.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Rectangle covering a whole `width` x `height` image.
    pub fn from_size(width: u32, height: u32) -> Self {
        Self::new(0, 0, width as i32, height as i32)
    }

    /// Area in pixels; zero for degenerate rectangles.
    pub fn area(&self) -> i64 {
        self.width.max(0) as i64 * self.height.max(0) as i64
    }

    pub fn is_empty(&self) -> bool {
        self.area() == 0
    }

    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    pub fn top_left(&self) -> Point {
        Point::new(self.x, self.y)
    }

    pub fn translated(&self, offset: Point) -> Rect {
        Rect::new(self.x + offset.x, self.y + offset.y, self.width, self.height)
    }

    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.x && p.y >= self.y && p.x < self.x + self.width && p.y < self.y + self.height
    }

    /// Overlap of two rectangles, or an empty rectangle when disjoint.
    pub fn intersect(&self, other: &Rect) -> Rect {
        let x1 = self.x.max(other.x);
        let y1 = self.y.max(other.y);
        let x2 = (self.x + self.width).min(other.x + other.width);
        let y2 = (self.y + self.height).min(other.y + other.height);
        if x2 <= x1 || y2 <= y1 {
            return Rect::default();
        }
        Rect::new(x1, y1, x2 - x1, y2 - y1)
    }

    /// Divides every component by `scale`, truncating toward zero.
    pub fn unscaled(&self, scale: f64) -> Rect {
        Rect::new(
            (self.x as f64 / scale) as i32,
            (self.y as f64 / scale) as i32,
            (self.width as f64 / scale) as i32,
            (self.height as f64 / scale) as i32,
        )
    }
}

/// Doubles `rect` around its own center, then clips the result to `bounds`.
///
/// Edges that overflow the top/left boundary shrink the size by the overflow
/// before snapping to the boundary; edges past the bottom/right boundary are
/// cut so they land exactly on it. Width and height never go negative, but a
/// zero-area result is possible and means "no usable region".
pub fn double_rect_size(rect: &Rect, bounds: &Rect) -> Rect {
    let mut out = Rect::new(
        rect.x - rect.width / 2,
        rect.y - rect.height / 2,
        rect.width * 2,
        rect.height * 2,
    );

    if out.x < bounds.x {
        out.width -= bounds.x - out.x;
        out.x = bounds.x;
    }
    if out.y < bounds.y {
        out.height -= bounds.y - out.y;
        out.y = bounds.y;
    }
    if out.x + out.width > bounds.x + bounds.width {
        out.width = bounds.x + bounds.width - out.x;
    }
    if out.y + out.height > bounds.y + bounds.height {
        out.height = bounds.y + bounds.height - out.y;
    }

    out.width = out.width.max(0);
    out.height = out.height.max(0);
    out
}

/// Integer-truncated center of `rect`.
pub fn center_of_rect(rect: &Rect) -> Point {
    Point::new(rect.x + rect.width / 2, rect.y + rect.height / 2)
}

/// Largest-area candidate; ties keep the first one encountered.
///
/// # Panics
///
/// Panics when `faces` is empty. Callers must check for an empty candidate
/// set before selecting.
pub fn biggest_face(faces: &[Rect]) -> Rect {
    assert!(!faces.is_empty(), "biggest_face requires at least one candidate");

    let mut biggest = &faces[0];
    for face in &faces[1..] {
        if face.area() > biggest.area() {
            biggest = face;
        }
    }
    *biggest
}

/// Copies the central half-width, half-height patch of `face` out of `frame`.
///
/// The returned frame owns its pixels independently of `frame`.
pub fn extract_template(frame: &Frame, face: &Rect) -> Frame {
    let patch = Rect::new(
        face.x + face.width / 4,
        face.y + face.height / 4,
        face.width / 2,
        face.height / 2,
    );
    frame.crop(&patch)
}
