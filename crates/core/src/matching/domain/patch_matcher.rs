use ndarray::Array2;
use thiserror::Error;

use crate::shared::frame::Frame;
use crate::shared::geometry::Point;

#[derive(Error, Debug, PartialEq)]
pub enum MatchError {
    #[error("template and search image must both be non-empty")]
    EmptyInput,
    #[error("template {template_width}x{template_height} does not fit in search image {search_width}x{search_height}")]
    TemplateTooLarge {
        template_width: u32,
        template_height: u32,
        search_width: u32,
        search_height: u32,
    },
}

/// Score surface of one template search.
#[derive(Clone, Debug)]
pub struct MatchResult {
    /// `[rows, cols]` scores min-max normalized to `[0, 1]`, one per
    /// template placement.
    pub scores: Array2<f32>,
    /// Top-left corner of the best placement, in search-image coordinates.
    pub location: Point,
    /// Normalized score at `location`.
    pub score: f32,
}

/// Domain interface for patch similarity search.
pub trait PatchMatcher: Send {
    fn match_template(&self, search: &Frame, template: &Frame) -> Result<MatchResult, MatchError>;
}
