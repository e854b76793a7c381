//! Exhaustive template matching over the luma plane.

use ndarray::{s, Array2, ArrayView2, Zip};
use serde::{Deserialize, Serialize};

use crate::matching::domain::patch_matcher::{MatchError, MatchResult, PatchMatcher};
use crate::shared::frame::Frame;
use crate::shared::geometry::Point;

/// Denominators below this are treated as zero (flat patches).
const EPS: f32 = 1e-6;

/// Similarity metric; decides whether the best match is the minimum or the
/// maximum of the normalized surface.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMethod {
    /// Normalized squared difference; best match is the minimum.
    #[default]
    SqdiffNormed,
    /// Normalized correlation coefficient; best match is the maximum.
    CcoeffNormed,
}

impl MatchMethod {
    pub fn lower_is_better(self) -> bool {
        matches!(self, MatchMethod::SqdiffNormed)
    }
}

/// Slides the template over every placement inside the search image.
#[derive(Clone, Copy, Debug, Default)]
pub struct TemplateMatcher {
    method: MatchMethod,
}

impl TemplateMatcher {
    pub fn new(method: MatchMethod) -> Self {
        Self { method }
    }

    pub fn method(&self) -> MatchMethod {
        self.method
    }

    fn raw_scores(&self, search: ArrayView2<'_, f32>, tpl: ArrayView2<'_, f32>) -> Array2<f32> {
        let (th, tw) = tpl.dim();
        let rows = search.nrows() - th + 1;
        let cols = search.ncols() - tw + 1;
        let n = (th * tw) as f32;

        let tpl_mean = tpl.sum() / n;
        let tpl_sq = tpl.fold(0.0f32, |acc, &t| acc + t * t);
        let tpl_var = tpl.fold(0.0f32, |acc, &t| acc + (t - tpl_mean) * (t - tpl_mean));

        let mut scores = Array2::<f32>::zeros((rows, cols));
        for y in 0..rows {
            for x in 0..cols {
                let window = search.slice(s![y..y + th, x..x + tw]);
                scores[[y, x]] = match self.method {
                    MatchMethod::SqdiffNormed => sqdiff_normed(window, tpl, tpl_sq),
                    MatchMethod::CcoeffNormed => ccoeff_normed(window, tpl, tpl_mean, tpl_var, n),
                };
            }
        }
        scores
    }
}

impl PatchMatcher for TemplateMatcher {
    fn match_template(&self, search: &Frame, template: &Frame) -> Result<MatchResult, MatchError> {
        if search.is_empty() || template.is_empty() {
            return Err(MatchError::EmptyInput);
        }
        if template.width() > search.width() || template.height() > search.height() {
            return Err(MatchError::TemplateTooLarge {
                template_width: template.width(),
                template_height: template.height(),
                search_width: search.width(),
                search_height: search.height(),
            });
        }

        let search_luma = search.to_luma();
        let tpl_luma = template.to_luma();
        let mut scores = self.raw_scores(search_luma.view(), tpl_luma.view());
        normalize_min_max(&mut scores);

        let (row, col) = extremum(&scores, self.method.lower_is_better());
        Ok(MatchResult {
            score: scores[[row, col]],
            location: Point::new(col as i32, row as i32),
            scores,
        })
    }
}

fn sqdiff_normed(window: ArrayView2<'_, f32>, tpl: ArrayView2<'_, f32>, tpl_sq: f32) -> f32 {
    let mut diff = 0.0f32;
    let mut win_sq = 0.0f32;
    Zip::from(&window).and(&tpl).for_each(|&i, &t| {
        diff += (t - i) * (t - i);
        win_sq += i * i;
    });
    let denom = (tpl_sq * win_sq).sqrt();
    if denom <= EPS {
        return if diff <= EPS { 0.0 } else { 1.0 };
    }
    diff / denom
}

fn ccoeff_normed(
    window: ArrayView2<'_, f32>,
    tpl: ArrayView2<'_, f32>,
    tpl_mean: f32,
    tpl_var: f32,
    n: f32,
) -> f32 {
    let win_mean = window.sum() / n;
    let mut dot = 0.0f32;
    let mut win_var = 0.0f32;
    Zip::from(&window).and(&tpl).for_each(|&i, &t| {
        let di = i - win_mean;
        dot += (t - tpl_mean) * di;
        win_var += di * di;
    });
    let denom = (tpl_var * win_var).sqrt();
    if denom <= EPS {
        return 0.0;
    }
    dot / denom
}

/// Rescales in place so the minimum maps to 0 and the maximum to 1.
/// A flat surface becomes all zeros.
fn normalize_min_max(scores: &mut Array2<f32>) {
    let min = scores.fold(f32::INFINITY, |a, &b| a.min(b));
    let max = scores.fold(f32::NEG_INFINITY, |a, &b| a.max(b));
    let range = max - min;
    if range <= f32::EPSILON {
        scores.fill(0.0);
    } else {
        scores.mapv_inplace(|v| (v - min) / range);
    }
}

/// First (row-major) index of the minimum or maximum.
fn extremum(scores: &Array2<f32>, lowest: bool) -> (usize, usize) {
    let mut best = (0, 0);
    let mut best_value = scores[[0, 0]];
    for ((row, col), &value) in scores.indexed_iter() {
        let better = if lowest {
            value < best_value
        } else {
            value > best_value
        };
        if better {
            best = (row, col);
            best_value = value;
        }
    }
    best
}
