//! Symmetric finite-difference operators along X, Y, or both.
//!
//! For a span `s` the response at `p` along an axis is
//! ```text
//! |Σ_{k=1}^{s-1} (p[+k] − p[−k])|
//! ```
//! Pixels closer than `s` to any image edge are zero; there is no wraparound
//! or clamping.
//!
//! The XY variant adds the X response to a vertical response averaged over a
//! fixed window of [`XY_SECONDARY_WINDOW`] columns. That width does not follow
//! the span option.

use crate::cache::ArrayCache;
use crate::error::{TransformError, TransformResult};
use crate::image::Image;
use crate::options::TransformOptions;
use crate::transform::base::{ImageTransform, emit_planes};

/// Smallest span with at least one tap.
pub const MIN_SPAN_DIFF: usize = 2;

/// Largest accepted span.
pub const MAX_SPAN_DIFF: usize = 64;

/// Column count of the XY operator's vertical averaging window.
pub const XY_SECONDARY_WINDOW: usize = 10;

/// Which direction(s) the operator differentiates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
    XY,
}

#[derive(Debug, Clone, Copy)]
pub struct FiniteDifference {
    name: &'static str,
    axis: Axis,
}

impl FiniteDifference {
    pub const fn new(name: &'static str, axis: Axis) -> Self {
        Self { name, axis }
    }
}

/// Plane geometry plus the span, shared by the per-axis sums.
struct Window<'a> {
    plane: &'a [f64],
    width: usize,
    height: usize,
    span: usize,
}

impl Window<'_> {
    fn at(&self, x: usize, y: usize) -> f64 {
        self.plane[y * self.width + x]
    }

    fn interior(&self, x: usize, y: usize) -> bool {
        x >= self.span
            && y >= self.span
            && x + self.span < self.width
            && y + self.span < self.height
    }

    fn horizontal(&self, x: usize, y: usize) -> f64 {
        (1..self.span).map(|k| self.at(x + k, y) - self.at(x - k, y)).sum()
    }

    fn vertical(&self, x: usize, y: usize) -> f64 {
        (1..self.span).map(|k| self.at(x, y + k) - self.at(x, y - k)).sum()
    }

    /// Vertical sum averaged over the secondary column window around `x`.
    fn vertical_band(&self, x: usize, y: usize) -> f64 {
        let half = (XY_SECONDARY_WINDOW / 2) as isize;
        let (mut total, mut count) = (0.0, 0usize);
        for dx in -half..XY_SECONDARY_WINDOW as isize - half {
            let Some(column) = x.checked_add_signed(dx).filter(|&c| c < self.width) else {
                continue;
            };
            total += self.vertical(column, y);
            count += 1;
        }
        if count == 0 { 0.0 } else { total / count as f64 }
    }
}

/// Apply one operator to one plane.
fn differentiate(plane: &[f64], width: usize, height: usize, span: usize, axis: Axis) -> Vec<f64> {
    let window = Window {
        plane,
        width,
        height,
        span,
    };
    let mut out = vec![0.0; plane.len()];
    for y in 0..height {
        for x in 0..width {
            if !window.interior(x, y) {
                continue;
            }
            out[y * width + x] = match axis {
                Axis::X => window.horizontal(x, y).abs(),
                Axis::Y => window.vertical(x, y).abs(),
                Axis::XY => window.horizontal(x, y).abs() + window.vertical_band(x, y).abs(),
            };
        }
    }
    out
}

impl ImageTransform for FiniteDifference {
    fn name(&self) -> &'static str {
        self.name
    }

    fn validate(&self, _source: &Image, options: &TransformOptions) -> TransformResult<()> {
        let span = options.span_diff;
        if !(MIN_SPAN_DIFF..=MAX_SPAN_DIFF).contains(&span) {
            return Err(TransformError::invalid_parameter(format!(
                "span {span} is outside {MIN_SPAN_DIFF}..={MAX_SPAN_DIFF}"
            )));
        }
        Ok(())
    }

    fn compute(
        &self,
        source: &Image,
        options: &TransformOptions,
        cache: &ArrayCache,
    ) -> TransformResult<Image> {
        let arrays = cache.channel_arrays(source);
        let (width, height) = (source.width() as usize, source.height() as usize);
        let planes: Vec<Vec<f64>> = arrays
            .planes()
            .iter()
            .map(|plane| differentiate(plane, width, height, options.span_diff, self.axis))
            .collect();
        emit_planes(source, source.data_type(), &planes)
    }
}
