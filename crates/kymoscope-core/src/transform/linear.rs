//! Weighted channel combinations and the RGB dispersion detector.

use crate::cache::{ArrayCache, abs_difference, linear_combination};
use crate::error::{TransformError, TransformResult};
use crate::image::Image;
use crate::options::TransformOptions;
use crate::transform::base::{ImageTransform, emit_single};

/// Weights above this magnitude are accepted but logged.
const LARGE_WEIGHT: f64 = 10.0;

/// `w0·R + w1·G + w2·B` per pixel.
///
/// Weights can be negative or fractional. A transform built with
/// [`LinearCombination::from_options`] reads them from
/// [`TransformOptions::weights`] on every call.
#[derive(Debug, Clone, Copy)]
pub struct LinearCombination {
    name: &'static str,
    weights: Option<[f64; 3]>,
}

impl LinearCombination {
    pub const fn new(name: &'static str, weights: [f64; 3]) -> Self {
        Self {
            name,
            weights: Some(weights),
        }
    }

    pub const fn from_options(name: &'static str) -> Self {
        Self { name, weights: None }
    }

    pub fn weights(&self, options: &TransformOptions) -> [f64; 3] {
        self.weights.unwrap_or(options.weights)
    }
}

impl ImageTransform for LinearCombination {
    fn name(&self) -> &'static str {
        self.name
    }

    fn required_channels(&self) -> usize {
        3
    }

    fn validate(&self, _source: &Image, options: &TransformOptions) -> TransformResult<()> {
        let weights = self.weights(options);
        if weights.iter().any(|w| !w.is_finite()) {
            return Err(TransformError::invalid_parameter(format!(
                "weights must be finite, got {weights:?}"
            )));
        }
        if weights.iter().all(|&w| w == 0.0) {
            return Err(TransformError::invalid_parameter("at least one weight must be non-zero"));
        }
        if weights.iter().any(|w| w.abs() > LARGE_WEIGHT) {
            tracing::warn!("{}: unusually large weights {weights:?}", self.name);
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
        let combined = linear_combination(
            &[arrays.red(), arrays.green(), arrays.blue()],
            &self.weights(options),
        );
        emit_single(source, source.data_type(), combined, options.replicate_channels)
    }
}

/// `|R-G| + |R-B| + |G-B|` per pixel: high where a pixel is strongly colored.
#[derive(Debug, Clone, Copy)]
pub struct SumDiff {
    name: &'static str,
}

impl SumDiff {
    pub const fn new(name: &'static str) -> Self {
        Self { name }
    }
}

/// Per-pixel color dispersion of three planes.
pub(crate) fn dispersion(r: &[f64], g: &[f64], b: &[f64]) -> Vec<f64> {
    let rg = abs_difference(r, g);
    let rb = abs_difference(r, b);
    let gb = abs_difference(g, b);
    linear_combination(&[rg.as_slice(), rb.as_slice(), gb.as_slice()], &[1.0, 1.0, 1.0])
}

impl ImageTransform for SumDiff {
    fn name(&self) -> &'static str {
        self.name
    }

    fn required_channels(&self) -> usize {
        3
    }

    fn compute(
        &self,
        source: &Image,
        options: &TransformOptions,
        cache: &ArrayCache,
    ) -> TransformResult<Image> {
        let arrays = cache.channel_arrays(source);
        let score = dispersion(arrays.red(), arrays.green(), arrays.blue());
        emit_single(source, source.data_type(), score, options.replicate_channels)
    }
}
