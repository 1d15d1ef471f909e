//! Drift and background removal.

use crate::cache::{ArrayCache, abs_difference, difference};
use crate::error::{TransformError, TransformResult};
use crate::image::Image;
use crate::options::TransformOptions;
use crate::transform::base::{ImageTransform, emit_planes};
use crate::transform::threshold::check_threshold;

/// `|p(x, y) − p(reference_column, y)|` per channel.
///
/// Flattens drift that is constant along each row.
#[derive(Debug, Clone, Copy)]
pub struct SubtractColumn {
    name: &'static str,
}

impl SubtractColumn {
    pub const fn new(name: &'static str) -> Self {
        Self { name }
    }
}

impl ImageTransform for SubtractColumn {
    fn name(&self) -> &'static str {
        self.name
    }

    fn validate(&self, source: &Image, options: &TransformOptions) -> TransformResult<()> {
        if options.reference_column >= source.width() as usize {
            return Err(TransformError::invalid_parameter(format!(
                "reference column {} is outside a {}-pixel-wide image",
                options.reference_column,
                source.width()
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
        let width = source.width() as usize;
        let column = options.reference_column;

        let planes: Vec<Vec<f64>> = arrays
            .planes()
            .iter()
            .map(|plane| {
                let reference: Vec<f64> = plane
                    .chunks_exact(width)
                    .flat_map(|row| std::iter::repeat_n(row[column], width))
                    .collect();
                abs_difference(plane, &reference)
            })
            .collect();
        emit_planes(source, source.data_type(), &planes)
    }
}

/// Binarize `image − background` per channel.
///
/// A sample whose difference from the background is below the threshold is
/// foreground and set to the type's nominal maximum; everything else is 0.
#[derive(Debug, Clone, Copy)]
pub struct SubtractBackground {
    name: &'static str,
}

impl SubtractBackground {
    pub const fn new(name: &'static str) -> Self {
        Self { name }
    }
}

impl ImageTransform for SubtractBackground {
    fn name(&self) -> &'static str {
        self.name
    }

    fn validate(&self, source: &Image, options: &TransformOptions) -> TransformResult<()> {
        let background = options
            .background
            .as_deref()
            .ok_or_else(|| TransformError::null_input("background image is missing"))?;
        if background.width() != source.width() || background.height() != source.height() {
            return Err(TransformError::incompatible(format!(
                "background is {}x{}, image is {}x{}",
                background.width(),
                background.height(),
                source.width(),
                source.height()
            )));
        }
        check_threshold(options.threshold)
    }

    fn compute(
        &self,
        source: &Image,
        options: &TransformOptions,
        cache: &ArrayCache,
    ) -> TransformResult<Image> {
        let background = options
            .background
            .as_deref()
            .ok_or_else(|| TransformError::null_input("background image is missing"))?;
        let image_arrays = cache.channel_arrays(source);
        let background_arrays = cache.channel_arrays(background);
        let on = source.data_type().nominal_max();
        let threshold = f64::from(options.threshold);

        let planes: Vec<Vec<f64>> = image_arrays
            .planes()
            .iter()
            .zip(background_arrays.planes())
            .map(|(plane, bg)| {
                difference(plane, bg)
                    .into_iter()
                    .map(|d| if d < threshold { on } else { 0.0 })
                    .collect()
            })
            .collect();
        emit_planes(source, source.data_type(), &planes)
    }
}

/// Subtract each row's mean from the row, per channel.
#[derive(Debug, Clone, Copy)]
pub struct RemoveHorizontalAverage {
    name: &'static str,
}

impl RemoveHorizontalAverage {
    pub const fn new(name: &'static str) -> Self {
        Self { name }
    }
}

impl ImageTransform for RemoveHorizontalAverage {
    fn name(&self) -> &'static str {
        self.name
    }

    fn compute(
        &self,
        source: &Image,
        _options: &TransformOptions,
        cache: &ArrayCache,
    ) -> TransformResult<Image> {
        let arrays = cache.channel_arrays(source);
        let width = source.width() as usize;

        let planes: Vec<Vec<f64>> = arrays
            .planes()
            .iter()
            .map(|plane| {
                plane
                    .chunks_exact(width)
                    .flat_map(|row| {
                        let mean = row.iter().sum::<f64>() / width as f64;
                        row.iter().map(move |v| v - mean)
                    })
                    .collect()
            })
            .collect();
        emit_planes(source, source.data_type(), &planes)
    }
}
