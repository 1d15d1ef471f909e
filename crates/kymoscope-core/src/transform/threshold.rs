//! Binary masks: single-value and color-palette thresholds.
//!
//! Masks are single-channel `U8`, [`MASK_ON`] for selected pixels and
//! [`MASK_OFF`] elsewhere.

use crate::cache::ArrayCache;
use crate::error::{TransformError, TransformResult};
use crate::image::{DataType, Image};
use crate::options::{ThresholdDirection, TransformOptions};
use crate::transform::base::ImageTransform;

pub const MASK_ON: f64 = 255.0;
pub const MASK_OFF: f64 = 0.0;

/// Accepted threshold range.
pub const THRESHOLD_RANGE: (i32, i32) = (0, 255);

pub(crate) fn check_threshold(threshold: i32) -> TransformResult<()> {
    let (lo, hi) = THRESHOLD_RANGE;
    if !(lo..=hi).contains(&threshold) {
        return Err(TransformError::invalid_parameter(format!(
            "threshold {threshold} is outside [{lo}, {hi}]"
        )));
    }
    Ok(())
}

fn mask(source: &Image, values: Vec<f64>) -> TransformResult<Image> {
    Ok(Image::from_f64_planes(source.width(), source.height(), DataType::U8, &[values])?)
}

/// Compare channel 0 against the threshold.
///
/// Under [`ThresholdDirection::Greater`] a value strictly above the
/// threshold is *off* and every other value is *on*; `Lesser` swaps the two.
/// The overlay paints the on pixels, so `Greater` highlights the dim side.
#[derive(Debug, Clone, Copy)]
pub struct ThresholdSingle {
    name: &'static str,
}

impl ThresholdSingle {
    pub const fn new(name: &'static str) -> Self {
        Self { name }
    }
}

impl ImageTransform for ThresholdSingle {
    fn name(&self) -> &'static str {
        self.name
    }

    fn output_channels(&self, _source: &Image) -> usize {
        1
    }

    fn validate(&self, _source: &Image, options: &TransformOptions) -> TransformResult<()> {
        check_threshold(options.threshold)
    }

    fn compute(
        &self,
        source: &Image,
        options: &TransformOptions,
        cache: &ArrayCache,
    ) -> TransformResult<Image> {
        let (above, other) = match options.direction {
            ThresholdDirection::Greater => (MASK_OFF, MASK_ON),
            ThresholdDirection::Lesser => (MASK_ON, MASK_OFF),
        };
        let threshold = f64::from(options.threshold);
        let arrays = cache.channel_arrays(source);
        let values = arrays
            .plane(0)
            .iter()
            .map(|&v| if v > threshold { above } else { other })
            .collect();
        mask(source, values)
    }
}

/// Select pixels close to any palette color.
///
/// A pixel is on when its distance to some palette entry, under
/// [`TransformOptions::distance`], is at most the threshold. Distances are
/// measured on raw channel values against the palette's 8-bit components.
#[derive(Debug, Clone, Copy)]
pub struct ThresholdColors {
    name: &'static str,
}

impl ThresholdColors {
    pub const fn new(name: &'static str) -> Self {
        Self { name }
    }
}

impl ImageTransform for ThresholdColors {
    fn name(&self) -> &'static str {
        self.name
    }

    fn required_channels(&self) -> usize {
        3
    }

    fn output_channels(&self, _source: &Image) -> usize {
        1
    }

    fn validate(&self, _source: &Image, options: &TransformOptions) -> TransformResult<()> {
        if options.palette.is_empty() {
            return Err(TransformError::invalid_parameter("palette is empty"));
        }
        check_threshold(options.threshold)
    }

    fn compute(
        &self,
        source: &Image,
        options: &TransformOptions,
        cache: &ArrayCache,
    ) -> TransformResult<Image> {
        let targets: Vec<[f64; 3]> = options
            .palette
            .iter()
            .map(|c| [f64::from(c.red), f64::from(c.green), f64::from(c.blue)])
            .collect();
        let threshold = f64::from(options.threshold);
        let metric = options.distance;
        let arrays = cache.channel_arrays(source);

        let values = (0..source.pixel_count())
            .map(|i| {
                let pixel = [arrays.red()[i], arrays.green()[i], arrays.blue()[i]];
                let hit = targets.iter().any(|&t| metric.distance(pixel, t) <= threshold);
                if hit { MASK_ON } else { MASK_OFF }
            })
            .collect();
        mask(source, values)
    }
}
