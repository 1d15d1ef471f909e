//! RGB to HSB / HSV projections.
//!
//! Both emit `F32` planes scaled ×100 so threshold controls work on
//! `[0, 100]`. Inputs are normalized by the source type's nominal maximum.
//!
//! The two differ on achromatic pixels: HSB reports hue 0, HSV reports
//! [`HUE_UNDEFINED`], which is never rescaled.

use crate::cache::ArrayCache;
use crate::error::{TransformError, TransformResult};
use crate::image::{DataType, Image};
use crate::options::TransformOptions;
use crate::transform::base::{ImageTransform, emit_planes, emit_single};

/// Hue of a pixel with zero saturation in the HSV projection.
pub const HUE_UNDEFINED: f64 = -1.0;

/// Scale applied to every output channel.
const OUTPUT_SCALE: f64 = 100.0;

/// HSB as computed by `java.awt.Color.RGBtoHSB`, all components in `[0, 1]`.
pub fn rgb_to_hsb(r: f64, g: f64, b: f64) -> [f64; 3] {
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let brightness = max;
    let saturation = if max != 0.0 { (max - min) / max } else { 0.0 };
    if saturation == 0.0 {
        return [0.0, saturation, brightness];
    }

    let span = max - min;
    let red_c = (max - r) / span;
    let green_c = (max - g) / span;
    let blue_c = (max - b) / span;
    let mut hue = if r == max {
        blue_c - green_c
    } else if g == max {
        2.0 + red_c - blue_c
    } else {
        4.0 + green_c - red_c
    };
    hue /= 6.0;
    if hue < 0.0 {
        hue += 1.0;
    }
    [hue, saturation, brightness]
}

/// Classic max/min/delta HSV. Hue in `[0, 1)` or [`HUE_UNDEFINED`].
pub fn rgb_to_hsv(r: f64, g: f64, b: f64) -> [f64; 3] {
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;
    let value = max;
    let saturation = if max != 0.0 { delta / max } else { 0.0 };
    if saturation == 0.0 {
        return [HUE_UNDEFINED, saturation, value];
    }

    let sector = if r == max {
        (g - b) / delta
    } else if g == max {
        2.0 + (b - r) / delta
    } else {
        4.0 + (r - g) / delta
    };
    let mut degrees = sector * 60.0;
    if degrees < 0.0 {
        degrees += 360.0;
    }
    [degrees / 360.0, saturation, value]
}

/// Which conversion a [`ColorSpaceProjection`] applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorModel {
    Hsb,
    Hsv,
}

/// Per-pixel RGB → HSB/HSV.
///
/// `channel_out` keeps one component (replicated per
/// [`TransformOptions::replicate_channels`]); `None` keeps all three.
#[derive(Debug, Clone, Copy)]
pub struct ColorSpaceProjection {
    name: &'static str,
    model: ColorModel,
    channel_out: Option<usize>,
}

impl ColorSpaceProjection {
    pub const fn new(name: &'static str, model: ColorModel, channel_out: Option<usize>) -> Self {
        Self {
            name,
            model,
            channel_out,
        }
    }
}

impl ImageTransform for ColorSpaceProjection {
    fn name(&self) -> &'static str {
        self.name
    }

    fn required_channels(&self) -> usize {
        3
    }

    fn validate(&self, _source: &Image, _options: &TransformOptions) -> TransformResult<()> {
        match self.channel_out {
            Some(c) if c > 2 => Err(TransformError::invalid_parameter(format!(
                "channel_out {c} is not one of 0, 1, 2"
            ))),
            _ => Ok(()),
        }
    }

    fn compute(
        &self,
        source: &Image,
        options: &TransformOptions,
        cache: &ArrayCache,
    ) -> TransformResult<Image> {
        let arrays = cache.channel_arrays(source);
        let scale = source.data_type().nominal_max();
        let convert = match self.model {
            ColorModel::Hsb => rgb_to_hsb,
            ColorModel::Hsv => rgb_to_hsv,
        };
        let normalize = |v: f64| (v / scale).clamp(0.0, 1.0);

        let n = source.pixel_count();
        let mut planes = [vec![0.0; n], vec![0.0; n], vec![0.0; n]];
        for i in 0..n {
            let components = convert(
                normalize(arrays.red()[i]),
                normalize(arrays.green()[i]),
                normalize(arrays.blue()[i]),
            );
            for (plane, value) in planes.iter_mut().zip(components) {
                plane[i] = value;
            }
        }

        match self.channel_out {
            Some(c) => {
                let kept = planes.into_iter().nth(c).unwrap_or_default();
                emit_single(source, DataType::F32, kept, options.replicate_channels)
            }
            None => emit_planes(source, DataType::F32, &planes),
        }
    }

    fn post_process(&self, output: Image, _options: &TransformOptions) -> TransformResult<Image> {
        let planes: Vec<Vec<f64>> = output
            .channels()
            .iter()
            .map(|channel| {
                channel
                    .to_f64_vec()
                    .into_iter()
                    .map(|v| if v == HUE_UNDEFINED { v } else { v * OUTPUT_SCALE })
                    .collect()
            })
            .collect();
        Ok(Image::from_f64_planes(output.width(), output.height(), DataType::F32, &planes)?)
    }
}
