//! Fixed catalog of transforms, addressed by key or display label.
//!
//! [`TransformKey`] is the closed set of catalog entries. Its `build` match is
//! exhaustive, so adding a key without a transform does not compile.
//! [`TransformRegistry`] instantiates every entry once; entries are stateless
//! and shared by all callers.

use serde::{Deserialize, Serialize};

use crate::cache::ArrayCache;
use crate::error::{Step, TransformError, TransformResult};
use crate::image::Image;
use crate::options::TransformOptions;
use crate::transform::base::ImageTransform;
use crate::transform::color_space::{ColorModel, ColorSpaceProjection};
use crate::transform::column_sort::{ColumnSort, SortKey};
use crate::transform::deriche::{DEFAULT_ALPHA, Deriche};
use crate::transform::difference::{Axis, FiniteDifference};
use crate::transform::linear::{LinearCombination, SumDiff};
use crate::transform::passthrough::Passthrough;
use crate::transform::subtract::{RemoveHorizontalAverage, SubtractBackground, SubtractColumn};
use crate::transform::threshold::{ThresholdColors, ThresholdSingle};

/// A key string that names no catalog entry.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown transform key `{0}`")]
pub struct UnknownTransformKey(pub String);

/// Catalog entry. Serializes as its [`id`](TransformKey::id).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "&'static str", try_from = "String")]
pub enum TransformKey {
    Passthrough,
    RedChannel,
    GreenChannel,
    BlueChannel,
    R2MinusGB,
    G2MinusRB,
    B2MinusRG,
    GBMinus2R,
    RBMinus2G,
    RGMinus2B,
    Grey,
    CustomWeights,
    RgbDiffs,
    Hsb,
    HueHsb,
    SaturationHsb,
    BrightnessHsb,
    Hsv,
    HueHsv,
    SaturationHsv,
    ValueHsv,
    Deriche,
    DericheGrey,
    XDiff,
    YDiff,
    XYDiff,
    SubtractColumn,
    SubtractBackground,
    RemoveHorizontalAverage,
    SortChan0Columns,
    SortSumDiffColumns,
    ThresholdSingle,
    ThresholdColors,
}

impl TransformKey {
    /// Every key, in catalog (menu) order.
    pub const ALL: [Self; 33] = [
        Self::Passthrough,
        Self::RedChannel,
        Self::GreenChannel,
        Self::BlueChannel,
        Self::R2MinusGB,
        Self::G2MinusRB,
        Self::B2MinusRG,
        Self::GBMinus2R,
        Self::RBMinus2G,
        Self::RGMinus2B,
        Self::Grey,
        Self::CustomWeights,
        Self::RgbDiffs,
        Self::Hsb,
        Self::HueHsb,
        Self::SaturationHsb,
        Self::BrightnessHsb,
        Self::Hsv,
        Self::HueHsv,
        Self::SaturationHsv,
        Self::ValueHsv,
        Self::Deriche,
        Self::DericheGrey,
        Self::XDiff,
        Self::YDiff,
        Self::XYDiff,
        Self::SubtractColumn,
        Self::SubtractBackground,
        Self::RemoveHorizontalAverage,
        Self::SortChan0Columns,
        Self::SortSumDiffColumns,
        Self::ThresholdSingle,
        Self::ThresholdColors,
    ];

    /// Stable identifier used in configuration files and errors.
    pub const fn id(self) -> &'static str {
        match self {
            Self::Passthrough => "none",
            Self::RedChannel => "r_rgb",
            Self::GreenChannel => "g_rgb",
            Self::BlueChannel => "b_rgb",
            Self::R2MinusGB => "r2_minus_gb",
            Self::G2MinusRB => "g2_minus_rb",
            Self::B2MinusRG => "b2_minus_rg",
            Self::GBMinus2R => "gb_minus_2r",
            Self::RBMinus2G => "rb_minus_2g",
            Self::RGMinus2B => "rg_minus_2b",
            Self::Grey => "grey",
            Self::CustomWeights => "custom_weights",
            Self::RgbDiffs => "rgb_diffs",
            Self::Hsb => "hsb",
            Self::HueHsb => "h_hsb",
            Self::SaturationHsb => "s_hsb",
            Self::BrightnessHsb => "b_hsb",
            Self::Hsv => "hsv",
            Self::HueHsv => "h_hsv",
            Self::SaturationHsv => "s_hsv",
            Self::ValueHsv => "v_hsv",
            Self::Deriche => "deriche",
            Self::DericheGrey => "deriche_grey",
            Self::XDiff => "x_diff",
            Self::YDiff => "y_diff",
            Self::XYDiff => "xy_diff",
            Self::SubtractColumn => "subtract_column",
            Self::SubtractBackground => "subtract_background",
            Self::RemoveHorizontalAverage => "remove_horizontal_average",
            Self::SortChan0Columns => "sort_chan0_columns",
            Self::SortSumDiffColumns => "sort_sumdiff_columns",
            Self::ThresholdSingle => "threshold_single",
            Self::ThresholdColors => "threshold_colors",
        }
    }

    /// Human-readable label for menus.
    pub const fn label(self) -> &'static str {
        match self {
            Self::Passthrough => "none",
            Self::RedChannel => "R(RGB)",
            Self::GreenChannel => "G(RGB)",
            Self::BlueChannel => "B(RGB)",
            Self::R2MinusGB => "2R-(G+B)",
            Self::G2MinusRB => "2G-(R+B)",
            Self::B2MinusRG => "2B-(R+G)",
            Self::GBMinus2R => "(G+B)-2R",
            Self::RBMinus2G => "(R+B)-2G",
            Self::RGMinus2B => "(R+G)-2B",
            Self::Grey => "(R+G+B)/3",
            Self::CustomWeights => "custom weights",
            Self::RgbDiffs => "|R-G|+|R-B|+|G-B|",
            Self::Hsb => "HSB",
            Self::HueHsb => "H(HSB)",
            Self::SaturationHsb => "S(HSB)",
            Self::BrightnessHsb => "B(HSB)",
            Self::Hsv => "HSV",
            Self::HueHsv => "H(HSV)",
            Self::SaturationHsv => "S(HSV)",
            Self::ValueHsv => "V(HSV)",
            Self::Deriche => "edges (Deriche)",
            Self::DericheGrey => "edges (Deriche, grey)",
            Self::XDiff => "X diff",
            Self::YDiff => "Y diff",
            Self::XYDiff => "XY diff",
            Self::SubtractColumn => "subtract column",
            Self::SubtractBackground => "subtract background",
            Self::RemoveHorizontalAverage => "remove horizontal average",
            Self::SortChan0Columns => "sort columns by channel 0",
            Self::SortSumDiffColumns => "sort columns by color dispersion",
            Self::ThresholdSingle => "threshold",
            Self::ThresholdColors => "threshold colors",
        }
    }

    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.id() == id)
    }

    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.label() == label)
    }

    /// Whether this key produces a mask and can serve as a composite pass.
    pub const fn is_threshold(self) -> bool {
        matches!(self, Self::ThresholdSingle | Self::ThresholdColors)
    }

    /// A fresh instance of this entry's transform.
    pub fn build(self) -> Box<dyn ImageTransform> {
        let name = self.id();
        match self {
            Self::Passthrough => Box::new(Passthrough::new(name)),
            Self::RedChannel => Box::new(LinearCombination::new(name, [1.0, 0.0, 0.0])),
            Self::GreenChannel => Box::new(LinearCombination::new(name, [0.0, 1.0, 0.0])),
            Self::BlueChannel => Box::new(LinearCombination::new(name, [0.0, 0.0, 1.0])),
            Self::R2MinusGB => Box::new(LinearCombination::new(name, [2.0, -1.0, -1.0])),
            Self::G2MinusRB => Box::new(LinearCombination::new(name, [-1.0, 2.0, -1.0])),
            Self::B2MinusRG => Box::new(LinearCombination::new(name, [-1.0, -1.0, 2.0])),
            Self::GBMinus2R => Box::new(LinearCombination::new(name, [-2.0, 1.0, 1.0])),
            Self::RBMinus2G => Box::new(LinearCombination::new(name, [1.0, -2.0, 1.0])),
            Self::RGMinus2B => Box::new(LinearCombination::new(name, [1.0, 1.0, -2.0])),
            Self::Grey => Box::new(LinearCombination::new(name, [1.0 / 3.0; 3])),
            Self::CustomWeights => Box::new(LinearCombination::from_options(name)),
            Self::RgbDiffs => Box::new(SumDiff::new(name)),
            Self::Hsb => Box::new(ColorSpaceProjection::new(name, ColorModel::Hsb, None)),
            Self::HueHsb => Box::new(ColorSpaceProjection::new(name, ColorModel::Hsb, Some(0))),
            Self::SaturationHsb => {
                Box::new(ColorSpaceProjection::new(name, ColorModel::Hsb, Some(1)))
            }
            Self::BrightnessHsb => {
                Box::new(ColorSpaceProjection::new(name, ColorModel::Hsb, Some(2)))
            }
            Self::Hsv => Box::new(ColorSpaceProjection::new(name, ColorModel::Hsv, None)),
            Self::HueHsv => Box::new(ColorSpaceProjection::new(name, ColorModel::Hsv, Some(0))),
            Self::SaturationHsv => {
                Box::new(ColorSpaceProjection::new(name, ColorModel::Hsv, Some(1)))
            }
            Self::ValueHsv => Box::new(ColorSpaceProjection::new(name, ColorModel::Hsv, Some(2))),
            Self::Deriche => Box::new(Deriche::new(name, DEFAULT_ALPHA, false)),
            Self::DericheGrey => Box::new(Deriche::new(name, DEFAULT_ALPHA, true)),
            Self::XDiff => Box::new(FiniteDifference::new(name, Axis::X)),
            Self::YDiff => Box::new(FiniteDifference::new(name, Axis::Y)),
            Self::XYDiff => Box::new(FiniteDifference::new(name, Axis::XY)),
            Self::SubtractColumn => Box::new(SubtractColumn::new(name)),
            Self::SubtractBackground => Box::new(SubtractBackground::new(name)),
            Self::RemoveHorizontalAverage => Box::new(RemoveHorizontalAverage::new(name)),
            Self::SortChan0Columns => Box::new(ColumnSort::new(name, SortKey::Intensity)),
            Self::SortSumDiffColumns => Box::new(ColumnSort::new(name, SortKey::Dispersion)),
            Self::ThresholdSingle => Box::new(ThresholdSingle::new(name)),
            Self::ThresholdColors => Box::new(ThresholdColors::new(name)),
        }
    }
}

impl From<TransformKey> for &'static str {
    fn from(key: TransformKey) -> Self {
        key.id()
    }
}

impl TryFrom<String> for TransformKey {
    type Error = UnknownTransformKey;

    fn try_from(id: String) -> Result<Self, Self::Error> {
        Self::from_id(&id).ok_or(UnknownTransformKey(id))
    }
}

impl std::fmt::Display for TransformKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.id())
    }
}

/// Every catalog transform, built once.
pub struct TransformRegistry {
    entries: Vec<(TransformKey, Box<dyn ImageTransform>)>,
}

impl TransformRegistry {
    pub fn new() -> Self {
        let entries: Vec<_> = TransformKey::ALL.into_iter().map(|k| (k, k.build())).collect();
        tracing::info!("Transform registry built with {} entries", entries.len());
        Self { entries }
    }

    pub fn get(&self, key: TransformKey) -> &dyn ImageTransform {
        // Entries are stored in `ALL` order, which matches declaration order.
        self.entries[key as usize].1.as_ref()
    }

    pub fn by_label(&self, label: &str) -> Option<&dyn ImageTransform> {
        TransformKey::from_label(label).map(|key| self.get(key))
    }

    pub fn keys(&self) -> impl Iterator<Item = TransformKey> + '_ {
        self.entries.iter().map(|(key, _)| *key)
    }

    pub fn labels(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.keys().map(TransformKey::label)
    }

    /// Run `key`, then the composite threshold from `options`, if any.
    ///
    /// A composite that is not a threshold is rejected before any pixel work,
    /// after the missing-image check.
    pub fn apply(
        &self,
        key: TransformKey,
        image: Option<&Image>,
        options: Option<&TransformOptions>,
        cache: &ArrayCache,
    ) -> TransformResult<Image> {
        let composite = options.and_then(|o| o.composite);
        if let (Some(_), Some(second)) = (image, composite.filter(|k| !k.is_threshold())) {
            return Err(TransformError::invalid_parameter(format!(
                "composite `{second}` is not a threshold transform"
            ))
            .within(key.id(), Step::Validate));
        }

        let primary = self.get(key).transform(image, options, cache)?;
        match composite {
            Some(second) => {
                tracing::debug!("{key}: composite pass through {second}");
                self.get(second).transform(Some(&primary), options, cache)
            }
            None => Ok(primary),
        }
    }
}

impl Default for TransformRegistry {
    fn default() -> Self {
        Self::new()
    }
}
