//! Parameter bag shared by every transform.
//!
//! `TransformOptions` is long-lived: the UI or a batch-series configuration
//! mutates it and reuses it across frames. Every field has a default so
//! partial JSON documents load.

use std::sync::Arc;

use palette::Srgb;
use serde::{Deserialize, Serialize};

use crate::image::Image;
use crate::registry::TransformKey;

/// Polarity of the single-value threshold mask.
///
/// The overlay paints "on" pixels, so `Greater` highlights the side at or
/// below the threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThresholdDirection {
    /// Values strictly above the threshold are off; all others are on.
    #[default]
    Greater,
    /// Values strictly above the threshold are on; all others are off.
    Lesser,
}

impl ThresholdDirection {
    pub const fn flipped(self) -> Self {
        match self {
            Self::Greater => Self::Lesser,
            Self::Lesser => Self::Greater,
        }
    }
}

/// Color distance used by the palette threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceMetric {
    /// Sum of absolute channel differences.
    #[default]
    L1,
    /// Euclidean distance.
    L2,
}

impl DistanceMetric {
    pub fn distance(self, a: [f64; 3], b: [f64; 3]) -> f64 {
        match self {
            Self::L1 => (a[0] - b[0]).abs() + (a[1] - b[1]).abs() + (a[2] - b[2]).abs(),
            Self::L2 => {
                let d = [a[0] - b[0], a[1] - b[1], a[2] - b[2]];
                (d[0] * d[0] + d[1] * d[1] + d[2] * d[2]).sqrt()
            }
        }
    }
}

/// Options read by transforms. Each transform reads only the fields it needs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransformOptions {
    /// Threshold for mask transforms, conventionally in `[0, 255]`.
    pub threshold: i32,
    /// Polarity of the single-value threshold.
    pub direction: ThresholdDirection,
    /// Threshold transform applied to the primary output by
    /// [`TransformRegistry::apply`](crate::registry::TransformRegistry::apply).
    pub composite: Option<TransformKey>,
    /// Reference frame for background subtraction. Runtime only.
    #[serde(skip)]
    pub background: Option<Arc<Image>>,
    /// Target colors for the palette threshold.
    pub palette: Vec<Srgb<u8>>,
    /// Distance used against `palette`.
    pub distance: DistanceMetric,
    /// Per-channel weights for the `custom_weights` combination.
    pub weights: [f64; 3],
    /// Window of the finite-difference operators. Default: 5.
    pub span_diff: usize,
    /// Column subtracted from every row by the column subtraction.
    pub reference_column: usize,
    /// Copy a single computed channel into all three output planes.
    pub replicate_channels: bool,
}

impl Default for TransformOptions {
    fn default() -> Self {
        Self {
            threshold: 128,
            direction: ThresholdDirection::Greater,
            composite: None,
            background: None,
            palette: Vec::new(),
            distance: DistanceMetric::L1,
            weights: [1.0, 1.0, 1.0],
            span_diff: 5,
            reference_column: 0,
            replicate_channels: true,
        }
    }
}

impl TransformOptions {
    /// Load options from a JSON document. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Serialize the persistent fields. The background image is not written.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn with_background(mut self, background: Image) -> Self {
        self.background = Some(Arc::new(background));
        self
    }
}
