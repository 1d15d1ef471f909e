//! Kymoscope Core: per-image transform pipeline for kymograph analysis.
//!
//! Converts a raw multi-channel raster into a derived representation: edge
//! maps, channel combinations, HSB/HSV projections, column-sorted kymographs
//! and thresholded masks. Transforms are stateless and pure; the only shared
//! mutable state is the [`ArrayCache`] passed in by the caller.
//!
//! ```no_run
//! use kymoscope_core::{ArrayCache, Image, TransformKey, TransformOptions, TransformRegistry};
//!
//! let registry = TransformRegistry::new();
//! let cache = ArrayCache::default();
//! let frame = Image::new(64, 48, 3, kymoscope_core::DataType::U8);
//! let options = TransformOptions::default();
//! let edges = registry.apply(TransformKey::DericheGrey, Some(&frame), Some(&options), &cache);
//! ```

pub mod cache;
pub mod error;
pub mod image;
pub mod options;
pub mod registry;
pub mod transform;

// Re-exports for convenience.
pub use cache::{ArrayCache, CacheConfig, CacheStats};
pub use error::{ErrorKind, ImageError, Step, TransformError, TransformResult};
pub use crate::image::{DataType, Image, PixelBuffer};
pub use options::{DistanceMetric, ThresholdDirection, TransformOptions};
pub use registry::{TransformKey, TransformRegistry};
pub use transform::base::ImageTransform;
