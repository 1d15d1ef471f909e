//! The "none" entry: shows the source unchanged.

use crate::cache::ArrayCache;
use crate::error::TransformResult;
use crate::image::Image;
use crate::options::TransformOptions;
use crate::transform::base::ImageTransform;

/// Copy of the source with every channel and the data type preserved.
#[derive(Debug, Clone, Copy)]
pub struct Passthrough {
    name: &'static str,
}

impl Passthrough {
    pub const fn new(name: &'static str) -> Self {
        Self { name }
    }
}

impl ImageTransform for Passthrough {
    fn name(&self) -> &'static str {
        self.name
    }

    fn output_channels(&self, source: &Image) -> usize {
        source.channel_count()
    }

    fn compute(
        &self,
        source: &Image,
        _options: &TransformOptions,
        _cache: &ArrayCache,
    ) -> TransformResult<Image> {
        Ok(source.clone())
    }
}
