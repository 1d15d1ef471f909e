//! Column-wise row sorting for kymographs.
//!
//! Each column of a time-stacked image is reordered so rows with the
//! strongest key come first, clustering "signal present" rows at the top.
//! Every channel of a column is permuted with the same row order, so the
//! output is a per-column permutation of the input.
//!
//! Rows with equal keys keep their original relative order.

use crate::cache::ArrayCache;
use crate::error::TransformResult;
use crate::image::Image;
use crate::options::TransformOptions;
use crate::transform::base::ImageTransform;
use crate::transform::linear::dispersion;

/// Per-pixel sort key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    /// Channel 0 value.
    Intensity,
    /// `|R-G| + |R-B| + |G-B|`.
    Dispersion,
}

/// Sort every column's rows by descending key.
#[derive(Debug, Clone, Copy)]
pub struct ColumnSort {
    name: &'static str,
    key: SortKey,
}

impl ColumnSort {
    pub const fn new(name: &'static str, key: SortKey) -> Self {
        Self { name, key }
    }
}

/// Row order of one column: indices into `0..height`, descending by key.
fn column_order(keys: &[f64], x: usize, width: usize, height: usize) -> Vec<usize> {
    let mut rows: Vec<usize> = (0..height).collect();
    // `sort_by` is stable, so equal keys stay in row order.
    rows.sort_by(|&a, &b| keys[b * width + x].total_cmp(&keys[a * width + x]));
    rows
}

impl ImageTransform for ColumnSort {
    fn name(&self) -> &'static str {
        self.name
    }

    fn required_channels(&self) -> usize {
        match self.key {
            SortKey::Intensity => 1,
            SortKey::Dispersion => 3,
        }
    }

    fn output_channels(&self, source: &Image) -> usize {
        source.channel_count()
    }

    fn compute(
        &self,
        source: &Image,
        _options: &TransformOptions,
        cache: &ArrayCache,
    ) -> TransformResult<Image> {
        let arrays = cache.channel_arrays(source);
        let keys = match self.key {
            SortKey::Intensity => arrays.red().to_vec(),
            SortKey::Dispersion => dispersion(arrays.red(), arrays.green(), arrays.blue()),
        };

        let (width, height) = (source.width() as usize, source.height() as usize);
        let inputs: Vec<Vec<f64>> = (0..source.channel_count())
            .map(|c| source.channel_f64(c).unwrap_or_default())
            .collect();
        let mut outputs: Vec<Vec<f64>> = inputs.iter().map(|p| vec![0.0; p.len()]).collect();

        for x in 0..width {
            let order = column_order(&keys, x, width, height);
            for (dst_row, &src_row) in order.iter().enumerate() {
                let (dst, src) = (dst_row * width + x, src_row * width + x);
                for (out, input) in outputs.iter_mut().zip(&inputs) {
                    out[dst] = input[src];
                }
            }
        }

        Ok(Image::from_f64_planes(source.width(), source.height(), source.data_type(), &outputs)?)
    }
}
