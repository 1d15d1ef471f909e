//! Memoized channel extraction and the elementwise helpers built on it.
//!
//! Batch detection on worker threads and interactive previews both pull
//! channel arrays for the same frames, so the cache is shared by reference
//! and guarded by a read-write lock. It never evicts: once `max_entries` is
//! reached new extractions are returned uncached, and the caller clears the
//! cache between unrelated sessions.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::image::Image;

/// Bounds on what the cache retains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum number of cached images.
    pub max_entries: usize,
    /// Only images with fewer pixels than this are cached.
    pub max_cacheable_pixels: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 32,
            max_cacheable_pixels: 4096 * 4096,
        }
    }
}

/// Identity plus shape of the image an extraction was taken from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint {
    pub id: u64,
    pub width: u32,
    pub height: u32,
    pub channels: usize,
}

impl Fingerprint {
    pub fn of(image: &Image) -> Self {
        Self {
            id: image.id(),
            width: image.width(),
            height: image.height(),
            channels: image.channel_count(),
        }
    }
}

/// The first three channels of an image widened to `f64`.
///
/// Channels the source does not have are zero-filled, so RGB transforms
/// can index all three planes unconditionally.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelArrays {
    planes: [Vec<f64>; 3],
    source_channels: usize,
}

impl ChannelArrays {
    /// Extract without caching.
    pub fn extract(image: &Image) -> Self {
        let len = image.pixel_count();
        let plane = |c: usize| image.channel_f64(c).unwrap_or_else(|| vec![0.0; len]);
        Self {
            planes: [plane(0), plane(1), plane(2)],
            source_channels: image.channel_count(),
        }
    }

    pub fn planes(&self) -> &[Vec<f64>; 3] {
        &self.planes
    }

    pub fn plane(&self, channel: usize) -> &[f64] {
        &self.planes[channel.min(2)]
    }

    pub fn red(&self) -> &[f64] {
        &self.planes[0]
    }

    pub fn green(&self) -> &[f64] {
        &self.planes[1]
    }

    pub fn blue(&self) -> &[f64] {
        &self.planes[2]
    }

    /// Channel count of the image the planes came from.
    pub fn source_channels(&self) -> usize {
        self.source_channels
    }
}

struct CacheEntry {
    fingerprint: Fingerprint,
    arrays: Arc<ChannelArrays>,
}

/// Counters describing cache effectiveness since construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub bypassed: u64,
    pub entries: usize,
}

/// Thread-safe cache of per-image channel arrays.
pub struct ArrayCache {
    config: CacheConfig,
    entries: RwLock<HashMap<u64, CacheEntry>>,
    hits: AtomicU64,
    misses: AtomicU64,
    bypassed: AtomicU64,
    full_reported: AtomicBool,
}

impl Default for ArrayCache {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

impl ArrayCache {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config,
            entries: RwLock::new(HashMap::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            bypassed: AtomicU64::new(0),
            full_reported: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> CacheConfig {
        self.config
    }

    /// Up to three channel arrays of `image`, zero-filled for missing channels.
    ///
    /// A cached entry is reused only when its fingerprint matches the image's
    /// identity, dimensions and channel count; a mismatching entry under the
    /// same identity is replaced.
    pub fn channel_arrays(&self, image: &Image) -> Arc<ChannelArrays> {
        let fingerprint = Fingerprint::of(image);

        if image.pixel_count() >= self.config.max_cacheable_pixels {
            self.bypassed.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(
                "ArrayCache: bypassing {}x{} image ({} px at or over ceiling)",
                fingerprint.width,
                fingerprint.height,
                image.pixel_count()
            );
            return Arc::new(ChannelArrays::extract(image));
        }

        if let Some(entry) = self.entries.read().get(&fingerprint.id) {
            if entry.fingerprint == fingerprint {
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Arc::clone(&entry.arrays);
            }
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        let arrays = Arc::new(ChannelArrays::extract(image));

        let mut entries = self.entries.write();
        let len = entries.len();
        match entries.get_mut(&fingerprint.id) {
            Some(entry) => {
                tracing::debug!(
                    "ArrayCache: stale fingerprint for image {}, replacing",
                    fingerprint.id
                );
                entry.fingerprint = fingerprint;
                entry.arrays = Arc::clone(&arrays);
            }
            None if len < self.config.max_entries => {
                entries.insert(
                    fingerprint.id,
                    CacheEntry {
                        fingerprint,
                        arrays: Arc::clone(&arrays),
                    },
                );
            }
            None => {
                if !self.full_reported.swap(true, Ordering::Relaxed) {
                    tracing::warn!(
                        "ArrayCache: full at {} entries, new extractions are not cached",
                        self.config.max_entries
                    );
                }
            }
        }

        arrays
    }

    /// Drop the entry for one image identity. Returns whether one existed.
    pub fn invalidate(&self, image_id: u64) -> bool {
        self.entries.write().remove(&image_id).is_some()
    }

    /// Drop every entry. Call between unrelated processing sessions.
    pub fn clear(&self) {
        let mut entries = self.entries.write();
        tracing::info!("ArrayCache: clearing {} entries", entries.len());
        entries.clear();
        self.full_reported.store(false, Ordering::Relaxed);
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            bypassed: self.bypassed.load(Ordering::Relaxed),
            entries: self.len(),
        }
    }
}

/// `Σ weights[k] * arrays[k][i]` for every `i`.
///
/// Zero weights skip their array. Output length is that of the first array.
pub fn linear_combination(arrays: &[&[f64]], weights: &[f64]) -> Vec<f64> {
    let len = arrays.first().map_or(0, |a| a.len());
    let mut out = vec![0.0; len];
    for (array, &weight) in arrays.iter().zip(weights) {
        if weight == 0.0 {
            continue;
        }
        for (o, &v) in out.iter_mut().zip(array.iter()) {
            *o += weight * v;
        }
    }
    out
}

/// `a[i] - b[i]`.
pub fn difference(a: &[f64], b: &[f64]) -> Vec<f64> {
    a.iter().zip(b).map(|(x, y)| x - y).collect()
}

/// `|a[i] - b[i]|`.
pub fn abs_difference(a: &[f64], b: &[f64]) -> Vec<f64> {
    a.iter().zip(b).map(|(x, y)| (x - y).abs()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::{DataType, PixelBuffer};

    const EPSILON: f64 = 1e-12;

    fn gradient_image(width: u32, height: u32, channels: usize) -> Image {
        let len = (width * height) as usize;
        let planes: Vec<Vec<f64>> = (0..channels)
            .map(|c| (0..len).map(|i| (i * (c + 1)) as f64).collect())
            .collect();
        Image::from_f64_planes(width, height, DataType::U16, &planes).unwrap()
    }

    #[test]
    fn test_second_lookup_hits_and_is_identical() {
        let cache = ArrayCache::default();
        let image = gradient_image(4, 3, 3);

        let first = cache.channel_arrays(&image);
        let second = cache.channel_arrays(&image);

        assert_eq!(*first, *second);
        assert!(Arc::ptr_eq(&first, &second));
        let stats = cache.stats();
        assert_eq!((stats.hits, stats.misses, stats.entries), (1, 1, 1));
    }

    #[test]
    fn test_missing_channels_are_zero_filled() {
        let cache = ArrayCache::default();
        let image = gradient_image(2, 2, 1);
        let arrays = cache.channel_arrays(&image);
        assert_eq!(arrays.source_channels(), 1);
        assert_eq!(arrays.red(), &[0.0, 1.0, 2.0, 3.0]);
        assert!(arrays.green().iter().all(|&v| v == 0.0));
        assert!(arrays.blue().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_mutated_image_is_not_served_stale() {
        let cache = ArrayCache::default();
        let mut image = gradient_image(2, 2, 1);
        let before = cache.channel_arrays(&image);

        if let Some(PixelBuffer::U16(v)) = image.channel_mut(0) {
            v[0] = 99;
        }
        let after = cache.channel_arrays(&image);

        assert_eq!(before.red()[0], 0.0);
        assert_eq!(after.red()[0], 99.0);
    }

    #[test]
    fn test_fingerprint_mismatch_replaces_entry() {
        let cache = ArrayCache::default();
        let image = gradient_image(2, 2, 3);
        let stale = Fingerprint {
            width: 9,
            ..Fingerprint::of(&image)
        };
        cache.entries.write().insert(
            image.id(),
            CacheEntry {
                fingerprint: stale,
                arrays: Arc::new(ChannelArrays::extract(&Image::new(9, 1, 3, DataType::U8))),
            },
        );

        let arrays = cache.channel_arrays(&image);
        assert_eq!(arrays.red().len(), 4);
        assert_eq!(cache.stats().misses, 1);
        assert_eq!(cache.entries.read()[&image.id()].fingerprint, Fingerprint::of(&image));
    }

    #[test]
    fn test_large_images_bypass_cache() {
        let cache = ArrayCache::new(CacheConfig {
            max_entries: 4,
            max_cacheable_pixels: 9,
        });
        let at_ceiling = gradient_image(3, 3, 3);
        let _ = cache.channel_arrays(&at_ceiling);
        assert!(cache.is_empty());
        assert_eq!(cache.stats().bypassed, 1);

        let below = gradient_image(4, 2, 3);
        let _ = cache.channel_arrays(&below);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.stats().bypassed, 1);
    }

    #[test]
    fn test_full_cache_stops_caching_until_cleared() {
        let cache = ArrayCache::new(CacheConfig {
            max_entries: 2,
            max_cacheable_pixels: 1024,
        });
        let images: Vec<Image> = (0..3).map(|_| gradient_image(2, 2, 3)).collect();
        for image in &images {
            let _ = cache.channel_arrays(image);
        }
        assert_eq!(cache.len(), 2);

        cache.clear();
        assert!(cache.is_empty());
        let _ = cache.channel_arrays(&images[2]);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_invalidate_single_entry() {
        let cache = ArrayCache::default();
        let image = gradient_image(2, 2, 3);
        let _ = cache.channel_arrays(&image);
        assert!(cache.invalidate(image.id()));
        assert!(!cache.invalidate(image.id()));
    }

    #[test]
    fn test_concurrent_lookups_agree() {
        let cache = ArrayCache::default();
        let images: Vec<Image> = (0..4).map(|_| gradient_image(16, 16, 3)).collect();
        let expected: Vec<ChannelArrays> = images.iter().map(ChannelArrays::extract).collect();

        std::thread::scope(|s| {
            for _ in 0..8 {
                s.spawn(|| {
                    for (image, want) in images.iter().zip(&expected) {
                        assert_eq!(*cache.channel_arrays(image), *want);
                    }
                });
            }
        });

        assert_eq!(cache.len(), 4);
        let stats = cache.stats();
        assert_eq!(stats.hits + stats.misses, 32);
    }

    #[test]
    fn test_vector_helpers() {
        let r = [1.0, 2.0];
        let g = [3.0, 5.0];
        let b = [0.5, -1.0];
        let combined = linear_combination(&[&r[..], &g[..], &b[..]], &[2.0, -1.0, 0.0]);
        assert!((combined[0] - (-1.0)).abs() < EPSILON);
        assert!((combined[1] - (-1.0)).abs() < EPSILON);

        assert_eq!(difference(&r, &g), vec![-2.0, -3.0]);
        assert_eq!(abs_difference(&r, &g), vec![2.0, 3.0]);
    }
}
