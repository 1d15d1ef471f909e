//! End-to-end runs through the registry: catalog lookup, composite passes,
//! cache sharing and the `image` crate interop.
//!
//! Run with: `cargo test -p kymoscope-core`

use std::sync::OnceLock;

use image::{DynamicImage, RgbImage};
use kymoscope_core::{
    ArrayCache, DataType, ErrorKind, Image, ThresholdDirection, TransformKey, TransformOptions,
    TransformRegistry,
};

const EPSILON: f64 = 1e-9;

fn registry() -> &'static TransformRegistry {
    static REGISTRY: OnceLock<TransformRegistry> = OnceLock::new();
    REGISTRY.get_or_init(TransformRegistry::new)
}

/// Deterministic pseudo-random planes in `[0, 256)`.
fn noise_image(width: u32, height: u32, channels: usize, seed: u64) -> Image {
    let mut state = seed;
    let mut next = move || {
        state = state
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);
        ((state >> 33) % 256) as f64
    };
    let n = width as usize * height as usize;
    let planes: Vec<Vec<f64>> = (0..channels).map(|_| (0..n).map(|_| next()).collect()).collect();
    Image::from_f64_planes(width, height, DataType::F64, &planes).unwrap()
}

fn uniform_rgb(width: u32, height: u32, rgb: [f64; 3], data_type: DataType) -> Image {
    let n = width as usize * height as usize;
    let planes: Vec<Vec<f64>> = rgb.iter().map(|&v| vec![v; n]).collect();
    Image::from_f64_planes(width, height, data_type, &planes).unwrap()
}

#[test]
fn test_weighted_difference_scenario() {
    let image = uniform_rgb(4, 4, [100.0, 50.0, 50.0], DataType::U8);
    let out = registry()
        .apply(
            TransformKey::R2MinusGB,
            Some(&image),
            Some(&TransformOptions::default()),
            &ArrayCache::default(),
        )
        .unwrap();
    assert_eq!((out.width(), out.height(), out.channel_count()), (4, 4, 3));
    for c in 0..3 {
        assert!(out.channel_f64(c).unwrap().iter().all(|&v| v == 100.0));
    }
}

#[test]
fn test_custom_weights_match_formula() {
    let image = noise_image(9, 7, 3, 11);
    let cache = ArrayCache::default();
    let (r, g, b) = (
        image.channel_f64(0).unwrap(),
        image.channel_f64(1).unwrap(),
        image.channel_f64(2).unwrap(),
    );

    for weights in [[0.5, 0.25, 0.25], [-1.0, 3.0, 0.0], [0.0, 0.0, -0.1], [2.5, -1.5, 7.0]] {
        let options = TransformOptions {
            weights,
            ..TransformOptions::default()
        };
        let out = registry()
            .apply(TransformKey::CustomWeights, Some(&image), Some(&options), &cache)
            .unwrap();
        let plane = out.channel_f64(0).unwrap();
        for i in 0..plane.len() {
            let expected = weights[0] * r[i] + weights[1] * g[i] + weights[2] * b[i];
            assert!((plane[i] - expected).abs() < EPSILON, "{weights:?} pixel {i}");
        }
    }
}

#[test]
fn test_every_key_rejects_missing_image() {
    let options = TransformOptions::default();
    let cache = ArrayCache::default();
    for key in TransformKey::ALL {
        let err = registry().apply(key, None, Some(&options), &cache).unwrap_err();
        assert_eq!(err.kind, ErrorKind::NullInput, "{key}");
        assert_eq!(err.transform, key.id());
    }
    assert!(cache.is_empty());
}

#[test]
fn test_every_key_runs_on_noise() {
    let image = noise_image(24, 20, 3, 5);
    let cache = ArrayCache::default();
    let mut options = TransformOptions::default().with_background(noise_image(24, 20, 3, 6));
    options.palette = vec![palette::Srgb::new(128u8, 128, 128)];
    options.threshold = 100;

    for key in TransformKey::ALL {
        let out = registry()
            .apply(key, Some(&image), Some(&options), &cache)
            .unwrap_or_else(|e| panic!("{key}: {e}"));
        assert_eq!((out.width(), out.height()), (24, 20), "{key}");
        let expected_channels = match key {
            TransformKey::ThresholdSingle | TransformKey::ThresholdColors => 1,
            _ => 3,
        };
        assert_eq!(out.channel_count(), expected_channels, "{key}");
    }
    let stats = cache.stats();
    assert!(stats.hits > 0);
}

#[test]
fn test_composite_threshold_pass() {
    let r = vec![0.0, 100.0, 128.0, 200.0];
    let planes = [r, vec![0.0; 4], vec![0.0; 4]];
    let image = Image::from_f64_planes(4, 1, DataType::U8, &planes).unwrap();
    let options =
        TransformOptions::from_json(r#"{ "composite": "threshold_single", "threshold": 128 }"#)
            .unwrap();

    let out = registry()
        .apply(TransformKey::RedChannel, Some(&image), Some(&options), &ArrayCache::default())
        .unwrap();
    assert_eq!(out.channel_count(), 1);
    assert_eq!(out.data_type(), DataType::U8);
    assert_eq!(out.channel_f64(0).unwrap(), vec![255.0, 255.0, 255.0, 0.0]);
}

#[test]
fn test_composite_error_names_threshold() {
    let image = Image::new(4, 4, 3, DataType::U8);
    let options = TransformOptions {
        composite: Some(TransformKey::ThresholdColors),
        ..TransformOptions::default()
    };
    let err = registry()
        .apply(TransformKey::Grey, Some(&image), Some(&options), &ArrayCache::default())
        .unwrap_err();
    // The grey output is valid; the empty palette fails the second pass.
    assert_eq!(err.kind, ErrorKind::InvalidParameter);
    assert_eq!(err.transform, "threshold_colors");
}

#[test]
fn test_threshold_direction_flip_inverts_mask() {
    let image = noise_image(16, 16, 1, 3);
    let cache = ArrayCache::default();
    for threshold in [0, 64, 128, 200, 255] {
        let greater = TransformOptions {
            threshold,
            ..TransformOptions::default()
        };
        let lesser = TransformOptions {
            direction: ThresholdDirection::Lesser,
            ..greater.clone()
        };
        let a = registry()
            .apply(TransformKey::ThresholdSingle, Some(&image), Some(&greater), &cache)
            .unwrap();
        let b = registry()
            .apply(TransformKey::ThresholdSingle, Some(&image), Some(&lesser), &cache)
            .unwrap();
        let (a, b) = (a.channel_f64(0).unwrap(), b.channel_f64(0).unwrap());
        assert!(a.iter().zip(&b).all(|(x, y)| x + y == 255.0 && x * y == 0.0));
    }
}

#[test]
fn test_column_sorts_are_permutations() {
    let image = noise_image(7, 13, 3, 42);
    let (w, h) = (7usize, 13usize);
    let options = TransformOptions::default();

    for key in [TransformKey::SortChan0Columns, TransformKey::SortSumDiffColumns] {
        let out = registry()
            .apply(key, Some(&image), Some(&options), &ArrayCache::default())
            .unwrap();
        let inputs: Vec<Vec<f64>> = (0..3).map(|c| image.channel_f64(c).unwrap()).collect();
        let outputs: Vec<Vec<f64>> = (0..3).map(|c| out.channel_f64(c).unwrap()).collect();

        for x in 0..w {
            let rows = |planes: &[Vec<f64>]| -> Vec<[f64; 3]> {
                (0..h)
                    .map(|y| [planes[0][y * w + x], planes[1][y * w + x], planes[2][y * w + x]])
                    .collect()
            };
            let mut before = rows(&inputs);
            let after = rows(&outputs);
            let key_of = |p: &[f64; 3]| match key {
                TransformKey::SortChan0Columns => p[0],
                _ => (p[0] - p[1]).abs() + (p[0] - p[2]).abs() + (p[1] - p[2]).abs(),
            };
            assert!(
                after.windows(2).all(|pair| key_of(&pair[0]) >= key_of(&pair[1])),
                "{key} column {x}"
            );

            let mut sorted_after = after.clone();
            before.sort_by(|a, b| a.partial_cmp(b).unwrap());
            sorted_after.sort_by(|a, b| a.partial_cmp(b).unwrap());
            assert_eq!(before, sorted_after, "{key} column {x}");
        }
    }
}

#[test]
fn test_deriche_flat_input_for_all_types() {
    for data_type in [DataType::U8, DataType::U16, DataType::I16, DataType::F32] {
        let image = uniform_rgb(12, 10, [7.0, 7.0, 7.0], data_type);
        for key in [TransformKey::Deriche, TransformKey::DericheGrey] {
            let out = registry()
                .apply(
                    key,
                    Some(&image),
                    Some(&TransformOptions::default()),
                    &ArrayCache::default(),
                )
                .unwrap();
            assert_eq!(out.data_type(), data_type);
            for c in 0..3 {
                assert!(out.channel_f64(c).unwrap().iter().all(|&v| v == 0.0), "{key} {data_type}");
            }
        }
    }
}

#[test]
fn test_cache_shared_across_transforms() {
    let image = noise_image(8, 8, 3, 9);
    let cache = ArrayCache::default();
    let options = TransformOptions::default();

    registry().apply(TransformKey::Grey, Some(&image), Some(&options), &cache).unwrap();
    registry().apply(TransformKey::Hsv, Some(&image), Some(&options), &cache).unwrap();

    let stats = cache.stats();
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.entries, 1);

    assert!(cache.invalidate(image.id()));
    cache.clear();
    assert!(cache.is_empty());
}

#[test]
fn test_dynamic_image_round_trip_through_hsb() {
    let mut rgb = RgbImage::new(3, 2);
    rgb.put_pixel(0, 0, image::Rgb([255, 0, 0]));
    rgb.put_pixel(1, 0, image::Rgb([0, 255, 0]));
    rgb.put_pixel(2, 1, image::Rgb([128, 128, 128]));
    let frame = Image::from_dynamic(&DynamicImage::ImageRgb8(rgb));
    assert_eq!((frame.channel_count(), frame.data_type()), (3, DataType::U8));

    let out = registry()
        .apply(
            TransformKey::Hsb,
            Some(&frame),
            Some(&TransformOptions::default()),
            &ArrayCache::default(),
        )
        .unwrap();
    let display = out.to_dynamic().unwrap();
    let DynamicImage::ImageRgb32F(buf) = display else {
        panic!("expected a float RGB frame");
    };
    // Green: hue 1/3, full saturation and brightness.
    let px = buf.get_pixel(1, 0);
    assert!((f64::from(px[0]) - 100.0 / 3.0).abs() < 1e-3);
    assert!((f64::from(px[1]) - 100.0).abs() < 1e-3);
    assert!((f64::from(px[2]) - 100.0).abs() < 1e-3);
}
