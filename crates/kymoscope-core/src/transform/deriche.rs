//! Deriche recursive edge detector with non-maximum suppression.
//!
//! # Algorithm
//! For each channel:
//! 1. X gradient: a causal and an anticausal pass along every row
//! 2. Y gradient: a causal and an anticausal pass along every column
//! 3. Magnitude `sqrt(gx² + gy²)`
//! 4. Non-maximum suppression along the local gradient direction
//! 5. Zero the 1-pixel border
//!
//! Each 1D pass is the second-order recursion of the Deriche derivative
//! filter, with `d = e^(-alpha)`:
//! ```text
//! causal:      y⁺[n] = x[n-1] + 2d·y⁺[n-1] − d²·y⁺[n-2]
//! anticausal:  y⁻[n] = x[n+1] + 2d·y⁻[n+1] − d²·y⁻[n+2]
//! gradient:    g[n]  = k · (y⁺[n] − y⁻[n]),   k = −(1−d)³ / (2(1+d))
//! ```
//! `k` normalizes the response so a unit ramp yields a gradient of 1.
//! Both recursions start in their steady state for the replicated end
//! sample, and lines are filtered relative to their first sample, so a
//! constant line produces an exactly zero gradient.
//!
//! # Reference
//! R. Deriche, "Using Canny's criteria to derive a recursively implemented
//! optimal edge detector", IJCV 1(2), 1987.
//!
//! # Complexity
//! O(width × height) per channel; two scratch lines per pass.

use crate::cache::ArrayCache;
use crate::error::{TransformError, TransformResult};
use crate::image::Image;
use crate::options::TransformOptions;
use crate::transform::base::{ImageTransform, emit_planes, emit_single};

/// Default recursive decay.
pub const DEFAULT_ALPHA: f64 = 1.0;

/// Recommended `alpha` range. Values outside it are accepted with a warning.
const RECOMMENDED_ALPHA: (f64, f64) = (0.1, 5.0);

/// Deriche gradient-magnitude edge map.
#[derive(Debug, Clone, Copy)]
pub struct Deriche {
    name: &'static str,
    alpha: f64,
    reduce_to_grayscale: bool,
}

impl Deriche {
    pub const fn new(name: &'static str, alpha: f64, reduce_to_grayscale: bool) -> Self {
        Self {
            name,
            alpha,
            reduce_to_grayscale,
        }
    }
}

impl ImageTransform for Deriche {
    fn name(&self) -> &'static str {
        self.name
    }

    fn validate(&self, _source: &Image, _options: &TransformOptions) -> TransformResult<()> {
        if !self.alpha.is_finite() || self.alpha <= 0.0 {
            return Err(TransformError::invalid_parameter(format!(
                "alpha must be positive, got {}",
                self.alpha
            )));
        }
        let (lo, hi) = RECOMMENDED_ALPHA;
        if self.alpha <= lo || self.alpha > hi {
            tracing::warn!("{}: alpha {} outside recommended ({lo}, {hi}]", self.name, self.alpha);
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
        let (width, height) = (source.width() as usize, source.height() as usize);
        let coefficients = Coefficients::new(self.alpha);
        let used = arrays.source_channels().min(3);

        if self.reduce_to_grayscale {
            let mut grey = vec![0.0; source.pixel_count()];
            for plane in &arrays.planes()[..used] {
                for (g, &v) in grey.iter_mut().zip(plane) {
                    *g += v;
                }
            }
            let scale = 1.0 / used as f64;
            grey.iter_mut().for_each(|g| *g *= scale);

            let edges = detect_edges(&grey, width, height, &coefficients);
            return emit_single(source, source.data_type(), edges, options.replicate_channels);
        }

        let planes: Vec<Vec<f64>> = arrays
            .planes()
            .iter()
            .enumerate()
            .map(|(c, plane)| {
                if c < used {
                    detect_edges(plane, width, height, &coefficients)
                } else {
                    vec![0.0; plane.len()]
                }
            })
            .collect();
        emit_planes(source, source.data_type(), &planes)
    }
}

/// Recursion coefficients derived from `alpha`.
#[derive(Debug, Clone, Copy)]
struct Coefficients {
    /// `2d`
    b1: f64,
    /// `−d²`
    b2: f64,
    /// Output normalization `k`.
    gain: f64,
    /// Steady-state response to a unit constant input, `1 / (1−d)²`.
    steady: f64,
}

impl Coefficients {
    fn new(alpha: f64) -> Self {
        let d = (-alpha).exp();
        let one_minus = 1.0 - d;
        Self {
            b1: 2.0 * d,
            b2: -d * d,
            gain: -(one_minus * one_minus * one_minus) / (2.0 * (1.0 + d)),
            steady: 1.0 / (one_minus * one_minus),
        }
    }
}

/// Derivative of one line into `out`.
fn derive_line(line: &[f64], c: &Coefficients, causal: &mut [f64], out: &mut [f64]) {
    let n = line.len();
    if n == 0 {
        return;
    }
    let base = line[0];

    // Causal pass; the sample before the line replicates line[0], which is
    // zero after rebasing, so the steady state is zero too.
    let (mut p1, mut p2) = (0.0, 0.0);
    let mut previous = 0.0;
    for i in 0..n {
        let y = previous + c.b1 * p1 + c.b2 * p2;
        causal[i] = y;
        p2 = p1;
        p1 = y;
        previous = line[i] - base;
    }

    // Anticausal pass; the sample after the line replicates line[n-1].
    let end = line[n - 1] - base;
    let (mut p1, mut p2) = (end * c.steady, end * c.steady);
    let mut next = end;
    for i in (0..n).rev() {
        let y = next + c.b1 * p1 + c.b2 * p2;
        out[i] = c.gain * (causal[i] - y);
        p2 = p1;
        p1 = y;
        next = line[i] - base;
    }
}

/// X and Y gradient planes of a single channel.
fn gradients(plane: &[f64], width: usize, height: usize, c: &Coefficients) -> (Vec<f64>, Vec<f64>) {
    let mut gx = vec![0.0; plane.len()];
    let mut gy = vec![0.0; plane.len()];

    let mut causal = vec![0.0; width];
    for (row, out) in plane.chunks_exact(width).zip(gx.chunks_exact_mut(width)) {
        derive_line(row, c, &mut causal, out);
    }

    let mut column = vec![0.0; height];
    let mut derived = vec![0.0; height];
    let mut causal = vec![0.0; height];
    for x in 0..width {
        for (y, v) in column.iter_mut().enumerate() {
            *v = plane[y * width + x];
        }
        derive_line(&column, c, &mut causal, &mut derived);
        for (y, &v) in derived.iter().enumerate() {
            gy[y * width + x] = v;
        }
    }

    (gx, gy)
}

/// Full detector on one plane: gradients, magnitude, suppression, border.
fn detect_edges(plane: &[f64], width: usize, height: usize, c: &Coefficients) -> Vec<f64> {
    let (gx, gy) = gradients(plane, width, height, c);
    let magnitude: Vec<f64> = gx.iter().zip(&gy).map(|(x, y)| (x * x + y * y).sqrt()).collect();
    suppress_non_maxima(&gx, &gy, &magnitude, width, height)
}

/// Keep a pixel only if it is a peak of `magnitude` along its gradient.
///
/// The direction ratio `r = gx/gy` selects one of four sectors; the two
/// neighbors along the gradient are linearly interpolated with weight `t`:
/// ```text
/// r ∈ [1, ∞)    t = 1/r   forward: (x+1, y) → (x+1, y+1)
/// r ∈ [0, 1)    t = r     forward: (x, y+1) → (x+1, y+1)
/// r ∈ [-1, 0)   t = −r    forward: (x, y+1) → (x−1, y+1)
/// r ∈ (−∞, −1)  t = −1/r  forward: (x−1, y) → (x−1, y+1)
/// ```
/// "Forward" is for `gy > 0`; for `gy < 0` the gradient points the other
/// way and the roles swap. The comparison against the forward neighbor is
/// strict and against the backward one non-strict, so of two equal
/// neighboring peaks exactly one survives. `gy == 0` is the limit of the
/// first sector, with the sign of `gx` picking the forward side.
/// The 1-pixel border is always zero.
fn suppress_non_maxima(
    gx: &[f64],
    gy: &[f64],
    magnitude: &[f64],
    width: usize,
    height: usize,
) -> Vec<f64> {
    let mut out = vec![0.0; magnitude.len()];
    if width < 3 || height < 3 {
        return out;
    }
    let at = |x: usize, y: usize| magnitude[y * width + x];

    for y in 1..height - 1 {
        for x in 1..width - 1 {
            let i = y * width + x;
            let m = magnitude[i];
            if m == 0.0 {
                continue;
            }
            let (u, v) = (gx[i], gy[i]);

            let keep = if v == 0.0 {
                let (right, left) = (at(x + 1, y), at(x - 1, y));
                if u > 0.0 {
                    m > right && m >= left
                } else {
                    m >= right && m > left
                }
            } else {
                let ratio = u / v;
                let (ahead, behind) = if ratio >= 1.0 {
                    let t = 1.0 / ratio;
                    (
                        (1.0 - t) * at(x + 1, y) + t * at(x + 1, y + 1),
                        (1.0 - t) * at(x - 1, y) + t * at(x - 1, y - 1),
                    )
                } else if ratio >= 0.0 {
                    let t = ratio;
                    (
                        (1.0 - t) * at(x, y + 1) + t * at(x + 1, y + 1),
                        (1.0 - t) * at(x, y - 1) + t * at(x - 1, y - 1),
                    )
                } else if ratio >= -1.0 {
                    let t = -ratio;
                    (
                        (1.0 - t) * at(x, y + 1) + t * at(x - 1, y + 1),
                        (1.0 - t) * at(x, y - 1) + t * at(x + 1, y - 1),
                    )
                } else {
                    let t = -1.0 / ratio;
                    (
                        (1.0 - t) * at(x - 1, y) + t * at(x - 1, y + 1),
                        (1.0 - t) * at(x + 1, y) + t * at(x + 1, y - 1),
                    )
                };
                if v > 0.0 {
                    m > ahead && m >= behind
                } else {
                    m >= ahead && m > behind
                }
            };

            if keep {
                out[i] = m;
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::image::DataType;

    const EPSILON: f64 = 1e-6;

    fn plane_image(width: u32, height: u32, f: impl Fn(usize, usize) -> f64) -> Image {
        let (w, h) = (width as usize, height as usize);
        let plane: Vec<f64> = (0..w * h).map(|i| f(i % w, i / w)).collect();
        let planes = [plane.clone(), plane.clone(), plane];
        Image::from_f64_planes(width, height, DataType::F64, &planes).unwrap()
    }

    fn run(t: &Deriche, image: &Image) -> TransformResult<Image> {
        t.transform(Some(image), Some(&TransformOptions::default()), &ArrayCache::default())
    }

    type Offsets = [(isize, isize); 2];

    /// Centre of a 3x3 grid after suppression, with magnitude 1 at the centre,
    /// 0.5 elsewhere and 1 at each offset in `ties`.
    fn centre_after_suppression(gx: f64, gy: f64, ties: &[(isize, isize)]) -> f64 {
        let mut magnitude = vec![0.5; 9];
        magnitude[4] = 1.0;
        for &(dx, dy) in ties {
            magnitude[((1 + dy) * 3 + 1 + dx) as usize] = 1.0;
        }
        let (mut u, mut v) = (vec![0.0; 9], vec![0.0; 9]);
        u[4] = gx;
        v[4] = gy;
        suppress_non_maxima(&u, &v, &magnitude, 3, 3)[4]
    }

    #[test]
    fn test_suppression_tie_breaks_per_sector() {
        // (gx, gy) with interpolation weight 0.5, then the neighbours
        // interpolated along and against the gradient.
        let sectors: [((f64, f64), Offsets, Offsets); 4] = [
            ((2.0, 1.0), [(1, 0), (1, 1)], [(-1, 0), (-1, -1)]),
            ((1.0, 2.0), [(0, 1), (1, 1)], [(0, -1), (-1, -1)]),
            ((-1.0, 2.0), [(0, 1), (-1, 1)], [(0, -1), (1, -1)]),
            ((-2.0, 1.0), [(-1, 0), (-1, 1)], [(1, 0), (1, -1)]),
        ];
        for ((gx, gy), ahead, behind) in sectors {
            for sign in [1.0, -1.0] {
                let (u, v) = (gx * sign, gy * sign);
                assert_eq!(centre_after_suppression(u, v, &[]), 1.0, "({u}, {v}) strict max");

                let kept = centre_after_suppression(u, v, &ahead) == 1.0;
                assert_eq!(kept, sign < 0.0, "({u}, {v}) tie ahead");

                let kept = centre_after_suppression(u, v, &behind) == 1.0;
                assert_eq!(kept, sign > 0.0, "({u}, {v}) tie behind");
            }
        }
    }

    #[test]
    fn test_suppression_tie_breaks_on_horizontal_gradient() {
        assert_eq!(centre_after_suppression(1.0, 0.0, &[(1, 0)]), 0.0);
        assert_eq!(centre_after_suppression(1.0, 0.0, &[(-1, 0)]), 1.0);
        assert_eq!(centre_after_suppression(-1.0, 0.0, &[(1, 0)]), 1.0);
        assert_eq!(centre_after_suppression(-1.0, 0.0, &[(-1, 0)]), 0.0);
        assert_eq!(centre_after_suppression(-1.0, 0.0, &[]), 1.0);
    }

    #[test]
    fn test_flat_image_has_no_edges() {
        for value in [0.0, 17.0, 200.0] {
            let image = plane_image(12, 9, |_, _| value);
            let out = run(&Deriche::new("deriche", DEFAULT_ALPHA, false), &image).unwrap();
            for c in 0..3 {
                assert!(out.channel_f64(c).unwrap().iter().all(|&v| v == 0.0));
            }
        }
    }

    #[test]
    fn test_ramp_gradient_is_normalized() {
        let (w, h) = (64, 5);
        let plane: Vec<f64> = (0..w * h).map(|i| (i % w) as f64 * 2.0).collect();
        let (gx, gy) = gradients(&plane, w, h, &Coefficients::new(1.0));
        let centre = 2 * w + w / 2;
        assert!((gx[centre] - 2.0).abs() < EPSILON, "gx = {}", gx[centre]);
        assert!(gy[centre].abs() < EPSILON);
    }

    #[test]
    fn test_vertical_step_gives_one_pixel_wide_edge() {
        let image = plane_image(16, 8, |x, _| if x < 8 { 0.0 } else { 100.0 });
        let out = run(&Deriche::new("deriche_grey", DEFAULT_ALPHA, true), &image).unwrap();
        let edges = out.channel_f64(0).unwrap();

        for y in 1..7 {
            let row = &edges[y * 16..(y + 1) * 16];
            let peaks: Vec<usize> = (0..16).filter(|&x| row[x] > 0.0).collect();
            assert_eq!(peaks.len(), 1, "row {y}: {row:?}");
            assert!(peaks[0] == 7 || peaks[0] == 8);
        }
    }

    #[test]
    fn test_border_is_zeroed() {
        let image = plane_image(10, 10, |x, y| ((x * 37 + y * 11) % 23) as f64 * 10.0);
        let out = run(&Deriche::new("deriche", 0.7, false), &image).unwrap();
        let plane = out.channel_f64(1).unwrap();
        for x in 0..10 {
            assert_eq!(plane[x], 0.0);
            assert_eq!(plane[90 + x], 0.0);
        }
        for y in 0..10 {
            assert_eq!(plane[y * 10], 0.0);
            assert_eq!(plane[y * 10 + 9], 0.0);
        }
    }

    #[test]
    fn test_grayscale_channel_of_single_channel_source() {
        let plane: Vec<f64> = (0..36).map(|i| if i % 6 < 3 { 10.0 } else { 250.0 }).collect();
        let image = Image::from_f64_planes(6, 6, DataType::U8, &[plane]).unwrap();
        let out = run(&Deriche::new("deriche", DEFAULT_ALPHA, false), &image).unwrap();
        assert_eq!(out.channel_count(), 3);
        assert!(out.channel_f64(0).unwrap().iter().any(|&v| v > 0.0));
        assert!(out.channel_f64(1).unwrap().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_diagonal_gradient_suppression_keeps_ridge() {
        // Diagonal step: every kept pixel sits next to the x + y = 10 boundary.
        let image = plane_image(12, 12, |x, y| if x + y < 10 { 0.0 } else { 50.0 });
        let out = run(&Deriche::new("deriche_grey", DEFAULT_ALPHA, true), &image).unwrap();
        let edges = out.channel_f64(0).unwrap();
        let kept: Vec<(usize, usize)> = (0..144)
            .filter(|&i| edges[i] > 0.0)
            .map(|i| (i % 12, i / 12))
            .collect();
        assert!(!kept.is_empty());
        assert!(kept.iter().all(|&(x, y)| (8..=11).contains(&(x + y))), "{kept:?}");
    }

    #[test]
    fn test_non_positive_alpha_rejected() {
        let image = plane_image(4, 4, |_, _| 1.0);
        let err = run(&Deriche::new("deriche", 0.0, false), &image).unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidParameter);
        let err = run(&Deriche::new("deriche", f64::NAN, false), &image).unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidParameter);
    }
}
