//! Density shaping: logistic squashing, Gaussian smoothing and normalization.
//!
//! Turns unbounded per-pixel counts into a smoothed density in [0, 1] that is
//! relative to the busiest spot of the extent. A flat field (for example no
//! points at all) normalizes to all zeros instead of NaN.

use crate::canvas::GrayCanvas;
use crate::HeatmapConfig;

/// Kernel radius in multiples of sigma.
const GAUSSIAN_TRUNCATE: f64 = 4.0;

/// Shape a raw density grid into [0, 1].
///
/// 1. logistic `1 / (1 + exp(-k·d))`
/// 2. min-max normalize
/// 3. Gaussian blur with `gaussian_sigma_px`
/// 4. min-max normalize
pub fn shape_density(mut grid: GrayCanvas, config: &HeatmapConfig) -> GrayCanvas {
    apply_logistic(&mut grid, config.logistic_k);
    normalize(&mut grid);
    let mut grid = gaussian_blur(&grid, config.gaussian_sigma_px);
    normalize(&mut grid);
    grid
}

/// Saturating logistic response applied per pixel.
pub fn apply_logistic(grid: &mut GrayCanvas, k: f64) {
    let k = k as f32;
    grid.map_in_place(|d| 1.0 / (1.0 + (-k * d).exp()));
}

/// Min-max normalize in place. A flat or non-finite range yields all zeros.
pub fn normalize(grid: &mut GrayCanvas) {
    let Some((lo, hi)) = grid.min_max() else {
        return;
    };
    let range = hi - lo;
    if !(range.is_finite() && range > 0.0) {
        grid.map_in_place(|_| 0.0);
        return;
    }
    grid.map_in_place(|v| (v - lo) / range);
}

/// Normalized 1D Gaussian taps, truncated at 4 sigma.
pub fn gaussian_kernel(sigma: f64) -> Vec<f32> {
    let radius = (GAUSSIAN_TRUNCATE * sigma + 0.5) as i64;
    let weights: Vec<f64> = (-radius..=radius)
        .map(|i| (-0.5 * (i as f64 / sigma).powi(2)).exp())
        .collect();
    let sum: f64 = weights.iter().sum();
    weights.into_iter().map(|w| (w / sum) as f32).collect()
}

/// Isotropic Gaussian blur; samples past the border repeat the edge pixel.
pub fn gaussian_blur(grid: &GrayCanvas, sigma: f64) -> GrayCanvas {
    if sigma <= 0.0 || grid.width() == 0 || grid.height() == 0 {
        return grid.clone();
    }
    let kernel = gaussian_kernel(sigma);

    let mut horizontal = GrayCanvas::new(grid.width(), grid.height());
    for_each_row(&mut horizontal, |r, out| blur_row(grid.row(r), out, &kernel));

    let mut smoothed = GrayCanvas::new(grid.width(), grid.height());
    for_each_row(&mut smoothed, |r, out| blur_column_pass(&horizontal, r, out, &kernel));

    smoothed
}

/// Convolve one row with the kernel.
fn blur_row(src: &[f32], out: &mut [f32], kernel: &[f32]) {
    let radius = (kernel.len() / 2) as i64;
    let last = src.len() as i64 - 1;
    for (x, o) in out.iter_mut().enumerate() {
        let mut acc = 0.0;
        for (k, w) in kernel.iter().enumerate() {
            let sx = (x as i64 + k as i64 - radius).clamp(0, last) as usize;
            acc += w * src[sx];
        }
        *o = acc;
    }
}

/// Output row `r` of the vertical pass: weighted sum of neighbouring rows.
fn blur_column_pass(src: &GrayCanvas, r: usize, out: &mut [f32], kernel: &[f32]) {
    let radius = (kernel.len() / 2) as i64;
    let last = src.height() as i64 - 1;
    out.fill(0.0);
    for (k, w) in kernel.iter().enumerate() {
        let sy = (r as i64 + k as i64 - radius).clamp(0, last) as usize;
        for (o, s) in out.iter_mut().zip(src.row(sy)) {
            *o += w * s;
        }
    }
}

#[cfg(not(feature = "parallel"))]
fn for_each_row<F>(dst: &mut GrayCanvas, f: F)
where
    F: Fn(usize, &mut [f32]),
{
    let width = dst.width();
    for (r, out) in dst.as_mut_slice().chunks_mut(width).enumerate() {
        f(r, out);
    }
}

#[cfg(feature = "parallel")]
fn for_each_row<F>(dst: &mut GrayCanvas, f: F)
where
    F: Fn(usize, &mut [f32]) + Sync,
{
    use rayon::prelude::*;

    let width = dst.width();
    dst.as_mut_slice()
        .par_chunks_mut(width)
        .enumerate()
        .for_each(|(r, out)| f(r, out));
}
