//! Gaussian pre-blur of the continuous magnitude field.

use rayon::prelude::*;
use swath_common::Grid;

/// Kernel half-width in standard deviations.
const TRUNCATE: f64 = 4.0;

/// Blur `grid` with a separable Gaussian of standard deviation `sigma` cells.
///
/// Missing cells are read as zero. Borders reflect (`d c b a | a b c d | d c b a`).
/// A non-positive `sigma` returns the zero-filled values unchanged.
pub fn gaussian_blur(grid: &Grid, sigma: f64) -> Vec<f32> {
    let width = grid.width();
    let height = grid.height();
    let filled: Vec<f32> = grid
        .values()
        .iter()
        .map(|v| if v.is_nan() { 0.0 } else { *v })
        .collect();

    if sigma <= 0.0 {
        return filled;
    }

    let kernel = gaussian_kernel(sigma);
    let radius = (kernel.len() / 2) as isize;

    let mut horizontal = vec![0.0f32; width * height];
    horizontal
        .par_chunks_mut(width)
        .zip(filled.par_chunks(width))
        .for_each(|(out, src)| {
            for (col, slot) in out.iter_mut().enumerate() {
                let mut sum = 0.0f64;
                for (k, w) in kernel.iter().enumerate() {
                    let c = reflect(col as isize + k as isize - radius, width);
                    sum += w * src[c] as f64;
                }
                *slot = sum as f32;
            }
        });

    let mut out = vec![0.0f32; width * height];
    out.par_chunks_mut(width)
        .enumerate()
        .for_each(|(row, out_row)| {
            for (col, slot) in out_row.iter_mut().enumerate() {
                let mut sum = 0.0f64;
                for (k, w) in kernel.iter().enumerate() {
                    let r = reflect(row as isize + k as isize - radius, height);
                    sum += w * horizontal[r * width + col] as f64;
                }
                *slot = sum as f32;
            }
        });

    out
}

/// Normalized 1-D Gaussian weights of length `2 * radius + 1`.
pub fn gaussian_kernel(sigma: f64) -> Vec<f64> {
    let radius = (TRUNCATE * sigma + 0.5) as isize;
    let denom = 2.0 * sigma * sigma;
    let mut weights: Vec<f64> = (-radius..=radius)
        .map(|i| (-((i * i) as f64) / denom).exp())
        .collect();
    let total: f64 = weights.iter().sum();
    for w in &mut weights {
        *w /= total;
    }
    weights
}

/// Reflect an out-of-range index back into `0..len`, repeating the edge sample.
fn reflect(index: isize, len: usize) -> usize {
    let len = len as isize;
    let period = 2 * len;
    let mut i = index.rem_euclid(period);
    if i >= len {
        i = period - 1 - i;
    }
    i as usize
}
