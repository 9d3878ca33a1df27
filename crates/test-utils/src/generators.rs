//! Synthetic hail grids with predictable swath shapes.
//!
//! All generators use [`crate::fixtures::test_transform`]: 0.01 degree
//! cells with the top-left corner at (-100.0, 40.0).

use swath_common::{Grid, MISSING};

use crate::fixtures::test_transform;

/// A grid with every cell set to `value` (inches).
pub fn uniform_grid(width: usize, height: usize, value: f32) -> Grid {
    Grid::filled(width, height, value, test_transform())
}

/// A `background` grid with a `size` x `size` block of `value` whose top-left
/// cell is at (`row`, `col`).
///
/// ```
/// use test_utils::grid_with_block;
///
/// let grid = grid_with_block(10, 10, 0.5, (4, 4, 2), 3.0);
/// assert_eq!(grid.get(4, 4), Some(3.0));
/// assert_eq!(grid.get(3, 4), Some(0.5));
/// ```
pub fn grid_with_block(
    width: usize,
    height: usize,
    background: f32,
    block: (usize, usize, usize),
    value: f32,
) -> Grid {
    let mut grid = uniform_grid(width, height, background);
    let (row0, col0, size) = block;
    for row in row0..(row0 + size).min(height) {
        for col in col0..(col0 + size).min(width) {
            grid.set(row, col, value);
        }
    }
    grid
}

/// A storm-like field: a smooth peak of `peak` inches at the center of a
/// `size` x `size` grid falling off linearly to zero at `radius` cells.
///
/// Every threshold below `peak` yields one roughly circular swath, and
/// higher thresholds nest inside lower ones.
pub fn storm_grid(size: usize, peak: f32, radius: f32) -> Grid {
    let mut grid = uniform_grid(size, size, 0.0);
    let center = (size as f32 - 1.0) / 2.0;
    for row in 0..size {
        for col in 0..size {
            let dr = row as f32 - center;
            let dc = col as f32 - center;
            let d = (dr * dr + dc * dc).sqrt();
            grid.set(row, col, (peak * (1.0 - d / radius)).max(0.0));
        }
    }
    grid
}

/// Two storm cells of different intensity side by side (peaks of 3.0 and
/// 1.6 inches, radius 10 cells, centered on row 18), with rows 24..28
/// missing.
pub fn two_cell_grid() -> Grid {
    let mut grid = uniform_grid(60, 40, 0.0);
    for (center_col, peak) in [(15.0f32, 3.0f32), (45.0, 1.6)] {
        for row in 0..40 {
            for col in 0..60 {
                let dr = row as f32 - 18.0;
                let dc = col as f32 - center_col;
                let d = (dr * dr + dc * dc).sqrt();
                let v = (peak * (1.0 - d / 10.0)).max(0.0);
                if v > grid.get(row, col).unwrap_or(0.0) {
                    grid.set(row, col, v);
                }
            }
        }
    }
    for row in 24..28 {
        for col in 0..60 {
            grid.set(row, col, MISSING);
        }
    }
    grid
}

/// Deterministic xorshift sequence in `[0, 1)`.
struct Speckle(u64);

impl Speckle {
    fn new(seed: u64) -> Self {
        Self(seed.wrapping_mul(0x9E37_79B9_7F4A_7C15) | 1)
    }

    fn sample(&mut self) -> f32 {
        self.0 ^= self.0 << 13;
        self.0 ^= self.0 >> 7;
        self.0 ^= self.0 << 17;
        (self.0 >> 40) as f32 / (1u64 << 24) as f32
    }
}

/// Uniform noise between 0 and `peak` inches, reproducible from `seed`.
///
/// Every threshold produces many ragged, irregular regions.
pub fn noise_grid(size: usize, peak: f32, seed: u64) -> Grid {
    let mut rng = Speckle::new(seed);
    let mut grid = uniform_grid(size, size, 0.0);
    for row in 0..size {
        for col in 0..size {
            grid.set(row, col, rng.sample() * peak);
        }
    }
    grid
}

/// [`storm_grid`] with up to ±0.5 inch of speckle, quantized to quarter
/// inches the way MESH products report hail size.
pub fn speckled_storm_grid(size: usize, peak: f32, radius: f32, seed: u64) -> Grid {
    let mut rng = Speckle::new(seed);
    let mut grid = storm_grid(size, peak, radius);
    for row in 0..size {
        for col in 0..size {
            let base = grid.get(row, col).unwrap_or(0.0);
            let noisy = base + rng.sample() - 0.5;
            grid.set(row, col, ((noisy * 4.0).round() / 4.0).max(0.0));
        }
    }
    grid
}
