//! Per-cell maximum across time steps.

use swath_common::Grid;

use crate::error::{GridProcessorError, Result};

/// Largest coefficient difference, in degrees, between transforms that are
/// still treated as the same footprint.
const TRANSFORM_TOLERANCE: f64 = 1e-6;

/// Incremental maximum composite.
///
/// Grids are folded into a single accumulator one at a time so that only
/// the accumulator and the grid being added are ever held in memory.
#[derive(Debug, Default)]
pub struct MaxCompositor {
    acc: Option<Grid>,
    count: usize,
}

impl MaxCompositor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold `grid` into the composite. The first grid fixes the shape.
    pub fn add(&mut self, grid: Grid) -> Result<()> {
        match self.acc.as_mut() {
            None => self.acc = Some(grid),
            Some(acc) => max_into(acc, &grid)?,
        }
        self.count += 1;
        Ok(())
    }

    /// Number of grids folded so far.
    pub fn count(&self) -> usize {
        self.count
    }

    /// The composite, or `None` if nothing was added.
    pub fn finish(self) -> Option<Grid> {
        self.acc
    }
}

/// `acc[i] = max(acc[i], other[i])` where a missing cell never wins.
///
/// Both grids must share a shape and a footprint.
pub fn max_into(acc: &mut Grid, other: &Grid) -> Result<()> {
    if !acc.same_shape(other) {
        return Err(GridProcessorError::ShapeMismatch {
            expected: acc.shape(),
            actual: other.shape(),
        });
    }
    if !acc
        .transform()
        .approx_eq(other.transform(), TRANSFORM_TOLERANCE)
    {
        return Err(GridProcessorError::TransformMismatch {
            expected: format!("{:?}", acc.transform()),
            actual: format!("{:?}", other.transform()),
        });
    }
    for (a, &b) in acc.values_mut().iter_mut().zip(other.values()) {
        // f32::max returns the non-NaN operand when exactly one is NaN.
        *a = a.max(b);
    }
    Ok(())
}

/// Composite a sequence of grids. Returns `None` for an empty sequence.
pub fn composite_max(grids: impl IntoIterator<Item = Grid>) -> Result<Option<Grid>> {
    let mut compositor = MaxCompositor::new();
    for grid in grids {
        compositor.add(grid)?;
    }
    Ok(compositor.finish())
}
