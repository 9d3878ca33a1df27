//! Canonical magnitude grids and their geographic mapping.

use serde::{Deserialize, Serialize};

use crate::error::{SwathError, SwathResult};

/// Sentinel for a missing cell.
pub const MISSING: f32 = f32::NAN;

/// Affine map from pixel space to geographic coordinates.
///
/// Coefficients follow the common GDAL/rasterio order:
/// `x = a * col + b * row + c` and `y = d * col + e * row + f`, where
/// `(col, row)` address pixel corners, so `(0, 0)` is the outer corner of
/// the first cell and `(col + 0.5, row + 0.5)` is a cell center.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoTransform {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub e: f64,
    pub f: f64,
}

impl GeoTransform {
    /// North-up transform with square-ish cells anchored at the top-left corner.
    pub fn north_up(origin_x: f64, origin_y: f64, res_x: f64, res_y: f64) -> Self {
        Self {
            a: res_x,
            b: 0.0,
            c: origin_x,
            d: 0.0,
            e: -res_y,
            f: origin_y,
        }
    }

    /// Map a pixel-space corner coordinate to (x, y).
    pub fn apply(&self, col: f64, row: f64) -> (f64, f64) {
        (
            self.a * col + self.b * row + self.c,
            self.d * col + self.e * row + self.f,
        )
    }

    /// Geographic coordinate of a cell center.
    pub fn cell_center(&self, row: usize, col: usize) -> (f64, f64) {
        self.apply(col as f64 + 0.5, row as f64 + 0.5)
    }

    /// Area of one cell in squared coordinate units.
    pub fn cell_area(&self) -> f64 {
        (self.a * self.e - self.b * self.d).abs()
    }

    /// Whether both transforms place every cell within `tolerance` of the same spot.
    pub fn approx_eq(&self, other: &GeoTransform, tolerance: f64) -> bool {
        [
            (self.a, other.a),
            (self.b, other.b),
            (self.c, other.c),
            (self.d, other.d),
            (self.e, other.e),
            (self.f, other.f),
        ]
        .iter()
        .all(|(x, y)| (x - y).abs() <= tolerance)
    }
}

/// A row-major grid of physical magnitudes. Every value is either a finite
/// number `>= 0` or [`MISSING`].
#[derive(Debug, Clone, PartialEq)]
pub struct Grid {
    width: usize,
    height: usize,
    values: Vec<f32>,
    transform: GeoTransform,
}

impl Grid {
    /// Build a grid, checking that `values` matches the declared shape.
    pub fn new(
        width: usize,
        height: usize,
        values: Vec<f32>,
        transform: GeoTransform,
    ) -> SwathResult<Self> {
        if width == 0 || height == 0 {
            return Err(SwathError::InvalidParameter {
                param: "shape".to_string(),
                message: format!("grid must be non-empty, got {}x{}", width, height),
            });
        }
        if values.len() != width * height {
            return Err(SwathError::InvalidParameter {
                param: "values".to_string(),
                message: format!(
                    "expected {} values for {}x{} grid, got {}",
                    width * height,
                    width,
                    height,
                    values.len()
                ),
            });
        }
        Ok(Self {
            width,
            height,
            values,
            transform,
        })
    }

    /// A grid with every cell set to `value`.
    pub fn filled(width: usize, height: usize, value: f32, transform: GeoTransform) -> Self {
        Self {
            width,
            height,
            values: vec![value; width * height],
            transform,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// `(height, width)`, matching row-major indexing.
    pub fn shape(&self) -> (usize, usize) {
        (self.height, self.width)
    }

    pub fn transform(&self) -> &GeoTransform {
        &self.transform
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }

    pub fn values_mut(&mut self) -> &mut [f32] {
        &mut self.values
    }

    pub fn get(&self, row: usize, col: usize) -> Option<f32> {
        if row < self.height && col < self.width {
            Some(self.values[row * self.width + col])
        } else {
            None
        }
    }

    pub fn set(&mut self, row: usize, col: usize, value: f32) {
        if row < self.height && col < self.width {
            self.values[row * self.width + col] = value;
        }
    }

    /// Number of non-missing cells.
    pub fn valid_count(&self) -> usize {
        self.values.iter().filter(|v| !v.is_nan()).count()
    }

    pub fn same_shape(&self, other: &Grid) -> bool {
        self.width == other.width && self.height == other.height
    }
}
