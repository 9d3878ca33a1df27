//! Conversion of decoded source arrays into canonical grids.
//!
//! MRMS files store MESH in millimetres on a 0-360 longitude axis with a very
//! large float as the "no coverage" marker. Normalization maps all of that to
//! inches on a -180..180 axis with [`MISSING`] for unusable cells.

use serde::{Deserialize, Serialize};
use swath_common::{GeoTransform, Grid, MISSING};

use crate::error::{GridProcessorError, Result};

/// Largest value representable by an IEEE single-precision float; MRMS uses it
/// as the missing-data marker.
pub const MRMS_MISSING_VALUE: f64 = 3.4028234663852886e38;

/// Millimetres to inches.
pub const MM_TO_INCHES: f64 = 1.0 / 25.4;

/// A decoded array before normalization.
///
/// `values` is row-major with `lats.len()` rows and `lons.len()` columns.
#[derive(Debug, Clone, PartialEq)]
pub struct RawGrid {
    pub values: Vec<f32>,
    pub lats: Vec<f64>,
    pub lons: Vec<f64>,
}

/// Per-product encoding parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormalizeParams {
    /// The format's maximum magnitude. Raw values at or above half of it are missing.
    pub missing_value: f64,
    /// Linear factor from raw units to physical units.
    pub unit_scale: f64,
}

impl Default for NormalizeParams {
    fn default() -> Self {
        Self {
            missing_value: MRMS_MISSING_VALUE,
            unit_scale: MM_TO_INCHES,
        }
    }
}

/// Description of the normalized grid's coordinate axes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridMetadata {
    pub lon_min: f64,
    pub lon_max: f64,
    pub lat_min: f64,
    pub lat_max: f64,
    pub lon_res: f64,
    pub lat_res: f64,
}

/// Normalize a decoded array.
///
/// Rows of the output run north to south and columns west to east whatever
/// the order of the input axes.
pub fn normalize(raw: &RawGrid, params: &NormalizeParams) -> Result<(Grid, GridMetadata)> {
    let height = raw.lats.len();
    let width = raw.lons.len();
    if height < 2 || width < 2 {
        return Err(GridProcessorError::invalid_metadata(format!(
            "need at least two samples per axis, got {} lats and {} lons",
            height, width
        )));
    }
    if raw.values.len() != width * height {
        return Err(GridProcessorError::invalid_metadata(format!(
            "expected {} values for {}x{} grid, got {}",
            width * height,
            width,
            height,
            raw.values.len()
        )));
    }
    if raw.lats.iter().chain(&raw.lons).any(|v| !v.is_finite()) {
        return Err(GridProcessorError::invalid_metadata(
            "coordinate arrays contain non-finite values",
        ));
    }

    let lons: Vec<f64> = raw
        .lons
        .iter()
        .map(|&lon| if lon > 180.0 { lon - 360.0 } else { lon })
        .collect();

    let flip_rows = raw.lats[0] < raw.lats[height - 1];
    let flip_cols = lons[0] > lons[width - 1];

    let (lat_min, lat_max) = min_max(&raw.lats);
    let (lon_min, lon_max) = min_max(&lons);
    let lat_res = (lat_max - lat_min) / (height - 1) as f64;
    let lon_res = (lon_max - lon_min) / (width - 1) as f64;
    if lat_res <= 0.0 || lon_res <= 0.0 {
        return Err(GridProcessorError::invalid_metadata(
            "coordinate axes have zero extent",
        ));
    }

    let half_missing = (params.missing_value / 2.0) as f32;
    let scale = params.unit_scale as f32;

    let mut values = Vec::with_capacity(width * height);
    for out_row in 0..height {
        let src_row = if flip_rows { height - 1 - out_row } else { out_row };
        let row = &raw.values[src_row * width..(src_row + 1) * width];
        for out_col in 0..width {
            let src_col = if flip_cols { width - 1 - out_col } else { out_col };
            values.push(normalize_value(row[src_col], half_missing, scale));
        }
    }

    let transform = GeoTransform::north_up(
        lon_min - lon_res / 2.0,
        lat_max + lat_res / 2.0,
        lon_res,
        lat_res,
    );
    let grid = Grid::new(width, height, values, transform)?;

    Ok((
        grid,
        GridMetadata {
            lon_min,
            lon_max,
            lat_min,
            lat_max,
            lon_res,
            lat_res,
        },
    ))
}

/// Sentinel substitution happens before scaling so that the missing marker is
/// compared in raw units.
fn normalize_value(raw: f32, half_missing: f32, scale: f32) -> f32 {
    if raw.is_nan() || raw >= half_missing || raw < 0.0 {
        MISSING
    } else {
        raw * scale
    }
}

fn min_max(values: &[f64]) -> (f64, f64) {
    values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        })
}
