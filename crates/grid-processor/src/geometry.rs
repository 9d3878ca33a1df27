//! Edge smoothing, simplification and area filtering of traced swaths.

use geo::{Area, Buffer, MultiPolygon, SimplifyVwPreserve, Validation};

pub use swath_common::geometry::{clip_to_region, repair};

/// Expand by `epsilon` then contract by `epsilon`, filling pixel staircase notches.
/// Non-positive `epsilon` returns the input unchanged.
pub fn smooth_edges(geometry: &MultiPolygon<f64>, epsilon: f64) -> MultiPolygon<f64> {
    if epsilon <= 0.0 {
        return geometry.clone();
    }
    let grown = geometry.buffer(epsilon);
    let shrunk = grown.buffer(-epsilon);
    repair(&shrunk)
}

/// Topology-preserving Visvalingam-Whyatt simplification.
///
/// `tolerance` is a distance in degrees; vertices whose triangle area is
/// below `tolerance²` are removed. Polygons no larger than that area, and
/// polygons that simplify to an invalid shape, are kept unsimplified.
pub fn simplify(geometry: &MultiPolygon<f64>, tolerance: f64) -> MultiPolygon<f64> {
    if tolerance <= 0.0 {
        return geometry.clone();
    }
    let epsilon = tolerance * tolerance;
    let simplified = geometry
        .0
        .iter()
        .map(|polygon| {
            if polygon.unsigned_area() <= epsilon {
                return polygon.clone();
            }
            let candidate = polygon.simplify_vw_preserve(epsilon);
            if candidate.is_valid() {
                candidate
            } else {
                polygon.clone()
            }
        })
        .collect();
    repair(&MultiPolygon(simplified))
}

/// Keep only the parts whose area reaches `min_area`.
pub fn drop_small_parts(geometry: &MultiPolygon<f64>, min_area: f64) -> MultiPolygon<f64> {
    MultiPolygon(
        geometry
            .0
            .iter()
            .filter(|p| p.unsigned_area() >= min_area)
            .cloned()
            .collect(),
    )
}
