//! Geometry repair and rectangular clipping.
//!
//! Shared by extraction, which clips freshly traced swaths, and by the store,
//! which clips stored full-extent swaths on read.

use geo::{unary_union, Area, BooleanOps, BoundingRect, Coord, LineString, MultiPolygon, Polygon};

use crate::bbox::BoundingBox;

/// Resolve self-intersections and overlaps and drop degenerate rings.
///
/// The result is the union of all parts, so touching or overlapping parts
/// are merged and a figure-eight ring splits into two polygons.
pub fn repair(geometry: &MultiPolygon<f64>) -> MultiPolygon<f64> {
    let cleaned: Vec<Polygon<f64>> = geometry.0.iter().filter_map(clean_polygon).collect();
    if cleaned.is_empty() {
        return MultiPolygon(Vec::new());
    }
    let merged = unary_union(&cleaned);
    MultiPolygon(merged.0.iter().filter_map(clean_polygon).collect())
}

/// Remove repeated vertices and rings with fewer than three distinct points or no area.
fn clean_polygon(polygon: &Polygon<f64>) -> Option<Polygon<f64>> {
    let exterior = clean_ring(polygon.exterior())?;
    let interiors = polygon.interiors().iter().filter_map(clean_ring).collect();
    Some(Polygon::new(exterior, interiors))
}

fn clean_ring(ring: &LineString<f64>) -> Option<LineString<f64>> {
    let mut coords: Vec<Coord<f64>> = Vec::with_capacity(ring.0.len());
    for c in &ring.0 {
        if !(c.x.is_finite() && c.y.is_finite()) {
            return None;
        }
        if coords.last() != Some(c) {
            coords.push(*c);
        }
    }
    if coords.first() != coords.last() {
        if let Some(first) = coords.first().copied() {
            coords.push(first);
        }
    }
    if coords.len() < 4 {
        return None;
    }
    let ring = LineString::new(coords);
    if Polygon::new(ring.clone(), vec![]).unsigned_area() == 0.0 {
        return None;
    }
    Some(ring)
}

/// Clip to a rectangle, repairing the result. `None` when nothing with
/// positive area remains.
pub fn clip_to_region(
    geometry: &MultiPolygon<f64>,
    region: &BoundingBox,
) -> Option<MultiPolygon<f64>> {
    let bounds = geometry.bounding_rect()?;
    if bounds.max().x < region.min_x
        || bounds.min().x > region.max_x
        || bounds.max().y < region.min_y
        || bounds.min().y > region.max_y
    {
        return None;
    }

    let clipped = repair(&geometry.intersection(&region.to_multi_polygon()));
    if clipped.0.is_empty() || clipped.unsigned_area() == 0.0 {
        None
    } else {
        Some(clipped)
    }
}
