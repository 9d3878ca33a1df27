//! Raster mask to polygon conversion.
//!
//! Each connected region of `true` cells is traced along pixel edges into
//! closed rings. Rings are built in pixel-corner space (column, row) and only
//! mapped to geographic coordinates at the end, so that vertex matching is
//! exact integer comparison.

use std::collections::{BTreeMap, VecDeque};

use geo::{unary_union, BooleanOps, Coord, LineString, MultiPolygon, Polygon};
use serde::{Deserialize, Serialize};
use swath_common::GeoTransform;

/// Which neighbors join two mask cells into one region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Connectivity {
    /// Edge neighbors only.
    #[default]
    Four,
    /// Edge and corner neighbors.
    Eight,
}

impl Connectivity {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim() {
            "4" | "four" => Some(Connectivity::Four),
            "8" | "eight" => Some(Connectivity::Eight),
            _ => None,
        }
    }

    fn offsets(&self) -> &'static [(isize, isize)] {
        match self {
            Connectivity::Four => &[(-1, 0), (1, 0), (0, -1), (0, 1)],
            Connectivity::Eight => &[
                (-1, -1),
                (-1, 0),
                (-1, 1),
                (0, -1),
                (0, 1),
                (1, -1),
                (1, 0),
                (1, 1),
            ],
        }
    }
}

type Vertex = (i64, i64);

/// Label connected regions. Returns per-cell labels (0 = outside the mask)
/// and the number of regions.
pub fn label_regions(
    mask: &[bool],
    width: usize,
    height: usize,
    connectivity: Connectivity,
) -> (Vec<u32>, u32) {
    let mut labels = vec![0u32; mask.len()];
    let mut next = 0u32;
    let mut queue = VecDeque::new();

    for start in 0..mask.len() {
        if !mask[start] || labels[start] != 0 {
            continue;
        }
        next += 1;
        labels[start] = next;
        queue.push_back(start);

        while let Some(idx) = queue.pop_front() {
            let row = (idx / width) as isize;
            let col = (idx % width) as isize;
            for (dr, dc) in connectivity.offsets() {
                let r = row + dr;
                let c = col + dc;
                if r < 0 || c < 0 || r >= height as isize || c >= width as isize {
                    continue;
                }
                let n = r as usize * width + c as usize;
                if mask[n] && labels[n] == 0 {
                    labels[n] = next;
                    queue.push_back(n);
                }
            }
        }
    }

    (labels, next)
}

/// Convert every connected region of `mask` into a multipolygon in the
/// coordinate space of `transform`. Regions are returned in label order
/// (top-left first). Rings that collapse to zero area are dropped.
pub fn polygonize(
    mask: &[bool],
    width: usize,
    height: usize,
    connectivity: Connectivity,
    transform: &GeoTransform,
) -> Vec<MultiPolygon<f64>> {
    let (labels, count) = label_regions(mask, width, height, connectivity);
    if count == 0 {
        return Vec::new();
    }

    let mut cells: Vec<Vec<(usize, usize)>> = vec![Vec::new(); count as usize];
    for (idx, &label) in labels.iter().enumerate() {
        if label != 0 {
            cells[label as usize - 1].push((idx / width, idx % width));
        }
    }

    let inside = |row: isize, col: isize| -> bool {
        row >= 0
            && col >= 0
            && (row as usize) < height
            && (col as usize) < width
            && mask[row as usize * width + col as usize]
    };

    cells
        .iter()
        .filter_map(|region| {
            let edges = boundary_edges(region, &inside);
            let rings = trace_rings(edges, connectivity);
            assemble(rings, transform)
        })
        .collect()
}

/// Directed boundary edges of a region, oriented clockwise on screen
/// (interior on the right when rows grow downward).
fn boundary_edges(
    region: &[(usize, usize)],
    inside: &impl Fn(isize, isize) -> bool,
) -> BTreeMap<Vertex, Vec<Vertex>> {
    let mut edges: BTreeMap<Vertex, Vec<Vertex>> = BTreeMap::new();
    let mut push = |from: Vertex, to: Vertex| edges.entry(from).or_default().push(to);

    for &(row, col) in region {
        let (r, c) = (row as isize, col as isize);
        let (x, y) = (col as i64, row as i64);
        if !inside(r - 1, c) {
            push((x, y), (x + 1, y));
        }
        if !inside(r, c + 1) {
            push((x + 1, y), (x + 1, y + 1));
        }
        if !inside(r + 1, c) {
            push((x + 1, y + 1), (x, y + 1));
        }
        if !inside(r, c - 1) {
            push((x, y + 1), (x, y));
        }
    }

    edges
}

/// Link directed edges into closed rings.
///
/// Where two cells of a region meet only at a corner the vertex has two
/// outgoing edges. Four-connectivity keeps the cells apart by turning right;
/// eight-connectivity joins them by turning left.
fn trace_rings(
    mut edges: BTreeMap<Vertex, Vec<Vertex>>,
    connectivity: Connectivity,
) -> Vec<Vec<Vertex>> {
    let mut rings = Vec::new();

    loop {
        let start = edges
            .iter()
            .find(|(_, outs)| outs.len() == 1)
            .or_else(|| edges.iter().find(|(_, outs)| !outs.is_empty()))
            .map(|(v, _)| *v);
        let Some(start) = start else { break };

        let mut ring = vec![start];
        let mut current = start;
        let mut heading: Option<Vertex> = None;

        loop {
            let Some(next) = take_edge(&mut edges, current, heading, connectivity) else {
                // Dangling edge: the ring cannot be closed, discard it.
                ring.clear();
                break;
            };
            heading = Some((next.0 - current.0, next.1 - current.1));
            current = next;
            if current == start {
                break;
            }
            ring.push(current);
        }

        edges.retain(|_, outs| !outs.is_empty());
        if ring.len() >= 4 {
            rings.push(drop_collinear(ring));
        }
    }

    rings
}

fn take_edge(
    edges: &mut BTreeMap<Vertex, Vec<Vertex>>,
    at: Vertex,
    heading: Option<Vertex>,
    connectivity: Connectivity,
) -> Option<Vertex> {
    let outs = edges.get_mut(&at)?;
    if outs.is_empty() {
        return None;
    }
    if outs.len() == 1 {
        return outs.pop();
    }

    let preferred = heading.map(|(dx, dy)| match connectivity {
        Connectivity::Four => (-dy, dx),
        Connectivity::Eight => (dy, -dx),
    });
    let pos = preferred
        .and_then(|dir| {
            outs.iter()
                .position(|to| (to.0 - at.0, to.1 - at.1) == dir)
        })
        .unwrap_or(0);
    Some(outs.swap_remove(pos))
}

fn drop_collinear(ring: Vec<Vertex>) -> Vec<Vertex> {
    let n = ring.len();
    let mut out = Vec::with_capacity(n);
    for i in 0..n {
        let prev = ring[(i + n - 1) % n];
        let cur = ring[i];
        let next = ring[(i + 1) % n];
        let d1 = (cur.0 - prev.0, cur.1 - prev.1);
        let d2 = (next.0 - cur.0, next.1 - cur.1);
        if d1.0 * d2.1 - d1.1 * d2.0 != 0 {
            out.push(cur);
        }
    }
    out
}

/// Twice the signed area in pixel space; positive for exterior rings.
fn signed_area2(ring: &[Vertex]) -> i64 {
    let n = ring.len();
    (0..n)
        .map(|i| {
            let (x1, y1) = ring[i];
            let (x2, y2) = ring[(i + 1) % n];
            x1 * y2 - x2 * y1
        })
        .sum()
}

fn to_line_string(ring: &[Vertex], transform: &GeoTransform) -> LineString<f64> {
    let mut coords: Vec<Coord<f64>> = ring
        .iter()
        .map(|&(x, y)| {
            let (gx, gy) = transform.apply(x as f64, y as f64);
            Coord { x: gx, y: gy }
        })
        .collect();
    if let Some(first) = coords.first().copied() {
        coords.push(first);
    }
    LineString::new(coords)
}

fn assemble(rings: Vec<Vec<Vertex>>, transform: &GeoTransform) -> Option<MultiPolygon<f64>> {
    let mut exteriors = Vec::new();
    let mut holes = Vec::new();
    for ring in rings {
        if ring.len() < 3 {
            continue;
        }
        match signed_area2(&ring) {
            a if a > 0 => exteriors.push(to_line_string(&ring, transform)),
            a if a < 0 => holes.push(to_line_string(&ring, transform)),
            _ => {}
        }
    }

    match exteriors.len() {
        0 => None,
        1 => {
            let exterior = exteriors.pop()?;
            Some(MultiPolygon(vec![Polygon::new(exterior, holes)]))
        }
        _ => {
            let outer: Vec<Polygon<f64>> = exteriors
                .into_iter()
                .map(|ring| Polygon::new(ring, vec![]))
                .collect();
            let outer = unary_union(&outer);
            if holes.is_empty() {
                return Some(outer);
            }
            let inner: Vec<Polygon<f64>> = holes
                .into_iter()
                .map(|ring| Polygon::new(ring, vec![]))
                .collect();
            Some(outer.difference(&unary_union(&inner)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::Area;

    fn unit() -> GeoTransform {
        GeoTransform::north_up(0.0, 0.0, 1.0, 1.0)
    }

    fn mask_from(rows: &[&str]) -> (Vec<bool>, usize, usize) {
        let height = rows.len();
        let width = rows[0].len();
        let mask = rows
            .iter()
            .flat_map(|r| r.chars().map(|c| c == '#'))
            .collect();
        (mask, width, height)
    }

    #[test]
    fn test_single_block_is_one_square() {
        let (mask, w, h) = mask_from(&["....", ".##.", ".##.", "...."]);
        let polys = polygonize(&mask, w, h, Connectivity::Four, &unit());
        assert_eq!(polys.len(), 1);
        let poly = &polys[0].0[0];
        assert_eq!(poly.exterior().0.len(), 5);
        assert!((polys[0].unsigned_area() - 4.0).abs() < 1e-12);
    }

    #[test]
    fn test_disconnected_regions_are_separate() {
        let (mask, w, h) = mask_from(&["#...#", ".....", "#...."]);
        let polys = polygonize(&mask, w, h, Connectivity::Four, &unit());
        assert_eq!(polys.len(), 3);
    }

    #[test]
    fn test_diagonal_cells_follow_connectivity() {
        let (mask, w, h) = mask_from(&["#.", ".#"]);
        let four = polygonize(&mask, w, h, Connectivity::Four, &unit());
        assert_eq!(four.len(), 2);
        for p in &four {
            assert!((p.unsigned_area() - 1.0).abs() < 1e-12);
        }

        let eight = polygonize(&mask, w, h, Connectivity::Eight, &unit());
        assert_eq!(eight.len(), 1);
        assert!((eight[0].unsigned_area() - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_ring_keeps_its_hole() {
        let (mask, w, h) = mask_from(&["###", "#.#", "###"]);
        let polys = polygonize(&mask, w, h, Connectivity::Four, &unit());
        assert_eq!(polys.len(), 1);
        let poly = &polys[0].0[0];
        assert_eq!(poly.interiors().len(), 1);
        assert!((polys[0].unsigned_area() - 8.0).abs() < 1e-12);
    }

    #[test]
    fn test_l_shape_drops_collinear_vertices() {
        let (mask, w, h) = mask_from(&["###", "#..", "#.."]);
        let polys = polygonize(&mask, w, h, Connectivity::Four, &unit());
        assert_eq!(polys.len(), 1);
        // Six corners plus the closing coordinate.
        assert_eq!(polys[0].0[0].exterior().0.len(), 7);
        assert!((polys[0].unsigned_area() - 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_transform_is_applied() {
        let (mask, w, h) = mask_from(&["#"]);
        let t = GeoTransform::north_up(-100.0, 40.0, 0.01, 0.01);
        let polys = polygonize(&mask, w, h, Connectivity::Four, &t);
        let ext = polys[0].0[0].exterior();
        let xs: Vec<f64> = ext.0.iter().map(|c| c.x).collect();
        let ys: Vec<f64> = ext.0.iter().map(|c| c.y).collect();
        assert!(xs.iter().all(|x| (*x + 100.0).abs() < 1e-9 || (*x + 99.99).abs() < 1e-9));
        assert!(ys.iter().all(|y| (*y - 40.0).abs() < 1e-9 || (*y - 39.99).abs() < 1e-9));
    }

    #[test]
    fn test_empty_mask() {
        let mask = vec![false; 9];
        assert!(polygonize(&mask, 3, 3, Connectivity::Eight, &unit()).is_empty());
    }

    #[test]
    fn test_connectivity_from_str() {
        assert_eq!(Connectivity::from_str("8"), Some(Connectivity::Eight));
        assert_eq!(Connectivity::from_str("four"), Some(Connectivity::Four));
        assert_eq!(Connectivity::from_str("6"), None);
    }
}
