//! Threshold swath extraction.
//!
//! ```text
//! Grid ──► gaussian_blur (once) ──┬─► mask(t_max) ─► polygonize ─► repair ─► smooth ─► simplify ─► area ─► clip ─┐
//!                                 ├─► mask(...)   ─► ...                                                        ├─► nest ─► tag
//!                                 └─► mask(t_min) ─► ...                                                        ┘
//! ```
//!
//! Blurring the continuous field and thresholding afterwards moves a swath
//! edge by a fraction of the blur radius. Blurring a binary mask instead
//! would inflate every swath by multiples of it.
//!
//! Thresholds are cleaned independently, so simplification can push a
//! higher swath past a lower one. The nesting pass walks thresholds from
//! low to high and cuts each swath down to the final swaths one step below.

use geo::{BooleanOps, MultiPolygon};
use rayon::prelude::*;
use swath_common::{Grid, SwathCollection, SwathPolygon, SwathProperties, Threshold, ThresholdSet};
use tracing::{debug, instrument};

use crate::config::ExtractionParams;
use crate::geometry::{clip_to_region, drop_small_parts, repair, simplify, smooth_edges};
use crate::smoothing::gaussian_blur;
use crate::vectorize::polygonize;

/// Attributes shared by every polygon of one extraction run.
#[derive(Debug, Clone, PartialEq)]
pub struct SwathTags {
    pub product: String,
    pub start_time: String,
    pub end_time: String,
    pub source_files: Vec<String>,
    /// One timestamp for the whole multi-threshold run.
    pub created_at: String,
}

impl SwathTags {
    fn properties(&self, threshold: Threshold) -> SwathProperties {
        SwathProperties {
            threshold: threshold.inches(),
            product: self.product.clone(),
            start_time: self.start_time.clone(),
            end_time: self.end_time.clone(),
            source_files: self.source_files.clone(),
            created_at: self.created_at.clone(),
        }
    }
}

/// Turns a composite grid into threshold swath polygons.
#[derive(Debug, Clone, Default)]
pub struct SwathExtractor {
    params: ExtractionParams,
}

impl SwathExtractor {
    pub fn new(params: ExtractionParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &ExtractionParams {
        &self.params
    }

    /// Extract polygons for every threshold, highest threshold first.
    ///
    /// Regions that do not survive clean-up are dropped; the call itself
    /// never fails.
    #[instrument(skip_all, fields(width = grid.width(), height = grid.height(), thresholds = thresholds.len()))]
    pub fn extract(&self, grid: &Grid, thresholds: &ThresholdSet, tags: &SwathTags) -> SwathCollection {
        let smoothed = gaussian_blur(grid, self.params.smoothing_sigma);
        let ordered: Vec<Threshold> = thresholds.descending().collect();

        let mut per_threshold: Vec<Vec<MultiPolygon<f64>>> = ordered
            .par_iter()
            .map(|&threshold| self.extract_threshold(grid, &smoothed, threshold))
            .collect();

        // Ascending walk; `per_threshold` is highest first.
        let mut lower: Option<MultiPolygon<f64>> = None;
        for (threshold, shapes) in ordered.iter().zip(per_threshold.iter_mut()).rev() {
            if let Some(bound) = &lower {
                *shapes = self.nest_within(shapes.as_slice(), bound, *threshold);
            }
            debug!(threshold = %threshold, polygons = shapes.len(), "Extracted threshold");
            lower = Some(repair(&MultiPolygon(
                shapes.iter().flat_map(|s| s.0.iter().cloned()).collect(),
            )));
        }

        let features = ordered
            .iter()
            .zip(per_threshold)
            .flat_map(|(&threshold, shapes)| {
                shapes.into_iter().map(move |geometry| SwathPolygon {
                    geometry,
                    properties: tags.properties(threshold),
                })
            })
            .collect();

        SwathCollection::new(features)
    }

    /// Cut each region down to `bound`, the final swaths of the next lower
    /// threshold, dropping regions left below the area floor.
    fn nest_within(
        &self,
        shapes: &[MultiPolygon<f64>],
        bound: &MultiPolygon<f64>,
        threshold: Threshold,
    ) -> Vec<MultiPolygon<f64>> {
        shapes
            .iter()
            .filter_map(|shape| {
                let nested = drop_small_parts(
                    &repair(&shape.intersection(bound)),
                    self.params.min_area,
                );
                if nested.0.is_empty() {
                    debug!(
                        threshold = %threshold,
                        reason = "outside lower threshold",
                        "Dropped region"
                    );
                    None
                } else {
                    Some(nested)
                }
            })
            .collect()
    }

    /// Cleaned geometries for one threshold, in region order.
    pub fn extract_threshold(
        &self,
        grid: &Grid,
        smoothed: &[f32],
        threshold: Threshold,
    ) -> Vec<MultiPolygon<f64>> {
        let cut = threshold.inches();
        let mask: Vec<bool> = smoothed
            .iter()
            .zip(grid.values())
            .map(|(&s, &raw)| !raw.is_nan() && s as f64 >= cut)
            .collect();

        if !mask.iter().any(|&m| m) {
            return Vec::new();
        }

        polygonize(
            &mask,
            grid.width(),
            grid.height(),
            self.params.connectivity,
            grid.transform(),
        )
        .iter()
        .filter_map(|region| self.clean_region(region, threshold))
        .collect()
    }

    fn clean_region(
        &self,
        region: &MultiPolygon<f64>,
        threshold: Threshold,
    ) -> Option<MultiPolygon<f64>> {
        let shape = repair(region);
        let shape = smooth_edges(&shape, self.params.edge_smoothing);
        let shape = simplify(&shape, self.params.simplify_tolerance);
        let shape = drop_small_parts(&shape, self.params.min_area);
        if shape.0.is_empty() {
            debug!(threshold = %threshold, reason = "below minimum area", "Dropped region");
            return None;
        }
        match &self.params.clip {
            Some(clip) => {
                let clipped = clip_to_region(&shape, clip);
                if clipped.is_none() {
                    debug!(threshold = %threshold, reason = "outside clip region", "Dropped region");
                }
                clipped
            }
            None => Some(shape),
        }
    }
}
