//! Configuration for swath extraction.

use serde::{Deserialize, Serialize};
use swath_common::BoundingBox;

use crate::error::{GridProcessorError, Result};
use crate::vectorize::Connectivity;

/// Tuning parameters for [`crate::SwathExtractor`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionParams {
    /// Standard deviation, in cells, of the Gaussian applied to the magnitude
    /// field before thresholding. Zero disables the blur.
    pub smoothing_sigma: f64,

    /// Distance in degrees for the expand/contract pass. Zero disables it.
    pub edge_smoothing: f64,

    /// Simplification tolerance in degrees. Vertices whose triangle area is
    /// below its square are removed. Zero disables simplification.
    pub simplify_tolerance: f64,

    /// Parts smaller than this many square degrees are dropped.
    pub min_area: f64,

    /// Neighborhood joining mask cells into one polygon.
    pub connectivity: Connectivity,

    /// Optional clip rectangle.
    pub clip: Option<BoundingBox>,
}

impl Default for ExtractionParams {
    fn default() -> Self {
        Self {
            smoothing_sigma: 1.0,
            edge_smoothing: 0.0,
            simplify_tolerance: 0.005,
            min_area: 1e-6,
            connectivity: Connectivity::Four,
            clip: None,
        }
    }
}

impl ExtractionParams {
    /// Load parameters from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let mut params = Self::default();

        if let Ok(val) = std::env::var("SMOOTHING_SIGMA") {
            if let Ok(v) = val.parse() {
                params.smoothing_sigma = v;
            }
        }

        if let Ok(val) = std::env::var("EDGE_SMOOTHING") {
            if let Ok(v) = val.parse() {
                params.edge_smoothing = v;
            }
        }

        if let Ok(val) = std::env::var("SIMPLIFY_TOLERANCE") {
            if let Ok(v) = val.parse() {
                params.simplify_tolerance = v;
            }
        }

        if let Ok(val) = std::env::var("MIN_AREA_DEG2") {
            if let Ok(v) = val.parse() {
                params.min_area = v;
            }
        }

        if let Ok(val) = std::env::var("SWATH_CONNECTIVITY") {
            if let Some(c) = Connectivity::from_str(&val) {
                params.connectivity = c;
            }
        }

        params
    }

    /// Copy of these parameters with a different clip region.
    pub fn with_clip(mut self, clip: Option<BoundingBox>) -> Self {
        self.clip = clip;
        self
    }

    /// Validate the parameters.
    pub fn validate(&self) -> Result<()> {
        let non_negative = [
            ("smoothing_sigma", self.smoothing_sigma),
            ("edge_smoothing", self.edge_smoothing),
            ("simplify_tolerance", self.simplify_tolerance),
            ("min_area", self.min_area),
        ];
        for (name, value) in non_negative {
            if !value.is_finite() || value < 0.0 {
                return Err(GridProcessorError::ConfigError(format!(
                    "{} must be a non-negative number, got {}",
                    name, value
                )));
            }
        }

        if let Some(clip) = &self.clip {
            if clip.width() <= 0.0 || clip.height() <= 0.0 {
                return Err(GridProcessorError::ConfigError(
                    "clip region must have positive width and height".to_string(),
                ));
            }
        }

        Ok(())
    }
}
