//! Hail-size thresholds.
//!
//! Thresholds are keyed by whole hundredths of an inch so that they can be
//! compared, hashed and stored without floating point drift.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::SwathError;

/// Canonical cut points in hundredths of an inch: 0.50 through 2.75 in steps of 0.25.
const CANONICAL_HUNDREDTHS: [u32; 10] = [50, 75, 100, 125, 150, 175, 200, 225, 250, 275];

/// Largest accepted threshold, 100 inches, in hundredths.
const MAX_HUNDREDTHS: u32 = 10_000;

/// A single hail-size cut point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Threshold(u32);

impl Threshold {
    /// Build from a key in hundredths of an inch.
    pub const fn from_hundredths(hundredths: u32) -> Self {
        Self(hundredths)
    }

    /// Build from a size in inches, rounded to the nearest hundredth.
    ///
    /// Sizes that round to zero or exceed 100 inches are rejected.
    pub fn from_inches(inches: f64) -> Result<Self, SwathError> {
        if !inches.is_finite() || inches <= 0.0 {
            return Err(SwathError::InvalidThresholds(format!(
                "threshold must be a positive number, got {}",
                inches
            )));
        }
        let hundredths = (inches * 100.0).round();
        if hundredths < 1.0 || hundredths > MAX_HUNDREDTHS as f64 {
            return Err(SwathError::InvalidThresholds(format!(
                "threshold {} is outside 0.01..={} inches",
                inches,
                MAX_HUNDREDTHS / 100
            )));
        }
        Ok(Self(hundredths as u32))
    }

    /// Storage key in hundredths of an inch.
    pub fn key(&self) -> u32 {
        self.0
    }

    /// Size in inches.
    pub fn inches(&self) -> f64 {
        self.0 as f64 / 100.0
    }
}

impl fmt::Display for Threshold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.inches())
    }
}

/// An ordered, de-duplicated set of thresholds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThresholdSet(Vec<Threshold>);

impl ThresholdSet {
    /// The full canonical set. Persisted data is always extracted with this set.
    pub fn canonical() -> Self {
        Self(
            CANONICAL_HUNDREDTHS
                .iter()
                .copied()
                .map(Threshold::from_hundredths)
                .collect(),
        )
    }

    pub fn new(thresholds: impl IntoIterator<Item = Threshold>) -> Self {
        let mut values: Vec<Threshold> = thresholds.into_iter().collect();
        values.sort();
        values.dedup();
        Self(values)
    }

    /// Parse a comma separated list of sizes in inches, e.g. "0.75,1.00,2".
    pub fn parse(s: &str) -> Result<Self, SwathError> {
        let mut thresholds = Vec::new();
        for part in s.split(',').map(str::trim) {
            if part.is_empty() {
                return Err(SwathError::InvalidThresholds(format!(
                    "empty entry in '{}'",
                    s
                )));
            }
            let inches: f64 = part.parse().map_err(|_| {
                SwathError::InvalidThresholds(format!("'{}' is not a number", part))
            })?;
            thresholds.push(Threshold::from_inches(inches)?);
        }
        Ok(Self::new(thresholds))
    }

    /// Thresholds in ascending order.
    pub fn ascending(&self) -> impl Iterator<Item = Threshold> + '_ {
        self.0.iter().copied()
    }

    /// Thresholds in descending order, the order extraction emits them.
    pub fn descending(&self) -> impl Iterator<Item = Threshold> + '_ {
        self.0.iter().rev().copied()
    }

    pub fn contains(&self, threshold: Threshold) -> bool {
        self.0.binary_search(&threshold).is_ok()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Default for ThresholdSet {
    fn default() -> Self {
        Self::canonical()
    }
}
