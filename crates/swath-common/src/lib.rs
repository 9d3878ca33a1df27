//! Common types shared by the hail swath extraction and ingestion crates.

pub mod bbox;
pub mod error;
pub mod feature;
pub mod geometry;
pub mod grid;
pub mod threshold;
pub mod time;

pub use bbox::BoundingBox;
pub use error::{SwathError, SwathResult};
pub use feature::{SwathCollection, SwathPolygon, SwathProperties};
pub use geometry::{clip_to_region, repair};
pub use grid::{GeoTransform, Grid, MISSING};
pub use threshold::{Threshold, ThresholdSet};
pub use time::{format_time, parse_time, DataWindow, DayKey};
