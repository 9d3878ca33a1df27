//! Durable, day-keyed storage of hail swaths.
//!
//! One row per calendar day records that the day was ingested; its swaths
//! are stored as one group per (day, threshold) so that threshold-filtered
//! reads touch only the groups they need.

pub mod swath_store;

pub use swath_store::{DayInfo, DayRecord, ReadFilter, StoreStats, SwathStore};
