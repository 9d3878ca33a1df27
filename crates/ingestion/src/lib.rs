//! Hail swath ingestion library.
//!
//! Turns one calendar day of MRMS hail-size grids into a stored Day Record:
//!
//! ```text
//! CHECK_STORE ─(hit)─────────────────────────────────────────────────────────► DONE
//!      └─(miss)─► LIST_SOURCE ─► FETCH_SOURCE ─► DECODE ─► COMPOSITE ─► EXTRACT ─► STORE ─► CLEANUP ─► DONE
//! ```
//!
//! - [`DayIngester`] runs that state machine for one day
//! - [`BatchDriver`] runs it across a date range, one independent task per day
//! - [`sources`] holds the listing/retrieval collaborators and the public
//!   MRMS S3 implementation
//! - [`schedule`] has the helpers behind the daily job

pub mod batch;
pub mod config;
pub mod day;
pub mod error;
pub mod schedule;
pub mod sources;

// Re-exports
pub use batch::{BatchDriver, BatchSummary};
pub use config::{IngestionConfig, ProductConfig, SourceConfig};
pub use day::{DayIngester, DayOutcome, DayResult};
pub use error::{IngestionError, Result};
pub use schedule::{lookback_start, previous_day, until_noon_utc};
pub use sources::{list_window, parse_key_time, MrmsS3Source, SourceFetcher, SourceLister};
