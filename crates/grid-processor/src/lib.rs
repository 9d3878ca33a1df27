//! Hail grid processing.
//!
//! Turns decoded MESH fields into threshold swath polygons:
//!
//! ```text
//! GRIB2 file
//!      │
//!      ▼
//! GridDecoder::decode ──► RawGrid
//!      │
//!      ▼
//! normalize ──► Grid (inches, NaN = missing, -180..180)
//!      │
//!      ▼
//! MaxCompositor::add (one grid at a time)
//!      │
//!      ▼
//! SwathExtractor::extract ──► SwathCollection
//! ```

pub mod composite;
pub mod config;
pub mod decoder;
pub mod error;
pub mod extract;
pub mod geometry;
pub mod normalize;
pub mod smoothing;
pub mod vectorize;

pub use composite::{composite_max, max_into, MaxCompositor};
pub use config::ExtractionParams;
pub use decoder::{Grib2Decoder, GridDecoder};
pub use error::{GridProcessorError, Result};
pub use extract::{SwathExtractor, SwathTags};
pub use geometry::{clip_to_region, repair};
pub use normalize::{
    normalize, GridMetadata, NormalizeParams, RawGrid, MM_TO_INCHES, MRMS_MISSING_VALUE,
};
pub use vectorize::Connectivity;
