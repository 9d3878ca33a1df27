//! Common test fixtures.

use swath_common::{BoundingBox, GeoTransform, SwathCollection, SwathPolygon, SwathProperties};

/// MRMS object storage layout.
pub mod mrms {
    pub const BUCKET: &str = "noaa-mrms-pds";
    pub const PRODUCT: &str = "MESH_Max_1440min";
    pub const PREFIX: &str = "CONUS/MESH_Max_1440min_00.50";
    pub const SAMPLE_KEY: &str =
        "CONUS/MESH_Max_1440min_00.50/20240501/MRMS_MESH_Max_1440min_00.50_20240501-120000.grib2.gz";
}

/// Days used across the test suite.
pub mod days {
    pub const STORM_DAY: &str = "2024-05-01";
    pub const QUIET_DAY: &str = "2024-05-02";
}

/// Common bounding boxes.
pub mod bbox {
    /// Continental United States.
    pub const CONUS: (f64, f64, f64, f64) = (-130.0, 20.0, -60.0, 55.0);

    /// Covers the generator grids' extent.
    pub const TEST_AREA: (f64, f64, f64, f64) = (-100.0, 39.0, -99.0, 40.0);

    /// Far from anything the generators produce.
    pub const ATLANTIC: (f64, f64, f64, f64) = (-40.0, 30.0, -30.0, 35.0);
}

/// Transform shared by all generator grids.
pub fn test_transform() -> GeoTransform {
    GeoTransform::north_up(-100.0, 40.0, 0.01, 0.01)
}

/// Build a [`BoundingBox`] from a fixture tuple.
pub fn bounding_box(b: (f64, f64, f64, f64)) -> BoundingBox {
    BoundingBox::new(b.0, b.1, b.2, b.3)
}

/// Properties as written by an ingestion run for [`days::STORM_DAY`].
pub fn sample_properties(threshold: f64) -> SwathProperties {
    SwathProperties {
        threshold,
        product: mrms::PRODUCT.to_string(),
        start_time: "2024-05-01T12:00:00Z".to_string(),
        end_time: "2024-05-02T12:00:00Z".to_string(),
        source_files: vec![
            "MRMS_MESH_Max_1440min_00.50_20240502-120000.grib2".to_string(),
        ],
        created_at: "2024-05-03T00:00:00Z".to_string(),
    }
}

/// A square swath with its lower-left corner at (`x`, `y`).
pub fn square_swath(threshold: f64, x: f64, y: f64, size: f64) -> SwathPolygon {
    SwathPolygon {
        geometry: BoundingBox::new(x, y, x + size, y + size).to_multi_polygon(),
        properties: sample_properties(threshold),
    }
}

/// Nested squares at three thresholds around (-99.5, 39.5), highest first.
pub fn sample_collection() -> SwathCollection {
    SwathCollection::new(vec![
        square_swath(2.0, -99.52, 39.48, 0.04),
        square_swath(1.0, -99.55, 39.45, 0.1),
        square_swath(1.0, -99.9, 39.9, 0.05),
        square_swath(0.5, -99.6, 39.4, 0.2),
    ])
}
