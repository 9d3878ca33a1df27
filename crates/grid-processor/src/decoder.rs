//! Source file decoding.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use tracing::{debug, instrument};

use crate::error::{GridProcessorError, Result};
use crate::normalize::RawGrid;

/// Reads a local source file into a raw array with its coordinate axes.
///
/// Implementations are blocking; callers run them off the async runtime.
pub trait GridDecoder: Send + Sync {
    fn decode(&self, path: &Path) -> Result<RawGrid>;
}

/// Decoder for single-field GRIB2 files on a regular lat/lon grid, the layout
/// MRMS publishes.
#[derive(Debug, Clone, Copy, Default)]
pub struct Grib2Decoder;

impl GridDecoder for Grib2Decoder {
    #[instrument(skip(self), fields(path = %path.display()))]
    fn decode(&self, path: &Path) -> Result<RawGrid> {
        let reader = BufReader::new(File::open(path)?);
        let grib2 = grib::from_reader(reader)
            .map_err(|e| GridProcessorError::decode_failed(format!("{}: {}", path.display(), e)))?;

        let (_, submessage) = grib2
            .iter()
            .next()
            .ok_or_else(|| GridProcessorError::decode_failed("GRIB2 file has no messages"))?;

        let latlons: Vec<(f32, f32)> = submessage
            .latlons()
            .map_err(|e| GridProcessorError::decode_failed(format!("grid definition: {}", e)))?
            .collect();

        let decoder = grib::Grib2SubmessageDecoder::from(submessage)
            .map_err(|e| GridProcessorError::decode_failed(format!("decoder: {}", e)))?;
        let values: Vec<f32> = decoder
            .dispatch()
            .map_err(|e| GridProcessorError::decode_failed(format!("unpacking: {}", e)))?
            .collect();

        let (lats, lons) = axes_from_points(&latlons)?;
        debug!(rows = lats.len(), cols = lons.len(), "Decoded GRIB2 field");

        Ok(RawGrid { values, lats, lons })
    }
}

/// Recover 1-D axes from the row-major point list of a regular lat/lon grid.
pub fn axes_from_points(points: &[(f32, f32)]) -> Result<(Vec<f64>, Vec<f64>)> {
    let (first_lat, _) = *points
        .first()
        .ok_or_else(|| GridProcessorError::invalid_metadata("grid has no points"))?;

    let ni = points
        .iter()
        .take_while(|(lat, _)| *lat == first_lat)
        .count();
    if ni == 0 || points.len() % ni != 0 {
        return Err(GridProcessorError::invalid_metadata(format!(
            "{} points do not form rows of {}",
            points.len(),
            ni
        )));
    }

    let lons = points[..ni].iter().map(|&(_, lon)| lon as f64).collect();
    let lats = points.iter().step_by(ni).map(|&(lat, _)| lat as f64).collect();
    Ok((lats, lons))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_axes_from_points() {
        let points = vec![
            (40.0, 260.0),
            (40.0, 260.5),
            (40.0, 261.0),
            (39.5, 260.0),
            (39.5, 260.5),
            (39.5, 261.0),
        ];
        let (lats, lons) = axes_from_points(&points).unwrap();
        assert_eq!(lats, vec![40.0, 39.5]);
        assert_eq!(lons, vec![260.0, 260.5, 261.0]);
    }

    #[test]
    fn test_axes_from_ragged_points_fails() {
        let points = vec![(40.0, 0.0), (40.0, 1.0), (39.0, 0.0)];
        assert!(axes_from_points(&points).is_err());
        assert!(axes_from_points(&[]).is_err());
    }

    #[test]
    fn test_decode_missing_file_fails() {
        let err = Grib2Decoder
            .decode(Path::new("/nonexistent/file.grib2"))
            .unwrap_err();
        assert!(matches!(err, GridProcessorError::Io(_)));
    }

    #[test]
    fn test_decode_garbage_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("garbage.grib2");
        std::fs::write(&path, b"definitely not grib").unwrap();
        assert!(Grib2Decoder.decode(&path).is_err());
    }
}
