//! Tagged swath polygons and their GeoJSON form.

use geo::MultiPolygon;
use geojson::{Feature, FeatureCollection, Geometry, JsonObject, Value};
use serde::{Deserialize, Serialize};

use crate::error::{SwathError, SwathResult};
use crate::threshold::Threshold;

/// Attributes carried by every swath polygon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwathProperties {
    /// Threshold in inches.
    pub threshold: f64,
    pub product: String,
    pub start_time: String,
    pub end_time: String,
    pub source_files: Vec<String>,
    pub created_at: String,
}

impl SwathProperties {
    pub fn threshold_key(&self) -> SwathResult<Threshold> {
        Threshold::from_inches(self.threshold)
    }
}

/// One connected region at or above a threshold.
#[derive(Debug, Clone, PartialEq)]
pub struct SwathPolygon {
    pub geometry: MultiPolygon<f64>,
    pub properties: SwathProperties,
}

impl SwathPolygon {
    pub fn to_feature(&self) -> SwathResult<Feature> {
        let properties = match serde_json::to_value(&self.properties)? {
            serde_json::Value::Object(map) => map,
            other => {
                return Err(SwathError::InternalError(format!(
                    "swath properties serialized to non-object {}",
                    other
                )))
            }
        };

        Ok(Feature {
            bbox: None,
            geometry: Some(Geometry::new(Value::from(&self.geometry))),
            id: None,
            properties: Some(properties),
            foreign_members: None,
        })
    }

    pub fn from_feature(feature: Feature) -> SwathResult<Self> {
        let geometry = feature
            .geometry
            .ok_or_else(|| SwathError::GeometryError("feature has no geometry".to_string()))?;
        let geometry: geo::Geometry<f64> = geometry
            .try_into()
            .map_err(|e: geojson::Error| SwathError::GeometryError(e.to_string()))?;
        let geometry = match geometry {
            geo::Geometry::MultiPolygon(mp) => mp,
            geo::Geometry::Polygon(p) => MultiPolygon(vec![p]),
            _ => {
                return Err(SwathError::GeometryError(
                    "swath geometry must be a Polygon or MultiPolygon".to_string(),
                ))
            }
        };

        let properties: SwathProperties = serde_json::from_value(serde_json::Value::Object(
            feature.properties.unwrap_or_else(JsonObject::new),
        ))?;

        Ok(Self {
            geometry,
            properties,
        })
    }
}

/// An ordered set of swath polygons, the result of extraction or a read.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SwathCollection {
    pub features: Vec<SwathPolygon>,
}

impl SwathCollection {
    pub fn new(features: Vec<SwathPolygon>) -> Self {
        Self { features }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Features whose threshold matches `threshold`.
    pub fn at_threshold(&self, threshold: Threshold) -> impl Iterator<Item = &SwathPolygon> {
        self.features
            .iter()
            .filter(move |f| f.properties.threshold_key().ok() == Some(threshold))
    }

    pub fn to_geojson(&self) -> SwathResult<FeatureCollection> {
        let features = self
            .features
            .iter()
            .map(SwathPolygon::to_feature)
            .collect::<SwathResult<Vec<_>>>()?;
        Ok(FeatureCollection {
            bbox: None,
            features,
            foreign_members: None,
        })
    }

    pub fn to_geojson_string(&self) -> SwathResult<String> {
        Ok(serde_json::to_string(&self.to_geojson()?)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::polygon;

    fn sample() -> SwathPolygon {
        SwathPolygon {
            geometry: MultiPolygon(vec![polygon![
                (x: -100.0, y: 40.0),
                (x: -99.9, y: 40.0),
                (x: -99.9, y: 40.1),
                (x: -100.0, y: 40.1),
                (x: -100.0, y: 40.0),
            ]]),
            properties: SwathProperties {
                threshold: 1.25,
                product: "MESH_Max_1440min".to_string(),
                start_time: "2024-05-01T12:00:00Z".to_string(),
                end_time: "2024-05-02T12:00:00Z".to_string(),
                source_files: vec!["a.grib2".to_string()],
                created_at: "2024-05-03T00:00:00Z".to_string(),
            },
        }
    }

    #[test]
    fn test_feature_round_trip() {
        let swath = sample();
        let feature = swath.to_feature().unwrap();
        let props = feature.properties.as_ref().unwrap();
        assert_eq!(props["threshold"], serde_json::json!(1.25));
        assert_eq!(props["source_files"], serde_json::json!(["a.grib2"]));

        let back = SwathPolygon::from_feature(feature).unwrap();
        assert_eq!(back, swath);
    }

    #[test]
    fn test_polygon_feature_is_accepted() {
        let swath = sample();
        let mut feature = swath.to_feature().unwrap();
        feature.geometry = Some(Geometry::new(Value::from(&swath.geometry.0[0])));
        let back = SwathPolygon::from_feature(feature).unwrap();
        assert_eq!(back.geometry, swath.geometry);
    }

    #[test]
    fn test_point_feature_is_rejected() {
        let mut feature = sample().to_feature().unwrap();
        feature.geometry = Some(Geometry::new(Value::Point(vec![0.0, 0.0])));
        assert!(SwathPolygon::from_feature(feature).is_err());
    }

    #[test]
    fn test_collection_geojson() {
        let collection = SwathCollection::new(vec![sample()]);
        let json = collection.to_geojson_string().unwrap();
        assert!(json.contains("\"FeatureCollection\""));
        assert!(json.contains("\"MultiPolygon\""));
        assert_eq!(
            collection
                .at_threshold(Threshold::from_hundredths(125))
                .count(),
            1
        );
        assert!(SwathCollection::empty().to_geojson().unwrap().features.is_empty());
    }
}
