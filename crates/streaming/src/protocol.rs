//! Esri JSON shapes returned by feature-service `query` endpoints.
//!
//! Only what the fetch pipeline needs is modelled: the feature array, each
//! feature's attribute map and geometry, and the error envelope services
//! return with an HTTP 200.

use foundation::{Geometry, Point, Polygon, Polyline, SpatialReference};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Raw response body, opaque until the pipeline splits it into features.
pub type RawResponse = Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceError {
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawFeatureSet {
    #[serde(default, rename = "spatialReference")]
    pub spatial_reference: Option<SpatialReference>,
    #[serde(default)]
    pub features: Vec<Value>,
    #[serde(default)]
    pub error: Option<ServiceError>,
}

/// One feature with its geometry already converted.
#[derive(Debug, Clone, PartialEq)]
pub struct RawFeature {
    pub attributes: Map<String, Value>,
    pub geometry: Option<Geometry>,
}

impl RawFeature {
    pub fn attribute(&self, field: &str) -> Option<&Value> {
        self.attributes.get(field)
    }
}

#[derive(Debug, Deserialize)]
struct WireFeature {
    #[serde(default)]
    attributes: Map<String, Value>,
    #[serde(default)]
    geometry: Option<WireGeometry>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WireGeometry {
    Point {
        x: f64,
        y: f64,
        #[serde(default, rename = "spatialReference")]
        spatial_reference: Option<SpatialReference>,
    },
    Polygon {
        rings: Vec<Vec<[f64; 2]>>,
        #[serde(default, rename = "spatialReference")]
        spatial_reference: Option<SpatialReference>,
    },
    Polyline {
        paths: Vec<Vec<[f64; 2]>>,
        #[serde(default, rename = "spatialReference")]
        spatial_reference: Option<SpatialReference>,
    },
}

impl WireGeometry {
    fn into_geometry(self, fallback: SpatialReference) -> Geometry {
        match self {
            WireGeometry::Point {
                x,
                y,
                spatial_reference,
            } => Geometry::Point(Point::new(x, y, spatial_reference.unwrap_or(fallback))),
            WireGeometry::Polygon {
                rings,
                spatial_reference,
            } => Geometry::Polygon(Polygon::new(rings, spatial_reference.unwrap_or(fallback))),
            WireGeometry::Polyline {
                paths,
                spatial_reference,
            } => Geometry::Polyline(Polyline {
                paths,
                spatial_reference: spatial_reference.unwrap_or(fallback),
            }),
        }
    }
}

impl RawFeatureSet {
    pub fn from_response(response: &RawResponse) -> Result<Self, serde_json::Error> {
        RawFeatureSet::deserialize(response)
    }

    /// Decode each feature independently; malformed entries are skipped.
    ///
    /// Returns the decoded features and the number skipped.
    pub fn decode_features(&self) -> (Vec<RawFeature>, usize) {
        let fallback = self.spatial_reference.unwrap_or_default();
        let mut out = Vec::with_capacity(self.features.len());
        let mut skipped = 0;
        for value in &self.features {
            match WireFeature::deserialize(value) {
                Ok(wire) => out.push(RawFeature {
                    attributes: wire.attributes,
                    geometry: wire.geometry.map(|g| g.into_geometry(fallback)),
                }),
                Err(e) => {
                    tracing::debug!("skipping malformed feature: {e}");
                    skipped += 1;
                }
            }
        }
        (out, skipped)
    }
}
