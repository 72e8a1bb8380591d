use foundation::{Extent, InvalidGeometry, Polygon, SpatialReference};
use serde::{Deserialize, Serialize};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryKind {
    /// Scoped to the local boundary polygon.
    Local,
    /// Scoped to the current map extent.
    Viewport,
}

/// Spatial filter for one feature fetch.
///
/// The geometry is always a validated polygon with explicitly closed rings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundaryQuery {
    pub kind: QueryKind,
    pub geometry: Polygon,
}

impl BoundaryQuery {
    pub fn local(boundary: &Polygon) -> Result<Self, InvalidGeometry> {
        Ok(Self {
            kind: QueryKind::Local,
            geometry: boundary.closed()?,
        })
    }

    /// Extent-scoped query in `target`, reprojecting only when the extent's
    /// reference is not equivalent to it.
    pub fn viewport(extent: &Extent, target: SpatialReference) -> Result<Self, InvalidGeometry> {
        extent.validate()?;
        let extent = if extent.spatial_reference.is_equivalent(&target) {
            *extent
        } else {
            let projected = extent.project(target)?;
            projected.validate()?;
            projected
        };
        Ok(Self {
            kind: QueryKind::Viewport,
            geometry: Polygon::from_extent(&extent),
        })
    }

    pub fn spatial_reference(&self) -> SpatialReference {
        self.geometry.spatial_reference
    }

    /// ArcGIS REST `query` parameters for this filter.
    pub fn to_query_params(&self, out_sr: SpatialReference) -> Vec<(&'static str, String)> {
        let geometry = serde_json::json!({
            "rings": self.geometry.rings,
            "spatialReference": { "wkid": self.geometry.spatial_reference.wkid },
        });
        vec![
            ("f", "json".to_string()),
            ("where", "1=1".to_string()),
            ("outFields", "*".to_string()),
            ("returnGeometry", "true".to_string()),
            ("geometry", geometry.to_string()),
            ("geometryType", "esriGeometryPolygon".to_string()),
            ("spatialRel", "esriSpatialRelIntersects".to_string()),
            ("inSR", self.geometry.spatial_reference.wkid.to_string()),
            ("outSR", out_sr.wkid.to_string()),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::{BoundaryQuery, QueryKind};
    use foundation::{Extent, InvalidGeometry, Polygon, SpatialReference};

    #[test]
    fn local_query_closes_boundary() {
        let open = Polygon::new(
            vec![vec![[0.0, 0.0], [0.0, 2.0], [2.0, 2.0], [2.0, 0.0]]],
            SpatialReference::WEB_MERCATOR,
        );
        let q = BoundaryQuery::local(&open).expect("query");
        assert_eq!(q.kind, QueryKind::Local);
        assert_eq!(q.geometry.rings[0].len(), 5);
    }

    #[test]
    fn viewport_query_passes_through_equivalent_reference() {
        let e = Extent::new(10.0, 20.0, 30.0, 40.0, SpatialReference::new(3857));
        let q = BoundaryQuery::viewport(&e, SpatialReference::WEB_MERCATOR).expect("query");
        assert_eq!(q.kind, QueryKind::Viewport);
        assert_eq!(q.geometry.extent(), Some(e));
    }

    #[test]
    fn viewport_query_reprojects_to_geographic() {
        let e = Extent::new(0.0, 0.0, 111_319.490_793_273_57, 1.0, SpatialReference::WEB_MERCATOR);
        let q = BoundaryQuery::viewport(&e, SpatialReference::WGS84).expect("query");
        assert_eq!(q.spatial_reference(), SpatialReference::WGS84);
        let out = q.geometry.extent().expect("extent");
        assert!((out.xmax - 1.0).abs() < 1e-9);
    }

    #[test]
    fn degenerate_inputs_are_invalid() {
        let flat = Extent::new(0.0, 0.0, 0.0, 1.0, SpatialReference::WGS84);
        assert_eq!(
            BoundaryQuery::viewport(&flat, SpatialReference::WGS84),
            Err(InvalidGeometry::InvertedExtent)
        );
        let odd = Extent::new(0.0, 0.0, 1.0, 1.0, SpatialReference::new(2263));
        assert!(matches!(
            BoundaryQuery::viewport(&odd, SpatialReference::WGS84),
            Err(InvalidGeometry::Unprojectable { .. })
        ));
        let empty = Polygon::new(vec![], SpatialReference::WGS84);
        assert_eq!(BoundaryQuery::local(&empty), Err(InvalidGeometry::Empty));
    }

    #[test]
    fn query_params_carry_geometry_and_references() {
        let e = Extent::new(0.0, 0.0, 1.0, 1.0, SpatialReference::WGS84);
        let q = BoundaryQuery::viewport(&e, SpatialReference::WGS84).expect("query");
        let params = q.to_query_params(SpatialReference::WEB_MERCATOR);
        let get = |k: &str| params.iter().find(|(n, _)| *n == k).map(|(_, v)| v.clone());
        assert_eq!(get("inSR").as_deref(), Some("4326"));
        assert_eq!(get("outSR").as_deref(), Some("102100"));
        assert!(get("geometry").expect("geometry").contains("\"rings\""));
    }
}
