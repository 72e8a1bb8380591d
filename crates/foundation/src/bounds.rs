use serde::{Deserialize, Serialize};

use crate::error::InvalidGeometry;
use crate::math::projection::project_xy;
use crate::spatial_ref::SpatialReference;

/// Axis-aligned map extent in a spatial reference.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Extent {
    pub xmin: f64,
    pub ymin: f64,
    pub xmax: f64,
    pub ymax: f64,
    #[serde(default, rename = "spatialReference")]
    pub spatial_reference: SpatialReference,
}

impl Extent {
    pub fn new(xmin: f64, ymin: f64, xmax: f64, ymax: f64, sr: SpatialReference) -> Self {
        Extent {
            xmin,
            ymin,
            xmax,
            ymax,
            spatial_reference: sr,
        }
    }

    /// The whole geographic world, used as the surrounding mask.
    pub fn world() -> Self {
        Extent::new(-180.0, -90.0, 180.0, 90.0, SpatialReference::WGS84)
    }

    pub fn validate(&self) -> Result<(), InvalidGeometry> {
        let coords = [self.xmin, self.ymin, self.xmax, self.ymax];
        if coords.iter().any(|c| !c.is_finite()) {
            return Err(InvalidGeometry::NonFinite);
        }
        if self.xmin >= self.xmax || self.ymin >= self.ymax {
            return Err(InvalidGeometry::InvertedExtent);
        }
        Ok(())
    }

    pub fn width(&self) -> f64 {
        (self.xmax - self.xmin).abs()
    }

    pub fn height(&self) -> f64 {
        (self.ymax - self.ymin).abs()
    }

    pub fn area(&self) -> f64 {
        self.width() * self.height()
    }

    pub fn contains_xy(&self, x: f64, y: f64) -> bool {
        x >= self.xmin && x <= self.xmax && y >= self.ymin && y <= self.ymax
    }

    /// Overlap test; both extents must share a spatial reference.
    pub fn intersects(&self, other: &Extent) -> bool {
        self.xmin <= other.xmax
            && other.xmin <= self.xmax
            && self.ymin <= other.ymax
            && other.ymin <= self.ymax
    }

    /// Grow to include `other` (assumed to be in the same reference).
    pub fn union(&self, other: &Extent) -> Extent {
        Extent::new(
            self.xmin.min(other.xmin),
            self.ymin.min(other.ymin),
            self.xmax.max(other.xmax),
            self.ymax.max(other.ymax),
            self.spatial_reference,
        )
    }

    /// Reproject the two corners. Web Mercator and geographic extents stay
    /// axis-aligned under this mapping, so corners are sufficient.
    pub fn project(&self, to: SpatialReference) -> Result<Extent, InvalidGeometry> {
        let from = self.spatial_reference;
        let unprojectable = InvalidGeometry::Unprojectable { from, to };
        let (xmin, ymin) = project_xy(self.xmin, self.ymin, &from, &to).ok_or(unprojectable.clone())?;
        let (xmax, ymax) = project_xy(self.xmax, self.ymax, &from, &to).ok_or(unprojectable)?;
        Ok(Extent::new(xmin, ymin, xmax, ymax, to))
    }

    /// `"xmin,ymin,xmax,ymax"` for bbox-style query parameters.
    ///
    /// Returns `None` when the extent covers more than `max_area`.
    pub fn bounding_box(&self, max_area: f64, truncate: bool) -> Option<String> {
        if self.area() > max_area {
            return None;
        }
        if truncate {
            return Some(format!(
                "{},{},{},{}",
                to_fixed(self.xmin, 7),
                to_fixed(self.ymin, 7),
                to_fixed(self.xmax, 7),
                to_fixed(self.ymax, 7)
            ));
        }
        Some(format!(
            "{},{},{},{}",
            self.xmin, self.ymin, self.xmax, self.ymax
        ))
    }
}

fn to_fixed(value: f64, digits: i32) -> f64 {
    let scale = 10f64.powi(digits);
    (value * scale).round() / scale
}

#[cfg(test)]
mod tests {
    use super::Extent;
    use crate::error::InvalidGeometry;
    use crate::spatial_ref::SpatialReference;

    #[test]
    fn bounding_box_respects_max_area() {
        let e = Extent::new(0.0, 0.0, 10.0, 10.0, SpatialReference::WGS84);
        assert_eq!(e.bounding_box(f64::INFINITY, false).as_deref(), Some("0,0,10,10"));
        assert!(e.bounding_box(99.0, false).is_none());
    }

    #[test]
    fn bounding_box_truncates_to_seven_decimals() {
        let e = Extent::new(
            -77.123456789,
            38.5,
            -77.0,
            38.987654321,
            SpatialReference::WGS84,
        );
        assert_eq!(
            e.bounding_box(f64::INFINITY, true).as_deref(),
            Some("-77.1234568,38.5,-77,38.9876543")
        );
    }

    #[test]
    fn inverted_extent_is_rejected() {
        let e = Extent::new(5.0, 0.0, 1.0, 1.0, SpatialReference::WGS84);
        assert_eq!(e.validate(), Err(InvalidGeometry::InvertedExtent));
        let nan = Extent::new(f64::NAN, 0.0, 1.0, 1.0, SpatialReference::WGS84);
        assert_eq!(nan.validate(), Err(InvalidGeometry::NonFinite));
    }

    #[test]
    fn projects_mercator_extent_to_geographic() {
        let e = Extent::new(
            -20_037_508.342_789_244,
            0.0,
            0.0,
            1_000_000.0,
            SpatialReference::WEB_MERCATOR,
        );
        let g = e.project(SpatialReference::WGS84).expect("project");
        assert!((g.xmin + 180.0).abs() < 1e-6);
        assert!(g.xmax.abs() < 1e-9);
        assert!(g.ymax > 8.0 && g.ymax < 9.0);
        assert_eq!(g.spatial_reference, SpatialReference::WGS84);
    }
}
