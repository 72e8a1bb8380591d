use crate::spatial_ref::SpatialReference;

/// Rejection reasons for boundary and extent inputs.
#[derive(Debug, Clone, PartialEq)]
pub enum InvalidGeometry {
    /// No rings, or a geometry that was never resolved.
    Empty,
    /// A ring has fewer than three distinct vertices.
    DegenerateRing { ring: usize, vertices: usize },
    /// A coordinate is NaN or infinite.
    NonFinite,
    /// `min >= max` on at least one axis.
    InvertedExtent,
    /// No transformation exists between the two spatial references.
    Unprojectable {
        from: SpatialReference,
        to: SpatialReference,
    },
}

impl std::fmt::Display for InvalidGeometry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InvalidGeometry::Empty => write!(f, "geometry is empty"),
            InvalidGeometry::DegenerateRing { ring, vertices } => write!(
                f,
                "ring {ring} is degenerate: {vertices} distinct vertices (need 3)"
            ),
            InvalidGeometry::NonFinite => write!(f, "geometry has non-finite coordinates"),
            InvalidGeometry::InvertedExtent => write!(f, "extent min is not below max"),
            InvalidGeometry::Unprojectable { from, to } => {
                write!(f, "cannot project from wkid {} to wkid {}", from.wkid, to.wkid)
            }
        }
    }
}

impl std::error::Error for InvalidGeometry {}
