use serde::{Deserialize, Serialize};

/// Well-known id based spatial reference.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SpatialReference {
    pub wkid: u32,
}

/// Coordinate families the engine knows how to relate to each other.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SpatialFamily {
    Geographic,
    WebMercator,
    Other,
}

impl SpatialReference {
    pub const WGS84: SpatialReference = SpatialReference { wkid: 4326 };
    pub const WEB_MERCATOR: SpatialReference = SpatialReference { wkid: 102100 };

    pub fn new(wkid: u32) -> Self {
        Self { wkid }
    }

    pub fn family(&self) -> SpatialFamily {
        match self.wkid {
            4326 => SpatialFamily::Geographic,
            102100 | 102113 | 3857 | 900913 => SpatialFamily::WebMercator,
            _ => SpatialFamily::Other,
        }
    }

    /// Same coordinate space, possibly under a different wkid alias.
    pub fn is_equivalent(&self, other: &SpatialReference) -> bool {
        if self.wkid == other.wkid {
            return true;
        }
        let family = self.family();
        family != SpatialFamily::Other && family == other.family()
    }
}

impl Default for SpatialReference {
    fn default() -> Self {
        Self::WEB_MERCATOR
    }
}
