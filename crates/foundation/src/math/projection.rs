//! Web Mercator <-> geographic conversions.
//!
//! Only the two families the map and the feature services actually exchange
//! are supported. Everything else is either an identity (equivalent wkids) or
//! unprojectable.

use crate::spatial_ref::{SpatialFamily, SpatialReference};

/// WGS84 semi-major axis (meters), the Web Mercator sphere radius.
pub const WGS84_A: f64 = 6_378_137.0;

/// Latitude limit of the square Web Mercator world.
pub const MERCATOR_MAX_LAT: f64 = 85.051_128_779_806_59;

/// Returns `true` if points can be moved between the two references.
pub fn can_project(from: &SpatialReference, to: &SpatialReference) -> bool {
    if from.is_equivalent(to) {
        return true;
    }
    matches!(
        (from.family(), to.family()),
        (SpatialFamily::Geographic, SpatialFamily::WebMercator)
            | (SpatialFamily::WebMercator, SpatialFamily::Geographic)
    )
}

pub fn web_mercator_to_geographic(x: f64, y: f64) -> (f64, f64) {
    let lon = (x / WGS84_A).to_degrees();
    let lat = (2.0 * (y / WGS84_A).exp().atan() - std::f64::consts::FRAC_PI_2).to_degrees();
    (lon, lat)
}

pub fn geographic_to_web_mercator(lon: f64, lat: f64) -> (f64, f64) {
    let lat = lat.clamp(-MERCATOR_MAX_LAT, MERCATOR_MAX_LAT);
    let x = WGS84_A * lon.to_radians();
    let y = WGS84_A * (std::f64::consts::FRAC_PI_4 + lat.to_radians() / 2.0).tan().ln();
    (x, y)
}

/// Project one coordinate pair. `None` when no transformation exists.
pub fn project_xy(
    x: f64,
    y: f64,
    from: &SpatialReference,
    to: &SpatialReference,
) -> Option<(f64, f64)> {
    if from.is_equivalent(to) {
        return Some((x, y));
    }
    match (from.family(), to.family()) {
        (SpatialFamily::WebMercator, SpatialFamily::Geographic) => {
            Some(web_mercator_to_geographic(x, y))
        }
        (SpatialFamily::Geographic, SpatialFamily::WebMercator) => {
            Some(geographic_to_web_mercator(x, y))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(a: f64, b: f64, eps: f64) {
        let diff = (a - b).abs();
        assert!(diff <= eps, "expected {a} ~= {b} (diff {diff})");
    }

    #[test]
    fn origin_maps_to_origin() {
        let (x, y) = geographic_to_web_mercator(0.0, 0.0);
        assert_close(x, 0.0, 1e-9);
        assert_close(y, 0.0, 1e-9);
    }

    #[test]
    fn round_trip_geographic_mercator() {
        let (x, y) = geographic_to_web_mercator(-77.0365, 38.8977);
        let (lon, lat) = web_mercator_to_geographic(x, y);
        assert_close(lon, -77.0365, 1e-9);
        assert_close(lat, 38.8977, 1e-9);
    }

    #[test]
    fn antimeridian_x_is_half_circumference() {
        let (x, _) = geographic_to_web_mercator(180.0, 0.0);
        assert_close(x, std::f64::consts::PI * WGS84_A, 1e-6);
    }

    #[test]
    fn unknown_family_is_unprojectable() {
        let state_plane = SpatialReference::new(2263);
        assert!(!can_project(&state_plane, &SpatialReference::WGS84));
        assert!(project_xy(1.0, 2.0, &state_plane, &SpatialReference::WGS84).is_none());
        assert_eq!(
            project_xy(1.0, 2.0, &state_plane, &state_plane),
            Some((1.0, 2.0))
        );
    }
}
