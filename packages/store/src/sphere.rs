//! Spherical geometry helpers.
//!
//! Distances are great-circle distances on a sphere of
//! [`EARTH_RADIUS_METERS`], matching `geo`'s haversine and `PostGIS`
//! `geography` with `use_spheroid = false`.

use geo::{Distance, Haversine, Point};
use noise_map_noise_models::GeoPoint;

/// Mean Earth radius in meters.
pub const EARTH_RADIUS_METERS: f64 = 6_371_008.8;

/// Great-circle distance between two points, in meters.
#[must_use]
pub fn great_circle_distance(a: &GeoPoint, b: &GeoPoint) -> f64 {
    Haversine.distance(
        Point::new(a.longitude(), a.latitude()),
        Point::new(b.longitude(), b.latitude()),
    )
}

/// Projects a point onto a sphere of [`EARTH_RADIUS_METERS`] centered at
/// the origin, in meters.
#[must_use]
pub fn to_cartesian(point: &GeoPoint) -> [f64; 3] {
    let lng = point.longitude().to_radians();
    let lat = point.latitude().to_radians();
    [
        EARTH_RADIUS_METERS * lat.cos() * lng.cos(),
        EARTH_RADIUS_METERS * lat.cos() * lng.sin(),
        EARTH_RADIUS_METERS * lat.sin(),
    ]
}

/// Straight-line distance through the sphere between two surface points
/// that are `arc_meters` apart along the surface.
///
/// Chord length grows monotonically with arc length up to half the
/// circumference, so a chord-radius ball around the projected center holds
/// exactly the surface points within the arc radius.
#[must_use]
pub fn chord_length(arc_meters: f64) -> f64 {
    let half_angle = (arc_meters / EARTH_RADIUS_METERS / 2.0).min(std::f64::consts::FRAC_PI_2);
    2.0 * EARTH_RADIUS_METERS * half_angle.sin()
}
