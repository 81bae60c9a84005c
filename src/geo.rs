//! Great-circle distance/bearing and the equirectangular projection used by
//! the KD-tree's spatial index.

use geo::{HaversineDistance, Point};

/// Mean radius of the Earth in meters, shared by haversine and the KD-tree's
/// equirectangular projection.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Great-circle distance between two lat/lon points, in meters.
///
/// Coincident points return exactly 0 — `geo`'s haversine implementation
/// already satisfies this without extra handling.
pub fn haversine(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let p1 = Point::new(lon1, lat1);
    let p2 = Point::new(lon2, lat2);
    p1.haversine_distance(&p2)
}

/// Initial great-circle bearing from `(lat1, lon1)` to `(lat2, lon2)`,
/// normalized to `[0, 360)` degrees.
///
/// Undefined (but not NaN-producing) for coincident points; callers must not
/// rely on the result in that case.
pub fn bearing(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let (lat1_r, lat2_r) = (lat1.to_radians(), lat2.to_radians());
    let dlon_r = (lon2 - lon1).to_radians();

    let y = dlon_r.sin() * lat2_r.cos();
    let x = lat1_r.cos() * lat2_r.sin() - lat1_r.sin() * lat2_r.cos() * dlon_r.cos();
    let theta = y.atan2(x).to_degrees();

    if theta < 0.0 {
        theta + 360.0
    } else {
        theta
    }
}

/// Equirectangular projection used by the KD-tree: `x` tracks latitude,
/// `y` tracks longitude scaled by `cos(meanLat)`. Valid only locally; the
/// final KD-tree ranking always re-scores with exact haversine.
pub fn project(lat: f64, lon: f64, cos_mean_lat: f64) -> (f64, f64) {
    let x = lat.to_radians() * EARTH_RADIUS_M;
    let y = lon.to_radians() * EARTH_RADIUS_M * cos_mean_lat;
    (x, y)
}
