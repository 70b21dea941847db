//! Great-circle measurements on `(longitude, latitude)` points.

use geo::{Bearing, Haversine, Point};
use itertools::Itertools;

/// Mean Earth radius in metres.
pub const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// Great-circle distance between two points in metres.
pub fn haversine_distance(p1: Point<f64>, p2: Point<f64>) -> f64 {
    let lat1 = p1.y().to_radians();
    let lat2 = p2.y().to_radians();
    let d_lat = (p2.y() - p1.y()).to_radians();
    let d_lon = (p2.x() - p1.x()).to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);

    // Rounding can push `h` marginally above 1 for antipodal points
    2.0 * EARTH_RADIUS_METERS * h.sqrt().min(1.0).asin()
}

/// Initial compass bearing from `p1` to `p2`, in degrees within `[0, 360)`.
pub fn bearing(p1: Point<f64>, p2: Point<f64>) -> f64 {
    Haversine.bearing(p1, p2)
}

/// Sum of the haversine distances between consecutive points.
pub fn polyline_length(points: &[Point<f64>]) -> f64 {
    points
        .iter()
        .tuple_windows()
        .map(|(a, b)| haversine_distance(*a, *b))
        .sum()
}
