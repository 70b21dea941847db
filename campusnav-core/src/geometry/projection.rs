//! Snapping positions onto segments and polylines.
//!
//! Projection uses an equirectangular approximation around the segment,
//! which is accurate enough for city-scale segments. Distances reported
//! back to callers are always haversine metres.

use geo::Point;
use itertools::Itertools;

use super::distance::{haversine_distance, polyline_length};
use crate::SNAP_TOLERANCE_METERS;

/// Result of projecting a point onto a segment `[a, b]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SegmentProjection {
    /// Projected point, clamped to the segment.
    pub point: Point<f64>,
    /// Clamped segment parameter in `[0, 1]`.
    pub t: f64,
    /// Metres from `a` to the projected point.
    pub distance_along_segment: f64,
    /// Whether the unclamped parameter fell inside `[0, 1]`.
    pub is_on_segment: bool,
}

/// Where a position snapped onto a polyline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Snap {
    pub point: Point<f64>,
    /// Index of the segment start vertex.
    pub segment_index: usize,
    /// Fraction of the whole polyline length covered up to `point`.
    pub fraction: f64,
    /// Metres between the original position and `point`.
    pub offset: f64,
}

pub fn project_point_on_segment(p: Point<f64>, a: Point<f64>, b: Point<f64>) -> SegmentProjection {
    let cos_lat = ((a.y() + b.y()) / 2.0).to_radians().cos();

    let dx = (b.x() - a.x()) * cos_lat;
    let dy = b.y() - a.y();
    let px = (p.x() - a.x()) * cos_lat;
    let py = p.y() - a.y();

    let len_sq = dx * dx + dy * dy;
    if len_sq < f64::EPSILON * f64::EPSILON {
        // Degenerate segment, everything projects onto `a`
        return SegmentProjection {
            point: a,
            t: 0.0,
            distance_along_segment: 0.0,
            is_on_segment: false,
        };
    }

    let raw_t = (px * dx + py * dy) / len_sq;
    let t = raw_t.clamp(0.0, 1.0);
    let point = Point::new(a.x() + t * (b.x() - a.x()), a.y() + t * (b.y() - a.y()));

    SegmentProjection {
        point,
        t,
        distance_along_segment: haversine_distance(a, point),
        is_on_segment: (0.0..=1.0).contains(&raw_t),
    }
}

/// Snaps `p` onto the first segment of `points` whose projection lies within
/// [`SNAP_TOLERANCE_METERS`].
pub fn snap_to_polyline(points: &[Point<f64>], p: Point<f64>) -> Option<Snap> {
    let total = polyline_length(points);
    let mut traveled = 0.0;

    for (segment_index, (a, b)) in points.iter().tuple_windows().enumerate() {
        let projection = project_point_on_segment(p, *a, *b);
        let offset = haversine_distance(projection.point, p);

        if offset <= SNAP_TOLERANCE_METERS {
            let fraction = if total > 0.0 {
                ((traveled + projection.distance_along_segment) / total).clamp(0.0, 1.0)
            } else {
                0.0
            };
            return Some(Snap {
                point: projection.point,
                segment_index,
                fraction,
                offset,
            });
        }

        traveled += haversine_distance(*a, *b);
    }

    None
}

/// Fraction of `points` covered when standing at `p`, or `None` when `p`
/// cannot be snapped. A zero-length polyline always yields `Some(0.0)`.
pub fn fraction_along_polyline(points: &[Point<f64>], p: Point<f64>) -> Option<f64> {
    if polyline_length(points) == 0.0 {
        return Some(0.0);
    }
    snap_to_polyline(points, p).map(|snap| snap.fraction)
}
