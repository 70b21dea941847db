//! Geometric toolkit shared by the indoor pathfinder and the route trackers.

pub mod distance;
pub mod projection;

pub use distance::{EARTH_RADIUS_METERS, bearing, haversine_distance, polyline_length};
pub use projection::{
    SegmentProjection, Snap, fraction_along_polyline, project_point_on_segment, snap_to_polyline,
};
