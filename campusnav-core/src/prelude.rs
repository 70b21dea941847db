pub use crate::Error;
pub use crate::SNAP_TOLERANCE_METERS;

// Geometric toolkit
pub use crate::geometry::{
    bearing, fraction_along_polyline, haversine_distance, polyline_length,
    project_point_on_segment, snap_to_polyline,
};

// Indoor navigation
pub use crate::indoor::{
    BuildingCache, BuildingGraph, FloorGraph, FloorPlanCatalog, IndoorPath, NodeKind,
    shortest_path, shortest_path_to_kind,
};

// Outdoor tracking
pub use crate::directions::parse_directions;
pub use crate::tracking::{
    BusPosition, Campus, RouteDocument, RouteStep, RouteTracker, ShuttleItinerary, ShuttleLeg,
    ShuttleSchedule, ShuttleStop, ShuttleTick, ShuttleTracker, TrackingState, TravelMode,
};
