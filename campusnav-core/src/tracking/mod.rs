//! Following a live position along fetched outdoor routes.

mod to_geojson;
pub mod progress;
pub mod route;
pub mod schedule;
pub mod shuttle;
pub mod tracker;

pub use progress::{
    StepPosition, clip_polyline_from_snapped_point, compute_remaining_distance,
    compute_remaining_time, determine_next_instruction, locate_step,
};
pub use route::{RouteDocument, RouteStep, TravelMode};
pub use schedule::{Campus, CampusDepartures, ShuttleSchedule};
pub use shuttle::{
    BUS_STOP_ARRIVAL_METERS, BusPosition, CancelCallback, ShuttleItinerary, ShuttleLeg,
    ShuttleStop, ShuttleTick, ShuttleTracker, WALK_ARRIVAL_METERS,
};
pub use tracker::{RouteTracker, TrackingState, track_route};
