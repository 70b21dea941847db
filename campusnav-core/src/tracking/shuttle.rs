//! Three-leg shuttle navigation: walk to the stop, ride the bus, walk to the
//! destination.
//!
//! The tracker only moves forward through the legs. Once the final walk is
//! finished it fires the cancellation callback exactly once; refusing further
//! updates after that is up to the owner of the tracker.

use std::fmt;

use geo::Point;
use log::{debug, info};
use serde::{Deserialize, Serialize};

use super::route::RouteDocument;
use super::tracker::{TrackingState, track_route};
use crate::geometry::{bearing, haversine_distance};

/// Remaining walking distance under which a walking leg is complete
pub const WALK_ARRIVAL_METERS: f64 = 10.0;
/// Distance to the destination stop under which the bus ride is complete
pub const BUS_STOP_ARRIVAL_METERS: f64 = 20.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShuttleLeg {
    LegOne,
    LegTwo,
    LegThree,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShuttleStop {
    pub name: String,
    pub location: Point<f64>,
}

impl ShuttleStop {
    pub fn new(name: impl Into<String>, location: Point<f64>) -> Self {
        Self {
            name: name.into(),
            location,
        }
    }
}

/// Live position of one shuttle bus
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusPosition {
    pub id: String,
    pub location: Point<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ShuttleItinerary {
    pub walk_to_stop: RouteDocument,
    pub bus_ride: RouteDocument,
    pub walk_from_stop: RouteDocument,
    pub origin_stop: ShuttleStop,
    pub destination_stop: ShuttleStop,
}

/// Invoked once when the final walking leg is complete
pub type CancelCallback = Box<dyn FnMut() + Send>;

/// Outcome of one location update
#[derive(Debug, Clone, PartialEq)]
pub struct ShuttleTick {
    /// Leg the tracker is on after this update
    pub leg: ShuttleLeg,
    /// State of the leg the update was computed for
    pub state: TrackingState,
    pub arrived: bool,
    pub bus_positions: Vec<BusPosition>,
}

pub struct ShuttleTracker {
    itinerary: ShuttleItinerary,
    leg: ShuttleLeg,
    bus_positions: Vec<BusPosition>,
    on_cancel: Option<CancelCallback>,
    arrived: bool,
}

impl fmt::Debug for ShuttleTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShuttleTracker")
            .field("leg", &self.leg)
            .field("origin_stop", &self.itinerary.origin_stop.name)
            .field("destination_stop", &self.itinerary.destination_stop.name)
            .field("bus_positions", &self.bus_positions.len())
            .field("arrived", &self.arrived)
            .finish_non_exhaustive()
    }
}

impl ShuttleTracker {
    pub fn new(itinerary: ShuttleItinerary, on_cancel: CancelCallback) -> Self {
        Self {
            itinerary,
            leg: ShuttleLeg::LegOne,
            bus_positions: Vec::new(),
            on_cancel: Some(on_cancel),
            arrived: false,
        }
    }

    pub fn itinerary(&self) -> &ShuttleItinerary {
        &self.itinerary
    }

    pub fn leg(&self) -> ShuttleLeg {
        self.leg
    }

    pub fn has_arrived(&self) -> bool {
        self.arrived
    }

    pub fn bus_positions(&self) -> &[BusPosition] {
        &self.bus_positions
    }

    pub fn set_bus_positions(&mut self, positions: Vec<BusPosition>) {
        self.bus_positions = positions;
    }

    pub fn update(&mut self, point: Point<f64>) -> ShuttleTick {
        let state = match self.leg {
            ShuttleLeg::LegOne => {
                let state = track_route(&self.itinerary.walk_to_stop, point);
                if state.remaining_distance <= WALK_ARRIVAL_METERS {
                    self.advance(ShuttleLeg::LegTwo);
                }
                state
            }
            ShuttleLeg::LegTwo => {
                let state = self.bus_ride_state(point);
                if state.remaining_distance <= BUS_STOP_ARRIVAL_METERS {
                    self.advance(ShuttleLeg::LegThree);
                }
                state
            }
            ShuttleLeg::LegThree => {
                let state = track_route(&self.itinerary.walk_from_stop, point);
                if state.remaining_distance <= WALK_ARRIVAL_METERS && !self.arrived {
                    self.arrived = true;
                    info!(
                        "Shuttle trip to {} complete",
                        self.itinerary.destination_stop.name
                    );
                    if let Some(mut cancel) = self.on_cancel.take() {
                        cancel();
                    }
                }
                state
            }
        };

        ShuttleTick {
            leg: self.leg,
            state,
            arrived: self.arrived,
            bus_positions: self.bus_positions.clone(),
        }
    }

    fn advance(&mut self, next: ShuttleLeg) {
        debug!("Shuttle leg {:?} -> {:?}", self.leg, next);
        self.leg = self.leg.max(next);
    }

    /// The bus follows its own schedule, so progress is the straight-line
    /// distance to the destination stop rather than a snap onto the bus route
    fn bus_ride_state(&self, point: Point<f64>) -> TrackingState {
        let ride = &self.itinerary.bus_ride;
        let origin = self.itinerary.origin_stop.location;
        let destination = &self.itinerary.destination_stop;

        let remaining_distance = haversine_distance(point, destination.location);
        let span = haversine_distance(origin, destination.location);
        let left = if span > 0.0 {
            (remaining_distance / span).min(1.0)
        } else {
            0.0
        };

        TrackingState {
            snapped_point: point,
            on_route: false,
            remaining_distance,
            remaining_time: ride.total_duration * left,
            instruction: format!("Take the shuttle bus to {}", destination.name),
            clipped_polyline: ride.polyline.clone(),
            heading: Some(bearing(point, destination.location)),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::geometry::polyline_length;
    use crate::tracking::route::{RouteStep, TravelMode};

    const METERS_PER_DEGREE_LAT: f64 = 111_194.93;

    fn route(instruction: &str, polyline: Vec<Point<f64>>, mode: TravelMode) -> RouteDocument {
        let distance = polyline_length(&polyline);
        RouteDocument::from_steps(
            vec![RouteStep::new(instruction, polyline, distance, distance / 1.4)],
            mode,
        )
    }

    fn itinerary() -> ShuttleItinerary {
        let start = Point::new(-73.5790, 45.4960);
        let sgw = Point::new(-73.5790, 45.4970);
        let loyola = Point::new(-73.6390, 45.4580);
        let destination = Point::new(-73.6390, 45.4590);

        ShuttleItinerary {
            walk_to_stop: route("Walk to the SGW stop", vec![start, sgw], TravelMode::Walk),
            bus_ride: route("Shuttle", vec![sgw, loyola], TravelMode::Drive),
            walk_from_stop: route("Walk to the VL building", vec![loyola, destination], TravelMode::Walk),
            origin_stop: ShuttleStop::new("SGW", sgw),
            destination_stop: ShuttleStop::new("Loyola", loyola),
        }
    }

    fn counting_tracker() -> (ShuttleTracker, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let tracker = ShuttleTracker::new(
            itinerary(),
            Box::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );
        (tracker, calls)
    }

    #[test]
    fn test_leg_one_advances_at_stop() {
        let (mut tracker, _) = counting_tracker();

        let tick = tracker.update(Point::new(-73.5790, 45.4962));
        assert_eq!(tick.leg, ShuttleLeg::LegOne);
        assert!(tick.state.remaining_distance > WALK_ARRIVAL_METERS);

        let tick = tracker.update(Point::new(-73.5790, 45.4970));
        assert_eq!(tick.leg, ShuttleLeg::LegTwo);
        assert!(tick.state.remaining_distance <= WALK_ARRIVAL_METERS);
    }

    #[test]
    fn test_leg_two_advances_within_twenty_meters() {
        let (mut tracker, _) = counting_tracker();
        tracker.update(Point::new(-73.5790, 45.4970));
        assert_eq!(tracker.leg(), ShuttleLeg::LegTwo);

        // 50 m north of the Loyola stop
        let far = Point::new(-73.6390, 45.4580 + 50.0 / METERS_PER_DEGREE_LAT);
        let tick = tracker.update(far);
        assert_eq!(tick.leg, ShuttleLeg::LegTwo);
        assert_eq!(tick.state.instruction, "Take the shuttle bus to Loyola");
        assert!((tick.state.remaining_distance - 50.0).abs() < 0.5);
        assert_eq!(tick.state.snapped_point, far);

        let close = Point::new(-73.6390, 45.4580 + 15.0 / METERS_PER_DEGREE_LAT);
        let tick = tracker.update(close);
        assert_eq!(tick.leg, ShuttleLeg::LegThree);
    }

    #[test]
    fn test_leg_two_time_scales_with_straight_line_fraction() {
        let (mut tracker, _) = counting_tracker();
        tracker.update(Point::new(-73.5790, 45.4970));

        let total = tracker.itinerary().bus_ride.total_duration;
        let at_origin = tracker.update(Point::new(-73.5790, 45.4970));
        assert!((at_origin.state.remaining_time - total).abs() < 1e-6);

        // Further away than the origin stop still caps at the full ride
        let behind = tracker.update(Point::new(-73.5700, 45.5000));
        assert!((behind.state.remaining_time - total).abs() < 1e-6);
    }

    #[test]
    fn test_bus_positions_are_carried() {
        let (mut tracker, _) = counting_tracker();
        let buses = vec![BusPosition {
            id: "BUS1".to_string(),
            location: Point::new(-73.60, 45.47),
        }];

        tracker.set_bus_positions(buses.clone());
        let tick = tracker.update(Point::new(-73.5790, 45.4962));
        assert_eq!(tick.bus_positions, buses);
    }

    #[test]
    fn test_leg_three_fires_cancel_once() {
        let (mut tracker, calls) = counting_tracker();
        tracker.update(Point::new(-73.5790, 45.4970));
        tracker.update(Point::new(-73.6390, 45.4580));
        assert_eq!(tracker.leg(), ShuttleLeg::LegThree);

        let midway = tracker.update(Point::new(-73.6390, 45.4585));
        assert!(!midway.arrived);
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        let tick = tracker.update(Point::new(-73.6390, 45.4590));
        assert!(tick.arrived);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        tracker.update(Point::new(-73.6390, 45.4590));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(tracker.has_arrived());
    }

    #[test]
    fn test_legs_never_regress() {
        let (mut tracker, _) = counting_tracker();
        tracker.update(Point::new(-73.5790, 45.4970));
        tracker.update(Point::new(-73.6390, 45.4580));
        assert_eq!(tracker.leg(), ShuttleLeg::LegThree);

        // Back at the start of the first walk
        let tick = tracker.update(Point::new(-73.5790, 45.4960));
        assert_eq!(tick.leg, ShuttleLeg::LegThree);
        assert!(!tick.arrived);
    }
}
