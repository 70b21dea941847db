use geo::Point;

use super::progress::{
    clip_polyline_from_snapped_point, compute_remaining_distance, compute_remaining_time,
    determine_next_instruction,
};
use super::route::RouteDocument;
use crate::geometry::{bearing, snap_to_polyline};

/// Everything the UI needs after one location update
#[derive(Debug, Clone, PartialEq)]
pub struct TrackingState {
    /// Position projected onto the route, or the raw position when off-route
    pub snapped_point: Point<f64>,
    pub on_route: bool,
    /// Metres
    pub remaining_distance: f64,
    /// Seconds
    pub remaining_time: f64,
    pub instruction: String,
    /// Route polyline from `snapped_point` onwards
    pub clipped_polyline: Vec<Point<f64>>,
    /// Compass bearing of the route segment under the position
    pub heading: Option<f64>,
}

/// Recomputes the tracking state of `route` for a live position
pub fn track_route(route: &RouteDocument, point: Point<f64>) -> TrackingState {
    let snap = snap_to_polyline(&route.polyline, point);

    let snapped_point = snap.map_or(point, |s| s.point);
    let heading = snap.map(|s| {
        bearing(
            route.polyline[s.segment_index],
            route.polyline[s.segment_index + 1],
        )
    });

    TrackingState {
        snapped_point,
        on_route: snap.is_some(),
        remaining_distance: compute_remaining_distance(&route.steps, point, route.total_distance),
        remaining_time: compute_remaining_time(&route.steps, point, route.total_duration),
        instruction: determine_next_instruction(&route.steps, point, route.mode),
        clipped_polyline: clip_polyline_from_snapped_point(&route.polyline, snapped_point),
        heading,
    }
}

/// Tracks a single route document, replaced wholesale when a new one arrives
#[derive(Debug, Clone)]
pub struct RouteTracker {
    route: RouteDocument,
}

impl RouteTracker {
    pub fn new(route: RouteDocument) -> Self {
        Self { route }
    }

    pub fn route(&self) -> &RouteDocument {
        &self.route
    }

    pub fn replace_route(&mut self, route: RouteDocument) {
        self.route = route;
    }

    pub fn update(&self, point: Point<f64>) -> TrackingState {
        track_route(&self.route, point)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracking::route::{RouteStep, TravelMode};

    fn campus_walk() -> RouteDocument {
        let a = Point::new(-73.5788, 45.4970);
        let b = Point::new(-73.5788, 45.4980);
        let c = Point::new(-73.5774, 45.4980);
        RouteDocument::from_steps(
            vec![
                RouteStep::new("Head north on Bishop St", vec![a, b], 111.0, 80.0),
                RouteStep::new("Turn right onto De Maisonneuve Blvd", vec![b, c], 109.0, 78.0),
            ],
            TravelMode::Walk,
        )
    }

    #[test]
    fn test_update_on_route() {
        let tracker = RouteTracker::new(campus_walk());
        // A few metres east of the first step's midpoint
        let point = Point::new(-73.57877, 45.4975);

        let state = tracker.update(point);

        assert!(state.on_route);
        assert!((state.snapped_point.x() - -73.5788).abs() < 1e-9);
        assert!((state.remaining_distance - (220.0 - 55.5)).abs() < 1.0);
        assert!(state.remaining_time < 158.0);
        assert_eq!(state.instruction, "Turn right onto De Maisonneuve Blvd");
        assert_eq!(state.clipped_polyline.len(), 3);
        assert_eq!(state.clipped_polyline[0], state.snapped_point);
        assert!(state.heading.unwrap().abs() < 1e-6);
    }

    #[test]
    fn test_update_off_route_degrades() {
        let route = campus_walk();
        let tracker = RouteTracker::new(route.clone());
        let far = Point::new(-73.6404, 45.4582);

        let state = tracker.update(far);

        assert!(!state.on_route);
        assert_eq!(state.snapped_point, far);
        assert_eq!(state.remaining_distance, route.total_distance);
        assert_eq!(state.remaining_time, route.total_duration);
        assert_eq!(state.instruction, "");
        assert_eq!(state.clipped_polyline, route.polyline);
        assert_eq!(state.heading, None);
    }

    #[test]
    fn test_replace_route() {
        let mut tracker = RouteTracker::new(campus_walk());
        let replacement = RouteDocument::from_steps(
            vec![RouteStep::new(
                "Walk to Loyola",
                vec![Point::new(-73.6404, 45.4582), Point::new(-73.6390, 45.4582)],
                109.0,
                80.0,
            )],
            TravelMode::Walk,
        );

        tracker.replace_route(replacement.clone());
        assert_eq!(tracker.route(), &replacement);
        assert!(tracker.update(Point::new(-73.6404, 45.4582)).on_route);
    }
}
