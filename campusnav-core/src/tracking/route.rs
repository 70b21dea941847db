//! Outdoor route documents as returned by the routing service.

use geo::Point;
use serde::{Deserialize, Serialize};

/// How the agent travels along a route
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TravelMode {
    #[default]
    Walk,
    Bicycle,
    Drive,
    Transit,
}

impl TravelMode {
    /// Distance to the end of a step under which the next instruction is announced
    pub fn proximity_threshold(self) -> f64 {
        match self {
            TravelMode::Walk => 200.0,
            TravelMode::Bicycle => 300.0,
            TravelMode::Drive | TravelMode::Transit => 1000.0,
        }
    }

    /// Value of the `mode` parameter understood by the directions service
    pub fn as_directions_param(self) -> &'static str {
        match self {
            TravelMode::Walk => "walking",
            TravelMode::Bicycle => "bicycling",
            TravelMode::Drive => "driving",
            TravelMode::Transit => "transit",
        }
    }
}

/// One maneuver of a route
#[derive(Debug, Clone, PartialEq)]
pub struct RouteStep {
    pub start: Point<f64>,
    pub end: Point<f64>,
    /// Metres
    pub distance: f64,
    /// Seconds
    pub duration: f64,
    pub instruction: String,
    pub polyline: Vec<Point<f64>>,
    /// Metres from the route start to this step's start
    pub cumulative_distance: f64,
}

impl RouteStep {
    /// Creates a step whose cumulative distance is filled in by [`RouteDocument::from_steps`]
    pub fn new(
        instruction: impl Into<String>,
        polyline: Vec<Point<f64>>,
        distance: f64,
        duration: f64,
    ) -> Self {
        let start = polyline.first().copied().unwrap_or_else(|| Point::new(0.0, 0.0));
        let end = polyline.last().copied().unwrap_or(start);
        Self {
            start,
            end,
            distance,
            duration,
            instruction: instruction.into(),
            polyline,
            cumulative_distance: 0.0,
        }
    }
}

/// A complete fetched route. Immutable; a new fetch replaces it wholesale.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteDocument {
    pub polyline: Vec<Point<f64>>,
    /// Metres
    pub total_distance: f64,
    /// Seconds
    pub total_duration: f64,
    pub steps: Vec<RouteStep>,
    pub mode: TravelMode,
}

impl RouteDocument {
    /// Assembles a document from its steps: totals are the step sums, the
    /// overview polyline is the concatenation of step polylines.
    pub fn from_steps(mut steps: Vec<RouteStep>, mode: TravelMode) -> Self {
        let mut cumulative = 0.0;
        let mut polyline: Vec<Point<f64>> = Vec::new();

        for step in &mut steps {
            step.cumulative_distance = cumulative;
            cumulative += step.distance;

            let skip = usize::from(polyline.last() == step.polyline.first());
            polyline.extend(step.polyline.iter().skip(skip));
        }

        Self {
            polyline,
            total_distance: cumulative,
            total_duration: steps.iter().map(|s| s.duration).sum(),
            steps,
            mode,
        }
    }

    pub fn destination(&self) -> Option<Point<f64>> {
        self.steps
            .last()
            .map(|step| step.end)
            .or_else(|| self.polyline.last().copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thresholds_by_mode() {
        assert_eq!(TravelMode::Walk.proximity_threshold(), 200.0);
        assert_eq!(TravelMode::Bicycle.proximity_threshold(), 300.0);
        assert_eq!(TravelMode::Drive.proximity_threshold(), 1000.0);
        assert_eq!(TravelMode::Transit.proximity_threshold(), 1000.0);
    }

    #[test]
    fn test_mode_wire_names() {
        let mode: TravelMode = serde_json::from_str("\"WALK\"").unwrap();
        assert_eq!(mode, TravelMode::Walk);
        assert_eq!(serde_json::to_string(&TravelMode::Bicycle).unwrap(), "\"BICYCLE\"");
    }

    #[test]
    fn test_from_steps_accumulates() {
        let a = Point::new(-73.5788, 45.4970);
        let b = Point::new(-73.5788, 45.4980);
        let c = Point::new(-73.5774, 45.4980);

        let route = RouteDocument::from_steps(
            vec![
                RouteStep::new("Head north", vec![a, b], 111.0, 80.0),
                RouteStep::new("Turn right", vec![b, c], 109.0, 78.0),
            ],
            TravelMode::Walk,
        );

        assert_eq!(route.polyline, vec![a, b, c]);
        assert_eq!(route.total_distance, 220.0);
        assert_eq!(route.total_duration, 158.0);
        assert_eq!(route.steps[1].cumulative_distance, 111.0);
        assert_eq!(route.destination(), Some(c));
    }
}
