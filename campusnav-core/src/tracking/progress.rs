//! Progress of a live position along the steps of a route.
//!
//! None of these functions fail: a position that cannot be snapped to any
//! step is treated as "nothing covered yet".

use geo::Point;
use itertools::Itertools;

use super::route::{RouteStep, TravelMode};
use crate::SNAP_TOLERANCE_METERS;
use crate::geometry::{fraction_along_polyline, haversine_distance, project_point_on_segment};

/// Step the position currently lies on and the fraction of it already covered
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepPosition {
    pub index: usize,
    pub fraction: f64,
}

/// First step whose polyline the point snaps to
pub fn locate_step(steps: &[RouteStep], point: Point<f64>) -> Option<StepPosition> {
    steps.iter().enumerate().find_map(|(index, step)| {
        fraction_along_polyline(&step.polyline, point).map(|fraction| StepPosition { index, fraction })
    })
}

/// Metres left to travel. Returns `total_distance` when the point cannot be snapped.
pub fn compute_remaining_distance(
    steps: &[RouteStep],
    point: Point<f64>,
    total_distance: f64,
) -> f64 {
    let Some(position) = locate_step(steps, point) else {
        return total_distance.max(0.0);
    };

    let completed: f64 = steps[..position.index].iter().map(|s| s.distance).sum();
    let covered = completed + steps[position.index].distance * position.fraction;

    (total_distance - covered).max(0.0)
}

/// Seconds left to travel. Returns `total_duration` when the point cannot be snapped.
///
/// Step durations are rescaled so they add up to `total_duration`, which
/// absorbs the rounding drift between the per-step values and the route total.
pub fn compute_remaining_time(steps: &[RouteStep], point: Point<f64>, total_duration: f64) -> f64 {
    let Some(position) = locate_step(steps, point) else {
        return total_duration.max(0.0);
    };

    let nominal: f64 = steps.iter().map(|s| s.duration).sum();
    let scale = if nominal > 0.0 {
        total_duration / nominal
    } else {
        1.0
    };

    let completed: f64 = steps[..position.index].iter().map(|s| s.duration).sum();
    let elapsed = (completed + steps[position.index].duration * position.fraction) * scale;

    (total_duration - elapsed).max(0.0)
}

/// Instruction to display for the position.
///
/// Announces the next step's instruction once the position is within the
/// mode's proximity threshold of the current step's end. Empty when the
/// position cannot be snapped.
pub fn determine_next_instruction(
    steps: &[RouteStep],
    point: Point<f64>,
    mode: TravelMode,
) -> String {
    let Some(position) = locate_step(steps, point) else {
        return String::new();
    };

    let current = &steps[position.index];
    let remaining_in_step = current.distance * (1.0 - position.fraction);
    let threshold = mode.proximity_threshold().min(current.distance);

    // For steps shorter than the mode threshold the length guard is always true
    let announce_next = remaining_in_step <= threshold && current.distance >= threshold;

    match steps.get(position.index + 1) {
        Some(next) if announce_next => next.instruction.clone(),
        _ => current.instruction.clone(),
    }
}

/// Remaining part of `polyline` starting at `point`.
///
/// `point` must lie on a segment (perpendicular foot inside the segment and
/// within snapping tolerance); otherwise the polyline is returned unchanged.
pub fn clip_polyline_from_snapped_point(
    polyline: &[Point<f64>],
    point: Point<f64>,
) -> Vec<Point<f64>> {
    for (segment_index, (a, b)) in polyline.iter().tuple_windows().enumerate() {
        let projection = project_point_on_segment(point, *a, *b);
        if projection.is_on_segment
            && haversine_distance(projection.point, point) <= SNAP_TOLERANCE_METERS
        {
            let mut clipped = Vec::with_capacity(polyline.len() - segment_index);
            clipped.push(point);
            clipped.extend_from_slice(&polyline[segment_index + 1..]);
            return clipped;
        }
    }

    polyline.to_vec()
}
