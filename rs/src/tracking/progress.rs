use crate::core::types::{Point, Route};
use crate::spatial::geometry::distance_meters;
use crate::spatial::search::SnapIndex;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Progress {
    pub step_index: usize,
    pub distance_to_maneuver_m: Option<f64>,
    pub remaining_distance_m: f64,
    pub remaining_duration_s: f64,
}

/// Tracks which maneuver is next along one route.
///
/// Maneuver points are placed on the polyline once, in step order, so a
/// route that doubles back does not mark a later maneuver as passed early.
#[derive(Debug, Clone)]
pub struct ProgressTracker {
    step_index: usize,
    maneuver_along: Vec<f64>,
    traveled_m: f64,
    arrival_m: f64,
    snap_threshold_m: f64,
}

impl ProgressTracker {
    pub fn new(route: &Route, index: &SnapIndex, arrival_m: f64, snap_threshold_m: f64) -> Self {
        let mut maneuver_along = Vec::with_capacity(route.steps.len());
        let mut segment = 0;
        for step in &route.steps {
            match index.project_from(&step.end_point, segment) {
                Some(projection) => {
                    segment = projection.segment_index;
                    maneuver_along.push(projection.distance_along_m);
                }
                None => maneuver_along.push(index.total_length()),
            }
        }

        ProgressTracker {
            step_index: 0,
            maneuver_along,
            traveled_m: 0.0,
            arrival_m,
            snap_threshold_m,
        }
    }

    pub fn update(&mut self, route: &Route, index: &SnapIndex, position: &Point) -> Progress {
        if let Some(projection) = index.project(position, self.snap_threshold_m) {
            self.traveled_m = projection.distance_along_m;
        }

        while self.step_index + 1 < route.steps.len()
            && self.maneuver_passed(route, position)
        {
            self.step_index += 1;
            log::debug!("Advanced to step {}", self.step_index);
        }

        let distance_to_maneuver_m = route
            .steps
            .get(self.step_index)
            .map(|step| distance_meters(position, &step.end_point));

        let total = index.total_length();
        let ratio = if total > 0.0 {
            ((total - self.traveled_m) / total).clamp(0.0, 1.0)
        } else {
            0.0
        };

        Progress {
            step_index: self.step_index,
            distance_to_maneuver_m,
            remaining_distance_m: route.distance_meters * ratio,
            remaining_duration_s: route.duration_seconds * ratio,
        }
    }

    fn maneuver_passed(&self, route: &Route, position: &Point) -> bool {
        let step = &route.steps[self.step_index];
        if distance_meters(position, &step.end_point) <= self.arrival_m {
            return true;
        }
        self.maneuver_along
            .get(self.step_index)
            .is_some_and(|along| self.traveled_m > *along)
    }
}
