use crate::core::types::{Point, RouteProfile};
use crate::spatial::geometry::distance_meters;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RebuildReason {
    Initial,
    ProfileChanged,
    WaypointsChanged,
    Moved(f64),
}

#[derive(Debug, Clone, Copy)]
struct BuildMarker {
    position: Option<Point>,
    waypoint_revision: u64,
    profile: RouteProfile,
}

/// Decides whether a new route build is warranted. Rebuilding on every
/// position tick would flood the provider, so movement only counts once it
/// exceeds `min_distance_m` since the last build.
#[derive(Debug, Clone)]
pub struct RebuildPolicy {
    min_distance_m: f64,
    last: Option<BuildMarker>,
}

impl RebuildPolicy {
    pub fn new(min_distance_m: f64) -> Self {
        RebuildPolicy {
            min_distance_m,
            last: None,
        }
    }

    /// `position` is only passed when the route origin follows it.
    pub fn evaluate(
        &self,
        position: Option<&Point>,
        waypoint_revision: u64,
        profile: &RouteProfile,
    ) -> Option<RebuildReason> {
        let Some(last) = &self.last else {
            return Some(RebuildReason::Initial);
        };

        if last.profile != *profile {
            return Some(RebuildReason::ProfileChanged);
        }
        if last.waypoint_revision != waypoint_revision {
            return Some(RebuildReason::WaypointsChanged);
        }

        match (position, &last.position) {
            (Some(current), Some(built_at)) => {
                let moved = distance_meters(built_at, current);
                (moved > self.min_distance_m).then_some(RebuildReason::Moved(moved))
            }
            (Some(_), None) => Some(RebuildReason::Moved(f64::INFINITY)),
            (None, _) => None,
        }
    }

    pub fn record(&mut self, position: Option<Point>, waypoint_revision: u64, profile: RouteProfile) {
        self.last = Some(BuildMarker {
            position,
            waypoint_revision,
            profile,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{RoutePreference, TravelMode};

    fn pt(lat: f64, lon: f64) -> Point {
        Point::new(lat, lon).unwrap()
    }

    #[test]
    fn first_evaluation_always_builds() {
        let policy = RebuildPolicy::new(10.0);
        assert_eq!(
            policy.evaluate(None, 0, &RouteProfile::default()),
            Some(RebuildReason::Initial)
        );
    }

    #[test]
    fn jitter_does_not_trigger_rebuild() {
        let mut policy = RebuildPolicy::new(10.0);
        let profile = RouteProfile::default();
        policy.record(Some(pt(51.5, -0.1)), 1, profile);

        // ~5.5 m
        assert_eq!(policy.evaluate(Some(&pt(51.50005, -0.1)), 1, &profile), None);
        // ~22 m
        assert!(matches!(
            policy.evaluate(Some(&pt(51.5002, -0.1)), 1, &profile),
            Some(RebuildReason::Moved(d)) if d > 20.0
        ));
        // Static mode ignores movement entirely.
        assert_eq!(policy.evaluate(None, 1, &profile), None);
    }

    #[test]
    fn profile_and_waypoint_changes_trigger_rebuild() {
        let mut policy = RebuildPolicy::new(10.0);
        let profile = RouteProfile::default();
        policy.record(Some(pt(51.5, -0.1)), 1, profile);

        let bike = RouteProfile::new(TravelMode::Bicycle, RoutePreference::Fastest);
        assert_eq!(
            policy.evaluate(Some(&pt(51.5, -0.1)), 1, &bike),
            Some(RebuildReason::ProfileChanged)
        );
        assert_eq!(
            policy.evaluate(Some(&pt(51.5, -0.1)), 2, &profile),
            Some(RebuildReason::WaypointsChanged)
        );
    }
}
