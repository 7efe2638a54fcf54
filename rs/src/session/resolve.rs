use crate::core::errors::{NavError, Result};
use crate::core::types::{Point, RouteProfile, RouteRequest, Waypoint};
use crate::spatial::geometry::distance_meters;

/// What the UI asks for. Waypoints come from the session's own list.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RouteIntent {
    pub origin: Option<Point>,
    pub destination: Option<Point>,
}

impl RouteIntent {
    pub fn to(destination: Point) -> Self {
        RouteIntent {
            origin: None,
            destination: Some(destination),
        }
    }

    pub fn between(origin: Point, destination: Point) -> Self {
        RouteIntent {
            origin: Some(origin),
            destination: Some(destination),
        }
    }
}

/// Waypoints flagged `is_start` lead; the rest keep their order.
fn ordered_points(waypoints: &[Waypoint]) -> impl Iterator<Item = Point> + '_ {
    waypoints
        .iter()
        .filter(|w| w.is_start)
        .chain(waypoints.iter().filter(|w| !w.is_start))
        .map(|w| w.point)
}

/// Static mode: origin is the explicit origin or first waypoint, destination
/// the explicit destination or last waypoint, everything else in between.
pub fn resolve_static(
    intent: &RouteIntent,
    waypoints: &[Waypoint],
    profile: RouteProfile,
) -> Result<RouteRequest> {
    let points: Vec<Point> = intent
        .origin
        .into_iter()
        .chain(ordered_points(waypoints))
        .chain(intent.destination)
        .collect();

    split_endpoints(points, profile)
}

/// Follow-Me mode: the route always starts at `current`. When the first
/// scheduled point is more than `prepend_m` away, `current` also leads the
/// intermediate list so the path begins where the traveler stands; a closer
/// one leads the list itself.
pub fn resolve_follow_me(
    current: Point,
    intent: &RouteIntent,
    waypoints: &[Waypoint],
    profile: RouteProfile,
    prepend_m: f64,
) -> Result<RouteRequest> {
    let mut scheduled: Vec<Point> = waypoints
        .iter()
        .filter(|w| !w.is_start)
        .map(|w| w.point)
        .chain(intent.destination)
        .collect();

    let Some(destination) = scheduled.pop() else {
        return Err(NavError::NotEnoughPoints { available: 1 });
    };

    let lead = scheduled.first().copied().unwrap_or(destination);
    let mut intermediates = Vec::with_capacity(scheduled.len() + 1);
    if distance_meters(&current, &lead) > prepend_m {
        intermediates.push(current);
    }
    intermediates.extend(scheduled);

    Ok(RouteRequest {
        origin: current,
        intermediates,
        destination,
        profile,
    })
}

fn split_endpoints(mut points: Vec<Point>, profile: RouteProfile) -> Result<RouteRequest> {
    if points.len() < 2 {
        return Err(NavError::NotEnoughPoints {
            available: points.len(),
        });
    }

    let destination = points.pop().ok_or(NavError::NotEnoughPoints { available: 0 })?;
    let origin = points.remove(0);

    Ok(RouteRequest {
        origin,
        intermediates: points,
        destination,
        profile,
    })
}
