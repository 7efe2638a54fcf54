//! Alternative-route selection for walking and cycling.
//!
//! Providers tend to send cyclists and pedestrians along the fastest roads.
//! When several candidates come back we prefer the one whose instructions
//! mention major roads the least. This is a keyword heuristic over step
//! text: the weights below are empirical and carry no guarantee.

use crate::core::types::{Route, RouteProfile, Step};

/// Keyword → penalty, matched case-insensitively against instruction text.
pub const ROAD_PENALTIES: &[(&str, f64)] = &[
    ("motorway", 10.0),
    ("freeway", 10.0),
    ("expressway", 8.0),
    ("highway", 6.0),
    ("trunk", 6.0),
    ("bypass", 3.0),
    ("primary", 4.0),
    ("main road", 4.0),
    ("boulevard", 3.0),
    ("parkway", 2.0),
    ("avenue", 2.0),
];

/// Sum of the penalties of every keyword found in the step text. A keyword
/// counts once per step.
pub fn step_penalty(step: &Step) -> f64 {
    let text = step.instruction.to_lowercase();
    ROAD_PENALTIES
        .iter()
        .filter(|(keyword, _)| text.contains(keyword))
        .map(|(_, penalty)| penalty)
        .sum()
}

pub fn route_penalty(route: &Route) -> f64 {
    route.steps.iter().map(step_penalty).sum()
}

/// Picks the candidate to use. Motorized profiles take the provider's first
/// answer; self-powered ones take the lowest penalty, earliest on ties.
pub fn select_route(candidates: Vec<Route>, profile: &RouteProfile) -> Option<Route> {
    if !profile.mode.is_self_powered() || candidates.len() < 2 {
        return candidates.into_iter().next();
    }

    let mut best: Option<(f64, Route)> = None;
    for candidate in candidates {
        let penalty = route_penalty(&candidate);
        log::trace!("Candidate route penalty {:.1}", penalty);
        let is_better = best.as_ref().map_or(true, |(lowest, _)| penalty < *lowest);
        if is_better {
            best = Some((penalty, candidate));
        }
    }

    best.map(|(_, route)| route)
}
