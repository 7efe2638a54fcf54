pub mod orchestrator;
pub mod policy;
pub mod resolve;

pub use orchestrator::{BuildOutcome, RouteOrchestrator};
pub use policy::{RebuildPolicy, RebuildReason};
pub use resolve::RouteIntent;

use crate::core::config::EngineOptions;
use crate::core::errors::ProviderError;
use crate::core::types::{
    FilteredPosition, NavigationMode, Point, Route, RouteProfile, Waypoint,
};
use crate::spatial::search::SnapIndex;
use crate::tracking::{PositionFilter, Progress, ProgressTracker};
use serde::Serialize;
use std::sync::Arc;

/// Status of the most recent route build. A build that gets superseded
/// never shows up here; it ends as [`BuildOutcome::Stale`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", content = "error", rename_all = "snake_case")]
pub enum BuildStatus {
    Idle,
    Building,
    Ready,
    Failed(ProviderError),
}

#[derive(Debug, Clone)]
pub struct NavigationState {
    pub mode: NavigationMode,
    pub current_route: Option<Arc<Route>>,
    pub current_step_index: usize,
    pub filtered_position: Option<FilteredPosition>,
    /// Bumped for every build; only the build holding the latest value may
    /// publish its result.
    pub request_token: u64,
    pub status: BuildStatus,
}

/// Read-only view handed to the UI.
#[derive(Debug, Clone, Serialize)]
pub struct NavigationSnapshot {
    pub mode: NavigationMode,
    pub status: BuildStatus,
    pub route: Option<Arc<Route>>,
    pub step_index: usize,
    pub filtered_position: Option<FilteredPosition>,
    pub request_token: u64,
    pub distance_to_maneuver_m: Option<f64>,
    pub remaining_distance_m: Option<f64>,
    pub remaining_duration_s: Option<f64>,
    pub waypoints: Vec<Waypoint>,
    pub origin: Option<Point>,
    pub destination: Option<Point>,
    pub profile: RouteProfile,
}

struct ActiveRoute {
    index: SnapIndex,
    tracker: ProgressTracker,
}

/// Everything one navigation session remembers between events. Owned by the
/// orchestrator; nothing else writes to it.
pub(crate) struct NavigationSession {
    state: NavigationState,
    waypoints: Vec<Waypoint>,
    waypoint_revision: u64,
    origin: Option<Point>,
    destination: Option<Point>,
    profile: RouteProfile,
    filter: PositionFilter,
    active: Option<ActiveRoute>,
    progress: Option<Progress>,
    policy: RebuildPolicy,
}

impl NavigationSession {
    fn new(options: &EngineOptions) -> Self {
        NavigationSession {
            state: NavigationState {
                mode: NavigationMode::Static,
                current_route: None,
                current_step_index: 0,
                filtered_position: None,
                request_token: 0,
                status: BuildStatus::Idle,
            },
            waypoints: Vec::new(),
            waypoint_revision: 0,
            origin: None,
            destination: None,
            profile: RouteProfile::default(),
            filter: PositionFilter::new(options.filter.clone()),
            active: None,
            progress: None,
            policy: RebuildPolicy::new(options.routing.rebuild_distance_m),
        }
    }

    fn bump_revision(&mut self) {
        self.waypoint_revision += 1;
    }

    fn current_point(&self) -> Option<Point> {
        self.state.filtered_position.map(|position| position.point)
    }

    /// Position the route origin is tied to, if any. Dead-reckoned estimates
    /// never count as movement.
    fn anchor(&self) -> Option<Point> {
        match self.state.mode {
            NavigationMode::FollowMe => self
                .state
                .filtered_position
                .filter(|position| !position.dead_reckoned)
                .map(|position| position.point),
            NavigationMode::Static => None,
        }
    }

    fn has_target(&self) -> bool {
        self.destination.is_some() || !self.waypoints.is_empty()
    }

    fn rebuild_reason(&self) -> Option<RebuildReason> {
        if !self.has_target() {
            return None;
        }
        if self.state.mode == NavigationMode::FollowMe && self.current_point().is_none() {
            return None;
        }
        let anchor = self.anchor();
        self.policy
            .evaluate(anchor.as_ref(), self.waypoint_revision, &self.profile)
    }

    fn install_route(&mut self, route: Arc<Route>, options: &EngineOptions) {
        let index = SnapIndex::new(&route.polyline);
        let tracker = ProgressTracker::new(
            &route,
            &index,
            options.routing.maneuver_arrival_m,
            options.filter.snap_threshold_m,
        );
        self.active = Some(ActiveRoute { index, tracker });
        self.state.current_route = Some(route);
        self.state.current_step_index = 0;
        self.state.status = BuildStatus::Ready;
        self.progress = None;
        self.refresh_progress();
    }

    fn refresh_progress(&mut self) {
        let (Some(active), Some(route), Some(position)) = (
            self.active.as_mut(),
            self.state.current_route.as_ref(),
            self.state.filtered_position,
        ) else {
            return;
        };

        let progress = active.tracker.update(route, &active.index, &position.point);
        self.state.current_step_index = progress.step_index;
        self.progress = Some(progress);
    }

    fn snapshot(&self) -> NavigationSnapshot {
        NavigationSnapshot {
            mode: self.state.mode,
            status: self.state.status.clone(),
            route: self.state.current_route.clone(),
            step_index: self.state.current_step_index,
            filtered_position: self.state.filtered_position,
            request_token: self.state.request_token,
            distance_to_maneuver_m: self.progress.and_then(|p| p.distance_to_maneuver_m),
            remaining_distance_m: self.progress.map(|p| p.remaining_distance_m),
            remaining_duration_s: self.progress.map(|p| p.remaining_duration_s),
            waypoints: self.waypoints.clone(),
            origin: self.origin,
            destination: self.destination,
            profile: self.profile,
        }
    }
}
