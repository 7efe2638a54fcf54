use crate::cache::RouteCache;
use crate::core::config::EngineOptions;
use crate::core::errors::{NavError, ProviderError, Result};
use crate::core::types::{
    FilteredPosition, NavigationMode, Point, PositionSample, Route, RouteProfile, RouteRequest,
    Waypoint, WaypointSource,
};
use crate::provider::{GraphHopperProvider, RouteProvider};
use crate::session::resolve::{resolve_follow_me, resolve_static, RouteIntent};
use crate::session::{BuildStatus, NavigationSession, NavigationSnapshot, NavigationState};
use crate::spatial::simplify::simplify;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq)]
pub enum BuildOutcome {
    Applied { route: Arc<Route>, from_cache: bool },
    /// A newer build was requested while this one was in flight; its result
    /// was dropped.
    Stale,
}

/// Owns one navigation session: turns intents and position samples into
/// route builds and publishes read-only snapshots.
///
/// Builds are never cancelled. Each one carries the request token it was
/// started with and may only publish if that token is still current when it
/// resolves, so a slow superseded fetch can never replace a newer route.
pub struct RouteOrchestrator {
    provider: Arc<dyn RouteProvider>,
    cache: Arc<RouteCache>,
    options: EngineOptions,
    session: Mutex<NavigationSession>,
    snapshots: watch::Sender<NavigationSnapshot>,
}

impl RouteOrchestrator {
    pub fn new(provider: Arc<dyn RouteProvider>, cache: Arc<RouteCache>, options: EngineOptions) -> Self {
        let session = NavigationSession::new(&options);
        let (snapshots, _) = watch::channel(session.snapshot());

        RouteOrchestrator {
            provider,
            cache,
            options,
            session: Mutex::new(session),
            snapshots,
        }
    }

    /// Builds an orchestrator backed by the GraphHopper provider, restoring
    /// the route cache snapshot when one is configured.
    pub fn from_options(options: EngineOptions) -> Result<Self> {
        options.validate()?;

        let cache = match &options.cache.snapshot_path {
            Some(path) => RouteCache::load_snapshot(path, &options.cache)?,
            None => RouteCache::from_options(&options.cache),
        };
        let provider = GraphHopperProvider::new(options.provider.clone());

        Ok(RouteOrchestrator::new(
            Arc::new(provider),
            Arc::new(cache),
            options,
        ))
    }

    fn lock(&self) -> MutexGuard<'_, NavigationSession> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, session: &NavigationSession) {
        self.snapshots.send_replace(session.snapshot());
    }

    pub fn subscribe(&self) -> watch::Receiver<NavigationSnapshot> {
        self.snapshots.subscribe()
    }

    pub fn snapshot(&self) -> NavigationSnapshot {
        self.lock().snapshot()
    }

    pub fn state(&self) -> NavigationState {
        self.lock().state.clone()
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    pub fn cache(&self) -> &Arc<RouteCache> {
        &self.cache
    }

    /// Last route built, for an external save-route feature.
    pub fn last_route(&self) -> Option<Arc<Route>> {
        self.lock().state.current_route.clone()
    }

    pub fn export_route_json(&self) -> Result<Option<String>> {
        self.last_route().map(|route| route.to_json()).transpose()
    }

    pub fn save_cache(&self) -> Result<()> {
        match &self.options.cache.snapshot_path {
            Some(path) => self.cache.save_snapshot(path),
            None => Ok(()),
        }
    }

    pub fn mode(&self) -> NavigationMode {
        self.lock().state.mode
    }

    pub fn set_mode(&self, mode: NavigationMode) {
        let mut session = self.lock();
        if session.state.mode != mode {
            log::info!("Navigation mode {:?} -> {:?}", session.state.mode, mode);
            session.state.mode = mode;
            session.bump_revision();
            self.publish(&session);
        }
    }

    pub fn toggle_follow_me(&self) -> NavigationMode {
        let next = match self.mode() {
            NavigationMode::Static => NavigationMode::FollowMe,
            NavigationMode::FollowMe => NavigationMode::Static,
        };
        self.set_mode(next);
        next
    }

    pub fn profile(&self) -> RouteProfile {
        self.lock().profile
    }

    pub fn set_profile(&self, profile: RouteProfile) {
        let mut session = self.lock();
        session.profile = profile;
        self.publish(&session);
    }

    /// Explicit Static-mode origin. Follow-Me always starts at the filtered
    /// position instead.
    pub fn set_origin(&self, origin: Option<Point>) {
        let mut session = self.lock();
        if session.origin != origin {
            session.origin = origin;
            session.bump_revision();
            self.publish(&session);
        }
    }

    pub fn set_destination(&self, destination: Option<Point>) {
        let mut session = self.lock();
        if session.destination != destination {
            session.destination = destination;
            session.bump_revision();
            self.publish(&session);
        }
    }

    pub fn waypoints(&self) -> Vec<Waypoint> {
        self.lock().waypoints.clone()
    }

    pub fn add_waypoint(&self, waypoint: Waypoint) -> Uuid {
        let mut session = self.lock();
        let index = session.waypoints.len();
        self.insert_locked(&mut session, index, waypoint)
    }

    pub fn insert_waypoint(&self, index: usize, waypoint: Waypoint) -> Uuid {
        let mut session = self.lock();
        self.insert_locked(&mut session, index, waypoint)
    }

    /// Adds a search result the user chose to route through.
    pub fn promote_search_result(&self, point: Point, label: impl Into<String>) -> Uuid {
        self.add_waypoint(Waypoint::new(point, WaypointSource::PromotedSearchResult).with_label(label))
    }

    fn insert_locked(&self, session: &mut NavigationSession, index: usize, waypoint: Waypoint) -> Uuid {
        let id = waypoint.id;
        let index = index.min(session.waypoints.len());
        session.waypoints.insert(index, waypoint);
        session.bump_revision();
        self.publish(session);
        id
    }

    pub fn remove_waypoint(&self, id: Uuid) -> Result<Waypoint> {
        let mut session = self.lock();
        let position = session
            .waypoints
            .iter()
            .position(|w| w.id == id)
            .ok_or(NavError::UnknownWaypoint(id))?;
        let removed = session.waypoints.remove(position);
        session.bump_revision();
        self.publish(&session);
        Ok(removed)
    }

    pub fn move_waypoint(&self, id: Uuid, to_index: usize) -> Result<()> {
        let mut session = self.lock();
        let from = session
            .waypoints
            .iter()
            .position(|w| w.id == id)
            .ok_or(NavError::UnknownWaypoint(id))?;
        let waypoint = session.waypoints.remove(from);
        let to_index = to_index.min(session.waypoints.len());
        session.waypoints.insert(to_index, waypoint);
        if from != to_index {
            session.bump_revision();
        }
        self.publish(&session);
        Ok(())
    }

    pub fn clear_waypoints(&self) {
        let mut session = self.lock();
        if !session.waypoints.is_empty() {
            session.waypoints.clear();
            session.bump_revision();
            self.publish(&session);
        }
    }

    /// Feeds one raw position sample through the filter and the progress
    /// tracker. Returns the filtered position, or `None` if the sample was
    /// rejected.
    pub fn on_position(&self, sample: &PositionSample) -> Option<FilteredPosition> {
        let mut guard = self.lock();
        let session = &mut *guard;

        let filtered = session
            .filter
            .process(sample, session.active.as_ref().map(|active| &active.index))?;
        session.state.filtered_position = Some(filtered);
        session.refresh_progress();
        self.publish(session);

        Some(filtered)
    }

    /// Resolves the request and claims a new token. Fails without touching
    /// the session when there is nothing valid to route.
    fn begin(&self, intent: &RouteIntent) -> Result<(u64, RouteRequest)> {
        let mut session = self.lock();

        if intent.origin.is_some() && session.origin != intent.origin {
            session.origin = intent.origin;
            session.bump_revision();
        }
        if intent.destination.is_some() && session.destination != intent.destination {
            session.destination = intent.destination;
            session.bump_revision();
        }
        let intent = RouteIntent {
            origin: session.origin,
            destination: session.destination,
        };

        let request = match session.state.mode {
            NavigationMode::Static => resolve_static(&intent, &session.waypoints, session.profile)?,
            NavigationMode::FollowMe => {
                let current = session.current_point().ok_or(NavError::PositionUnavailable)?;
                resolve_follow_me(
                    current,
                    &intent,
                    &session.waypoints,
                    session.profile,
                    self.options.routing.follow_me_prepend_m,
                )?
            }
        };

        session.state.request_token += 1;
        session.state.status = BuildStatus::Building;
        let token = session.state.request_token;
        let anchor = session.anchor();
        let (revision, profile) = (session.waypoint_revision, session.profile);
        session.policy.record(anchor, revision, profile);
        self.publish(&session);

        log::debug!(
            "Route build #{} started with {} intermediate point(s)",
            token,
            request.intermediates.len()
        );
        Ok((token, request))
    }

    async fn build(&self, token: u64, request: RouteRequest) -> Result<BuildOutcome> {
        if let Some(route) = self.cache.lookup(&request) {
            return self.finish(token, Ok(route), true);
        }

        match self.provider.fetch_route(&request).await {
            Ok(route) => {
                let route = Arc::new(self.simplified(route));
                self.cache.store(&request, route.clone());
                self.finish(token, Ok(route), false)
            }
            Err(e) => self.finish(token, Err(e), false),
        }
    }

    fn simplified(&self, route: Route) -> Route {
        let polyline = simplify(&route.polyline, self.options.routing.simplify_tolerance_m);
        log::trace!(
            "Simplified route polyline {} -> {} points",
            route.polyline.len(),
            polyline.len()
        );
        Route { polyline, ..route }
    }

    fn finish(
        &self,
        token: u64,
        result: std::result::Result<Arc<Route>, ProviderError>,
        from_cache: bool,
    ) -> Result<BuildOutcome> {
        let mut session = self.lock();

        if token != session.state.request_token {
            log::debug!(
                "Discarding stale route build #{} (current #{})",
                token,
                session.state.request_token
            );
            return Ok(BuildOutcome::Stale);
        }

        match result {
            Ok(route) => {
                session.install_route(route.clone(), &self.options);
                self.publish(&session);
                log::info!(
                    "Route build #{} ready: {:.0} m, {} steps{}",
                    token,
                    route.distance_meters,
                    route.steps.len(),
                    if from_cache { " (cached)" } else { "" }
                );
                Ok(BuildOutcome::Applied { route, from_cache })
            }
            Err(e) => {
                log::warn!("Route build #{} failed: {}", token, e);
                session.state.status = BuildStatus::Failed(e.clone());
                self.publish(&session);
                Err(NavError::Provider(e))
            }
        }
    }

    /// Requests a route and waits for it. A provider failure leaves any
    /// route already on display in place.
    pub async fn request_route(&self, intent: RouteIntent) -> Result<BuildOutcome> {
        let (token, request) = self.begin(&intent)?;
        self.build(token, request).await
    }

    /// Claims a token now and runs the build in the background, so the
    /// caller (typically the position pipeline) never waits on the network.
    pub fn spawn_request(self: &Arc<Self>, intent: RouteIntent) -> Result<JoinHandle<Result<BuildOutcome>>> {
        let (token, request) = self.begin(&intent)?;
        let this = Arc::clone(self);
        Ok(tokio::spawn(async move { this.build(token, request).await }))
    }

    /// Starts a rebuild when the profile, the waypoint list, or (in
    /// Follow-Me) the position has changed enough since the last build.
    pub fn rebuild_if_needed(self: &Arc<Self>) -> Option<JoinHandle<Result<BuildOutcome>>> {
        let reason = self.lock().rebuild_reason()?;
        log::debug!("Route rebuild triggered: {:?}", reason);

        match self.spawn_request(RouteIntent::default()) {
            Ok(handle) => Some(handle),
            Err(e) => {
                log::debug!("Route rebuild skipped: {}", e);
                None
            }
        }
    }

    /// Consumes a position stream in arrival order until it closes. In
    /// Follow-Me mode accepted samples may trigger background rebuilds.
    pub async fn track(self: Arc<Self>, mut samples: mpsc::Receiver<PositionSample>) {
        while let Some(sample) = samples.recv().await {
            if self.on_position(&sample).is_none() {
                continue;
            }
            if self.mode() == NavigationMode::FollowMe {
                self.rebuild_if_needed();
            }
        }
        // A later stream must not dead-reckon from this one's last fix.
        self.lock().filter.reset();
        log::debug!("Position stream closed");
    }
}
