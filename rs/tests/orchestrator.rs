use route_nav_engine::provider::ProviderFuture;
use route_nav_engine::spatial::geometry::polyline_length;
use route_nav_engine::{
    BuildOutcome, BuildStatus, EngineOptions, GraphHopperProvider, ManeuverKind, NavError,
    NavigationMode, Point, PositionSample, ProviderError, Route, RouteCache, RouteIntent,
    RouteOrchestrator, RouteProvider, RouteRequest, Step, Waypoint, WaypointSource,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, oneshot};

fn pt(lat: f64, lon: f64) -> Point {
    Point::new(lat, lon).unwrap()
}

fn sample(lat: f64, lon: f64, timestamp_ms: u64) -> PositionSample {
    PositionSample {
        latitude: lat,
        longitude: lon,
        accuracy: 5.0,
        heading: None,
        speed: None,
        timestamp_ms,
    }
}

fn straight_route(request: &RouteRequest) -> Route {
    let polyline: Vec<Point> = request.points().copied().collect();
    let distance = polyline_length(&polyline);
    Route {
        steps: vec![
            Step {
                maneuver: ManeuverKind::Depart,
                instruction: "Depart".to_string(),
                distance_meters: distance,
                start_point: request.origin,
                end_point: request.destination,
                roundabout_exit: None,
            },
            Step {
                maneuver: ManeuverKind::Arrive,
                instruction: "Arrive".to_string(),
                distance_meters: 0.0,
                start_point: request.destination,
                end_point: request.destination,
                roundabout_exit: None,
            },
        ],
        distance_meters: distance,
        duration_seconds: distance / 10.0,
        polyline,
    }
}

struct Scripted {
    destination: Point,
    gate: Option<oneshot::Receiver<()>>,
    failure: Option<ProviderError>,
}

/// Answers with a straight line unless a script entry for the requested
/// destination says to wait or fail.
#[derive(Default)]
struct ScriptedProvider {
    calls: AtomicUsize,
    requests: Mutex<Vec<RouteRequest>>,
    script: Mutex<Vec<Scripted>>,
}

impl ScriptedProvider {
    fn gate(&self, destination: Point) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.script.lock().unwrap().push(Scripted {
            destination,
            gate: Some(rx),
            failure: None,
        });
        tx
    }

    fn fail(&self, destination: Point, error: ProviderError) {
        self.script.lock().unwrap().push(Scripted {
            destination,
            gate: None,
            failure: Some(error),
        });
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn last_request(&self) -> Option<RouteRequest> {
        self.requests.lock().unwrap().last().cloned()
    }
}

impl RouteProvider for ScriptedProvider {
    fn fetch_route<'a>(&'a self, request: &'a RouteRequest) -> ProviderFuture<'a> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());

        let scripted = {
            let mut script = self.script.lock().unwrap();
            script
                .iter()
                .position(|s| s.destination == request.destination)
                .map(|index| script.remove(index))
        };

        Box::pin(async move {
            if let Some(scripted) = scripted {
                if let Some(gate) = scripted.gate {
                    let _ = gate.await;
                }
                if let Some(failure) = scripted.failure {
                    return Err(failure);
                }
            }
            Ok(straight_route(request))
        })
    }
}

fn orchestrator(provider: &Arc<ScriptedProvider>) -> Arc<RouteOrchestrator> {
    let options = EngineOptions::default();
    let cache = Arc::new(RouteCache::from_options(&options.cache));
    Arc::new(RouteOrchestrator::new(provider.clone(), cache, options))
}

#[tokio::test]
async fn second_identical_request_is_served_from_cache() {
    let provider = Arc::new(ScriptedProvider::default());
    let nav = orchestrator(&provider);
    let intent = RouteIntent::between(pt(51.50, -0.10), pt(51.52, -0.08));

    let first = nav.request_route(intent).await.unwrap();
    assert!(matches!(first, BuildOutcome::Applied { from_cache: false, .. }));

    let second = nav.request_route(intent).await.unwrap();
    assert!(matches!(second, BuildOutcome::Applied { from_cache: true, .. }));
    assert_eq!(provider.calls(), 1);

    let snapshot = nav.snapshot();
    assert_eq!(snapshot.request_token, 2);
    assert_eq!(snapshot.status, BuildStatus::Ready);
}

#[tokio::test]
async fn superseded_build_never_replaces_newer_route() {
    let provider = Arc::new(ScriptedProvider::default());
    let nav = orchestrator(&provider);
    let origin = pt(51.50, -0.10);
    let slow_destination = pt(51.52, -0.08);
    let fast_destination = pt(51.53, -0.12);

    let release = provider.gate(slow_destination);
    let slow = nav
        .spawn_request(RouteIntent::between(origin, slow_destination))
        .unwrap();
    let fast = nav
        .spawn_request(RouteIntent::between(origin, fast_destination))
        .unwrap();

    let applied = fast.await.unwrap().unwrap();
    assert!(matches!(applied, BuildOutcome::Applied { .. }));

    release.send(()).unwrap();
    let stale = slow.await.unwrap().unwrap();
    assert_eq!(stale, BuildOutcome::Stale);

    let route = nav.last_route().unwrap();
    assert_eq!(route.polyline.last(), Some(&fast_destination));
    assert_eq!(nav.snapshot().request_token, 2);
}

#[tokio::test]
async fn provider_failure_keeps_previous_route() {
    let provider = Arc::new(ScriptedProvider::default());
    let nav = orchestrator(&provider);
    let origin = pt(51.50, -0.10);
    let unreachable = pt(51.60, -0.20);

    nav.request_route(RouteIntent::between(origin, pt(51.52, -0.08)))
        .await
        .unwrap();
    let before = nav.last_route().unwrap();

    provider.fail(unreachable, ProviderError::NoRouteFound);
    let err = nav
        .request_route(RouteIntent::between(origin, unreachable))
        .await
        .unwrap_err();
    assert!(matches!(err, NavError::Provider(ProviderError::NoRouteFound)));

    let snapshot = nav.snapshot();
    assert_eq!(snapshot.status, BuildStatus::Failed(ProviderError::NoRouteFound));
    assert!(Arc::ptr_eq(&snapshot.route.unwrap(), &before));
}

#[tokio::test]
async fn follow_me_waits_for_a_position_then_starts_there() {
    let provider = Arc::new(ScriptedProvider::default());
    let nav = orchestrator(&provider);
    nav.set_mode(NavigationMode::FollowMe);
    let destination = pt(51.52, -0.08);

    let err = nav
        .request_route(RouteIntent::to(destination))
        .await
        .unwrap_err();
    assert!(matches!(err, NavError::PositionUnavailable));
    assert_eq!(nav.snapshot().request_token, 0);
    assert_eq!(provider.calls(), 0);

    let current = nav.on_position(&sample(51.500, -0.100, 1_000)).unwrap();
    nav.add_waypoint(Waypoint::new(pt(51.5003, -0.1002), WaypointSource::UserAdded));
    nav.request_route(RouteIntent::to(destination)).await.unwrap();

    let request = provider.last_request().unwrap();
    assert_eq!(request.origin, current.point);
    assert_eq!(request.intermediates, vec![current.point, pt(51.5003, -0.1002)]);
    assert_eq!(request.destination, destination);
}

#[tokio::test]
async fn follow_me_rebuilds_only_after_real_movement() {
    let provider = Arc::new(ScriptedProvider::default());
    let nav = orchestrator(&provider);
    nav.set_mode(NavigationMode::FollowMe);

    nav.on_position(&sample(51.500, -0.100, 1_000)).unwrap();
    nav.request_route(RouteIntent::to(pt(51.52, -0.08))).await.unwrap();
    assert!(nav.rebuild_if_needed().is_none());

    // ~110 m north.
    nav.on_position(&sample(51.501, -0.100, 11_000)).unwrap();
    let handle = nav.rebuild_if_needed().unwrap();
    assert!(matches!(handle.await.unwrap().unwrap(), BuildOutcome::Applied { .. }));
    assert_eq!(provider.calls(), 2);
    assert!(nav.rebuild_if_needed().is_none());
}

#[tokio::test]
async fn waypoint_edits_trigger_static_rebuild() {
    let provider = Arc::new(ScriptedProvider::default());
    let nav = orchestrator(&provider);

    nav.request_route(RouteIntent::between(pt(51.50, -0.10), pt(51.52, -0.08)))
        .await
        .unwrap();
    assert!(nav.rebuild_if_needed().is_none());

    let id = nav.promote_search_result(pt(51.51, -0.09), "Cafe");
    assert_eq!(nav.waypoints()[0].label.as_deref(), Some("Cafe"));
    let handle = nav.rebuild_if_needed().unwrap();
    handle.await.unwrap().unwrap();

    let request = provider.last_request().unwrap();
    assert_eq!(request.origin, pt(51.50, -0.10));
    assert_eq!(request.intermediates, vec![pt(51.51, -0.09)]);
    assert_eq!(request.destination, pt(51.52, -0.08));

    nav.remove_waypoint(id).unwrap();
    assert!(matches!(
        nav.remove_waypoint(id),
        Err(NavError::UnknownWaypoint(missing)) if missing == id
    ));
}

#[tokio::test]
async fn waypoints_can_be_reordered_and_cleared() {
    let provider = Arc::new(ScriptedProvider::default());
    let nav = orchestrator(&provider);

    let a = nav.add_waypoint(Waypoint::new(pt(51.50, -0.10), WaypointSource::UserAdded));
    let b = nav.add_waypoint(Waypoint::new(pt(51.51, -0.09), WaypointSource::UserAdded));
    let c = nav.insert_waypoint(0, Waypoint::new(pt(51.52, -0.08), WaypointSource::UserAdded));

    let ids: Vec<_> = nav.waypoints().iter().map(|w| w.id).collect();
    assert_eq!(ids, vec![c, a, b]);

    nav.move_waypoint(c, 10).unwrap();
    let ids: Vec<_> = nav.waypoints().iter().map(|w| w.id).collect();
    assert_eq!(ids, vec![a, b, c]);

    nav.clear_waypoints();
    assert!(nav.waypoints().is_empty());
    assert!(nav.move_waypoint(a, 0).is_err());
}

#[tokio::test]
async fn snapshots_are_published_to_subscribers() {
    let provider = Arc::new(ScriptedProvider::default());
    let nav = orchestrator(&provider);
    let mut updates = nav.subscribe();

    nav.request_route(RouteIntent::between(pt(51.50, -0.10), pt(51.52, -0.08)))
        .await
        .unwrap();

    assert!(updates.has_changed().unwrap());
    let snapshot = updates.borrow_and_update().clone();
    assert_eq!(snapshot.status, BuildStatus::Ready);
    assert!(snapshot.route.is_some());
    assert!(nav.export_route_json().unwrap().unwrap().contains("polyline"));
}

#[tokio::test]
async fn position_stream_is_filtered_and_snapped() {
    let provider = Arc::new(ScriptedProvider::default());
    let nav = orchestrator(&provider);
    let destination = pt(51.50, -0.09);

    nav.request_route(RouteIntent::between(pt(51.50, -0.10), destination))
        .await
        .unwrap();

    let (tx, rx) = mpsc::channel(8);
    let tracking = tokio::spawn(nav.clone().track(rx));
    tx.send(sample(51.50, -0.099, 1_000)).await.unwrap();
    // ~1 m of jitter, dropped.
    tx.send(sample(51.50001, -0.099, 2_000)).await.unwrap();
    tx.send(sample(51.50005, -0.095, 30_000)).await.unwrap();
    drop(tx);
    tracking.await.unwrap();

    let snapshot = nav.snapshot();
    let position = snapshot.filtered_position.unwrap();
    assert!(position.snapped);
    assert!((position.point.longitude() - -0.095).abs() < 1e-6);
    assert!((position.point.latitude() - 51.50).abs() < 1e-6);

    let remaining = snapshot.remaining_distance_m.unwrap();
    assert!(remaining > 300.0 && remaining < 400.0);
    assert!(snapshot.step_index <= 1);
}

#[tokio::test]
async fn closed_stream_leaves_no_history_to_extrapolate_from() {
    let provider = Arc::new(ScriptedProvider::default());
    let nav = orchestrator(&provider);

    let (tx, rx) = mpsc::channel(8);
    let tracking = tokio::spawn(nav.clone().track(rx));
    tx.send(sample(51.50, -0.100, 1_000)).await.unwrap();
    tx.send(sample(51.50, -0.099, 8_000)).await.unwrap();
    drop(tx);
    tracking.await.unwrap();

    let inaccurate = PositionSample {
        accuracy: 100.0,
        heading: Some(90.0),
        ..sample(51.50, -0.098, 9_000)
    };
    assert!(nav.on_position(&inaccurate).is_none());
    assert!(nav.snapshot().filtered_position.is_some());
}

#[tokio::test]
async fn unreachable_provider_reports_network_error() {
    let mut options = EngineOptions::default();
    options.provider.server = "http://127.0.0.1:9".to_string();
    options.provider.retries = 1;
    let cache = Arc::new(RouteCache::from_options(&options.cache));
    let provider = Arc::new(GraphHopperProvider::new(options.provider.clone()));
    let nav = RouteOrchestrator::new(provider, cache, options);

    let err = nav
        .request_route(RouteIntent::between(pt(51.50, -0.10), pt(51.52, -0.08)))
        .await
        .unwrap_err();
    assert!(matches!(err, NavError::Provider(ProviderError::Network(_))));
    assert!(nav.last_route().is_none());
}
