use crate::core::config::ProviderOptions;
use crate::core::errors::ProviderError;
use crate::core::types::{
    ManeuverKind, Point, RoundaboutExit, Route, RoutePreference, RouteProfile, RouteRequest,
    Step, TerrainParams, TravelMode,
};
use crate::parser::decode_polyline;
use crate::provider::scoring::select_route;
use crate::provider::{ProviderFuture, RouteProvider};
use crate::spatial::geometry::polyline_length;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

type ProviderResult<T> = std::result::Result<T, ProviderError>;

const ORDINAL_WORDS: [&str; 10] = [
    "first", "second", "third", "fourth", "fifth", "sixth", "seventh", "eighth", "ninth", "tenth",
];

#[derive(Debug, Deserialize)]
struct GhResponse {
    #[serde(default)]
    paths: Vec<GhPath>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GhPath {
    #[serde(default)]
    distance: Option<f64>,
    /// Milliseconds.
    #[serde(default)]
    time: Option<f64>,
    #[serde(default)]
    points: Option<GhPoints>,
    #[serde(default)]
    instructions: Vec<GhInstruction>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum GhPoints {
    Encoded(String),
    LineString { coordinates: Vec<Vec<f64>> },
}

#[derive(Debug, Deserialize)]
struct GhInstruction {
    #[serde(default)]
    distance: f64,
    #[serde(default)]
    text: String,
    #[serde(default)]
    sign: i32,
    #[serde(default)]
    interval: Option<[usize; 2]>,
    #[serde(default)]
    exit_number: Option<u32>,
    /// Vendor maneuver code, e.g. `roundabout-exit-3`. Not every deployment
    /// sends it.
    #[serde(default)]
    maneuver: Option<String>,
}

/// Directions provider speaking the GraphHopper routing API.
pub struct GraphHopperProvider {
    client: reqwest::Client,
    options: ProviderOptions,
}

impl GraphHopperProvider {
    pub fn new(options: ProviderOptions) -> Self {
        GraphHopperProvider::with_client(options, reqwest::Client::new())
    }

    /// Uses a preconfigured client, e.g. one with custom timeouts or proxies.
    pub fn with_client(options: ProviderOptions, client: reqwest::Client) -> Self {
        GraphHopperProvider { client, options }
    }

    fn route_url(&self) -> String {
        format!("{}/route", self.options.server.trim_end_matches('/'))
    }

    async fn fetch(&self, request: &RouteRequest) -> ProviderResult<Route> {
        let body = build_request_body(request, &self.options);
        let attempts_allowed = self.options.retries.max(1);
        let mut attempts = 0;
        let mut last_error = ProviderError::Network("no attempt made".to_string());

        while attempts < attempts_allowed {
            let mut call = self.client.post(self.route_url()).json(&body);
            if let Some(key) = &self.options.api_key {
                call = call.query(&[("key", key)]);
            }

            let response = call
                .send()
                .await
                .map_err(|e| ProviderError::Network(e.to_string()))?;
            let status = response.status();

            if status.is_success() {
                let text = response
                    .text()
                    .await
                    .map_err(|e| ProviderError::Network(e.to_string()))?;
                return parse_response(&text, &request.profile);
            }

            if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                last_error = ProviderError::RateLimited;
            } else if status.is_server_error() {
                last_error = ProviderError::Network(format!("provider returned {}", status));
            } else {
                let text = response.text().await.unwrap_or_default();
                return Err(classify_client_error(status, &text));
            }

            attempts += 1;
            log::warn!(
                "Directions request failed with {} (attempt {}/{})",
                status,
                attempts,
                attempts_allowed
            );
            if attempts < attempts_allowed {
                tokio::time::sleep(Duration::from_millis(self.options.retry_delay_ms)).await;
            }
        }

        Err(last_error)
    }
}

impl RouteProvider for GraphHopperProvider {
    fn fetch_route<'a>(&'a self, request: &'a RouteRequest) -> ProviderFuture<'a> {
        Box::pin(self.fetch(request))
    }
}

fn vehicle(mode: TravelMode) -> &'static str {
    match mode {
        TravelMode::Car => "car",
        TravelMode::Motorcycle => "motorcycle",
        TravelMode::Bicycle => "bike",
        TravelMode::Pedestrian => "foot",
    }
}

pub fn build_request_body(request: &RouteRequest, options: &ProviderOptions) -> Value {
    let points: Vec<[f64; 2]> = request
        .points()
        .map(|p| [p.longitude(), p.latitude()])
        .collect();

    let mut body = json!({
        "points": points,
        "profile": vehicle(request.profile.mode),
        "points_encoded": true,
        "instructions": true,
        "locale": "en",
    });

    if options.alternatives
        && request.profile.mode.is_self_powered()
        && request.intermediates.is_empty()
    {
        body["algorithm"] = json!("alternative_route");
        body["alternative_route.max_paths"] = json!(3);
    }

    match request.profile.preference {
        RoutePreference::Fastest => {}
        RoutePreference::Shortest => {
            body["ch.disable"] = json!(true);
            body["custom_model"] = json!({ "distance_influence": 200 });
        }
        RoutePreference::Scenic | RoutePreference::Custom => {
            let terrain = request.profile.terrain.unwrap_or(TerrainParams {
                hilliness: 0.5,
                windingness: 0.5,
            });
            body["ch.disable"] = json!(true);
            body["custom_model"] = terrain_model(&terrain);
        }
    }

    body
}

/// Expresses terrain taste through the `curvature` and `average_slope`
/// encoded values. Priority factors must not exceed 1; both stay within
/// `[0.2, 1]`.
fn terrain_model(terrain: &TerrainParams) -> Value {
    let windingness = terrain.windingness.clamp(0.0, 1.0);
    let hilliness = terrain.hilliness.clamp(0.0, 1.0);

    json!({
        "distance_influence": 10,
        "priority": [
            {
                "if": "curvature >= 0.9",
                "multiply_by": format!("{:.2}", 1.0 - 0.8 * windingness)
            },
            {
                "if": "average_slope >= 4",
                "multiply_by": format!("{:.2}", 0.2 + 0.8 * hilliness)
            }
        ]
    })
}

fn classify_client_error(status: reqwest::StatusCode, body: &str) -> ProviderError {
    let message = serde_json::from_str::<GhResponse>(body)
        .ok()
        .and_then(|response| response.message)
        .unwrap_or_else(|| body.to_string());
    let lower = message.to_lowercase();

    if lower.contains("cannot find point")
        || lower.contains("not found")
        || lower.contains("connection between locations")
    {
        log::info!("Provider found no route: {}", message);
        ProviderError::NoRouteFound
    } else {
        ProviderError::Network(format!("provider rejected request ({}): {}", status, message))
    }
}

/// Turns a provider response body into the route to display, choosing among
/// alternatives for self-powered profiles.
pub fn parse_response(body: &str, profile: &RouteProfile) -> ProviderResult<Route> {
    let response: GhResponse = serde_json::from_str(body)
        .map_err(|e| ProviderError::MalformedResponse(e.to_string()))?;

    if response.paths.is_empty() {
        if let Some(message) = &response.message {
            log::info!("Provider returned no paths: {}", message);
        }
        return Err(ProviderError::NoRouteFound);
    }

    let total = response.paths.len();
    let candidates: Vec<Route> = response
        .paths
        .iter()
        .enumerate()
        .filter_map(|(i, path)| match path_to_route(path) {
            Ok(route) => Some(route),
            Err(e) => {
                log::warn!("Skipping unusable path {}/{}: {}", i + 1, total, e);
                None
            }
        })
        .collect();

    if candidates.is_empty() {
        return Err(ProviderError::MalformedResponse(
            "no usable path in response".to_string(),
        ));
    }

    select_route(candidates, profile).ok_or(ProviderError::NoRouteFound)
}

fn path_to_route(path: &GhPath) -> ProviderResult<Route> {
    let polyline = match &path.points {
        Some(GhPoints::Encoded(encoded)) => decode_polyline(encoded, 5)
            .map_err(|e| ProviderError::MalformedResponse(e.to_string()))?,
        Some(GhPoints::LineString { coordinates }) => coordinates
            .iter()
            .map(|pair| match pair.as_slice() {
                [lon, lat, ..] => Point::new(*lat, *lon)
                    .map_err(|e| ProviderError::MalformedResponse(e.to_string())),
                _ => Err(ProviderError::MalformedResponse(
                    "coordinate pair too short".to_string(),
                )),
            })
            .collect::<ProviderResult<Vec<Point>>>()?,
        None => return Err(ProviderError::MalformedResponse("path has no points".to_string())),
    };

    if polyline.len() < 2 {
        return Err(ProviderError::MalformedResponse(format!(
            "path has {} point(s)",
            polyline.len()
        )));
    }

    let last = polyline.len() - 1;
    let steps = path
        .instructions
        .iter()
        .enumerate()
        .map(|(i, instruction)| {
            let [from, to] = instruction.interval.unwrap_or([0, last]);
            let maneuver = map_sign(instruction.sign, i);
            let is_roundabout = maneuver == ManeuverKind::Roundabout
                || (maneuver != ManeuverKind::LeaveRoundabout
                    && instruction
                        .maneuver
                        .as_deref()
                        .is_some_and(|code| code.to_lowercase().contains("roundabout")));

            Step {
                maneuver: if is_roundabout {
                    ManeuverKind::Roundabout
                } else {
                    maneuver
                },
                instruction: instruction.text.clone(),
                distance_meters: instruction.distance,
                start_point: polyline[from.min(last)],
                end_point: polyline[to.min(last)],
                roundabout_exit: is_roundabout.then(|| {
                    resolve_roundabout_exit(
                        instruction.exit_number,
                        instruction.maneuver.as_deref(),
                        &instruction.text,
                    )
                }),
            }
        })
        .collect();

    let distance_meters = match path.distance {
        Some(distance) if distance > 0.0 => distance,
        _ => polyline_length(&polyline),
    };

    Ok(Route {
        distance_meters,
        duration_seconds: path.time.unwrap_or(0.0) / 1000.0,
        polyline,
        steps,
    })
}

fn map_sign(sign: i32, index: usize) -> ManeuverKind {
    match sign {
        0 if index == 0 => ManeuverKind::Depart,
        0 => ManeuverKind::Continue,
        -98 | -8 | 8 => ManeuverKind::UTurn,
        -7 => ManeuverKind::KeepLeft,
        7 => ManeuverKind::KeepRight,
        -6 => ManeuverKind::LeaveRoundabout,
        6 => ManeuverKind::Roundabout,
        -3 => ManeuverKind::SharpLeft,
        -2 => ManeuverKind::Left,
        -1 => ManeuverKind::SlightLeft,
        1 => ManeuverKind::SlightRight,
        2 => ManeuverKind::Right,
        3 => ManeuverKind::SharpRight,
        4 => ManeuverKind::Arrive,
        5 => ManeuverKind::WaypointReached,
        _ => ManeuverKind::Unknown,
    }
}

/// Works out which roundabout exit to announce. Precedence: the explicit
/// exit count, then an ordinal embedded in the maneuver code (or, without a
/// code, in the instruction text), then a direction taken from the code or
/// text.
pub fn resolve_roundabout_exit(
    exit_number: Option<u32>,
    maneuver_code: Option<&str>,
    text: &str,
) -> RoundaboutExit {
    if let Some(n) = exit_number.filter(|n| *n > 0) {
        return RoundaboutExit::Numbered(n);
    }

    let embedded = match maneuver_code {
        Some(code) => ordinal_in_code(code),
        None => ordinal_in_text(text),
    };
    if let Some(n) = embedded {
        return RoundaboutExit::Numbered(n);
    }

    let hint = format!("{} {}", maneuver_code.unwrap_or_default(), text).to_lowercase();
    if hint.contains("left") {
        RoundaboutExit::ExitLeft
    } else if hint.contains("right") {
        RoundaboutExit::ExitRight
    } else {
        RoundaboutExit::Enter
    }
}

fn ordinal_in_code(code: &str) -> Option<u32> {
    let digits: String = code
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok().filter(|n| *n > 0)
}

fn ordinal_in_text(text: &str) -> Option<u32> {
    let lower = text.to_lowercase();
    let words: Vec<&str> = lower
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();

    for (i, word) in words.iter().enumerate() {
        if *word != "exit" {
            continue;
        }
        if let Some(n) = i.checked_sub(1).and_then(|j| parse_ordinal(words[j])) {
            return Some(n);
        }
        if let Some(n) = words.get(i + 1).and_then(|next| next.parse::<u32>().ok()) {
            return Some(n).filter(|n| *n > 0);
        }
    }

    None
}

fn parse_ordinal(word: &str) -> Option<u32> {
    if let Some(position) = ORDINAL_WORDS.iter().position(|w| *w == word) {
        return Some(position as u32 + 1);
    }
    let digits = word
        .strip_suffix("st")
        .or_else(|| word.strip_suffix("nd"))
        .or_else(|| word.strip_suffix("rd"))
        .or_else(|| word.strip_suffix("th"))?;
    digits.parse().ok().filter(|n| *n > 0)
}
