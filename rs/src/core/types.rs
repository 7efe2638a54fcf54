use crate::core::errors::{NavError, Result};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A validated WGS84 coordinate.
///
/// Fields are private: a `Point` only exists once its latitude and longitude
/// have been checked, either through [`Point::new`] or the coordinate
/// normalizer. Deserialization goes through the same check.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawPoint")]
pub struct Point {
    latitude: f64,
    longitude: f64,
}

#[derive(Deserialize)]
struct RawPoint {
    latitude: f64,
    longitude: f64,
}

impl TryFrom<RawPoint> for Point {
    type Error = NavError;

    fn try_from(raw: RawPoint) -> Result<Self> {
        Point::new(raw.latitude, raw.longitude)
    }
}

impl Point {
    pub fn new(latitude: f64, longitude: f64) -> Result<Self> {
        if !latitude.is_finite() || !longitude.is_finite() {
            return Err(NavError::InvalidCoordinate(format!(
                "non-finite coordinate ({}, {})",
                latitude, longitude
            )));
        }
        if !(-90.0..=90.0).contains(&latitude) {
            return Err(NavError::InvalidCoordinate(format!(
                "latitude {} outside [-90, 90]",
                latitude
            )));
        }
        if !(-180.0..=180.0).contains(&longitude) {
            return Err(NavError::InvalidCoordinate(format!(
                "longitude {} outside [-180, 180]",
                longitude
            )));
        }
        Ok(Point {
            latitude,
            longitude,
        })
    }

    /// Builds a point from computed coordinates, clamping latitude and
    /// wrapping longitude back into range. Only for geometry results derived
    /// from already valid points.
    pub(crate) fn wrapped(latitude: f64, longitude: f64) -> Self {
        let longitude = if (-180.0..=180.0).contains(&longitude) {
            longitude
        } else {
            (longitude + 180.0).rem_euclid(360.0) - 180.0
        };
        Point {
            latitude: latitude.clamp(-90.0, 90.0),
            longitude,
        }
    }

    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    pub fn longitude(&self) -> f64 {
        self.longitude
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaypointSource {
    UserAdded,
    PromotedSearchResult,
    RouteOrigin,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Waypoint {
    pub id: Uuid,
    pub point: Point,
    pub label: Option<String>,
    pub source: WaypointSource,
    pub is_start: bool,
}

impl Waypoint {
    pub fn new(point: Point, source: WaypointSource) -> Self {
        Waypoint {
            id: Uuid::new_v4(),
            point,
            label: None,
            source,
            is_start: source == WaypointSource::RouteOrigin,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TravelMode {
    Car,
    Motorcycle,
    Bicycle,
    Pedestrian,
}

impl TravelMode {
    pub fn is_self_powered(&self) -> bool {
        matches!(self, TravelMode::Bicycle | TravelMode::Pedestrian)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutePreference {
    Fastest,
    Shortest,
    Scenic,
    Custom,
}

/// Custom terrain weighting, both in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TerrainParams {
    pub hilliness: f64,
    pub windingness: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RouteProfile {
    pub mode: TravelMode,
    pub preference: RoutePreference,
    #[serde(default)]
    pub terrain: Option<TerrainParams>,
}

impl RouteProfile {
    pub fn new(mode: TravelMode, preference: RoutePreference) -> Self {
        RouteProfile {
            mode,
            preference,
            terrain: None,
        }
    }

    pub fn with_terrain(mut self, hilliness: f64, windingness: f64) -> Self {
        self.terrain = Some(TerrainParams {
            hilliness,
            windingness,
        });
        self
    }
}

impl Default for RouteProfile {
    fn default() -> Self {
        RouteProfile::new(TravelMode::Car, RoutePreference::Fastest)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteRequest {
    pub origin: Point,
    pub intermediates: Vec<Point>,
    pub destination: Point,
    pub profile: RouteProfile,
}

impl RouteRequest {
    /// All points in travel order.
    pub fn points(&self) -> impl Iterator<Item = &Point> {
        std::iter::once(&self.origin)
            .chain(self.intermediates.iter())
            .chain(std::iter::once(&self.destination))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ManeuverKind {
    Depart,
    Continue,
    SlightLeft,
    Left,
    SharpLeft,
    SlightRight,
    Right,
    SharpRight,
    KeepLeft,
    KeepRight,
    UTurn,
    Roundabout,
    LeaveRoundabout,
    WaypointReached,
    Arrive,
    Unknown,
}

/// How to leave a roundabout, as far as the provider lets us know.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundaboutExit {
    Numbered(u32),
    Enter,
    ExitLeft,
    ExitRight,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    pub maneuver: ManeuverKind,
    pub instruction: String,
    pub distance_meters: f64,
    pub start_point: Point,
    pub end_point: Point,
    #[serde(default)]
    pub roundabout_exit: Option<RoundaboutExit>,
}

impl Step {
    pub fn roundabout_exit_number(&self) -> Option<u32> {
        match self.roundabout_exit {
            Some(RoundaboutExit::Numbered(n)) => Some(n),
            _ => None,
        }
    }
}

/// A built route. Never mutated after construction; a rebuild produces a
/// whole new `Route`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    pub polyline: Vec<Point>,
    pub distance_meters: f64,
    pub duration_seconds: f64,
    pub steps: Vec<Step>,
}

impl Route {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NavigationMode {
    Static,
    FollowMe,
}

/// A raw reading from the position source. Not validated.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PositionSample {
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy: f64,
    #[serde(default)]
    pub heading: Option<f64>,
    #[serde(default)]
    pub speed: Option<f64>,
    pub timestamp_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FilteredPosition {
    pub point: Point,
    pub heading: Option<f64>,
    pub snapped: bool,
    pub dead_reckoned: bool,
}
