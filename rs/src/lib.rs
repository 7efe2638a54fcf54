//! Route building and live navigation: turns user intent and a stream of
//! raw positions into a route, a filtered position and step progress.

pub mod cache;
pub mod core;
pub mod parser;
pub mod provider;
pub mod session;
pub mod spatial;
pub mod tracking;

pub use crate::cache::RouteCache;
pub use crate::core::config::EngineOptions;
pub use crate::core::errors::{NavError, ProviderError, Result};
pub use crate::core::types::{
    FilteredPosition, ManeuverKind, NavigationMode, Point, PositionSample, RoundaboutExit, Route,
    RoutePreference, RouteProfile, RouteRequest, Step, TravelMode, Waypoint, WaypointSource,
};
pub use crate::provider::{GraphHopperProvider, RouteProvider};
pub use crate::session::{
    BuildOutcome, BuildStatus, NavigationSnapshot, NavigationState, RouteIntent, RouteOrchestrator,
};
