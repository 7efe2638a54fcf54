use serde::Serialize;
use std::io::Error as IoError;
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum ProviderError {
    #[error("No route found between the requested points")]
    NoRouteFound,
    #[error("Directions provider rate limit reached")]
    RateLimited,
    #[error("Network Error: {0}")]
    Network(String),
    #[error("Malformed provider response: {0}")]
    MalformedResponse(String),
}

#[derive(Error, Debug)]
pub enum NavError {
    #[error("Invalid coordinate: {0}")]
    InvalidCoordinate(String),
    #[error("Provider Error: {0}")]
    Provider(#[from] ProviderError),
    #[error("At least two points are required to build a route, got {available}")]
    NotEnoughPoints { available: usize },
    #[error("No filtered position available for Follow-Me routing")]
    PositionUnavailable,
    #[error("Waypoint with ID {0} not found")]
    UnknownWaypoint(Uuid),
    #[error("Configuration Error: {0}")]
    Config(String),
    #[error("File IO Error: {0}")]
    FileIO(#[from] IoError),
    #[error("JSON Error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Bincode Error: {0}")]
    Bincode(#[from] Box<bincode::ErrorKind>),
}

pub type Result<T> = std::result::Result<T, NavError>;
