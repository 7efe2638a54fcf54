use crate::core::errors::{NavError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterOptions {
    pub max_accuracy_m: f64,
    pub min_movement_m: f64,
    pub dead_reckoning_cap_m: f64,
    /// Weight of the previous speed estimate in the moving average.
    pub speed_smoothing: f64,
    pub snap_threshold_m: f64,
}

impl Default for FilterOptions {
    fn default() -> Self {
        FilterOptions {
            max_accuracy_m: 25.0,
            min_movement_m: 3.0,
            dead_reckoning_cap_m: 200.0,
            speed_smoothing: 0.7,
            snap_threshold_m: 50.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingOptions {
    pub rebuild_distance_m: f64,
    pub follow_me_prepend_m: f64,
    pub simplify_tolerance_m: f64,
    pub maneuver_arrival_m: f64,
}

impl Default for RoutingOptions {
    fn default() -> Self {
        RoutingOptions {
            rebuild_distance_m: 10.0,
            follow_me_prepend_m: 5.0,
            simplify_tolerance_m: 5.0,
            maneuver_arrival_m: 5.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheOptions {
    pub capacity: usize,
    pub ttl_secs: Option<u64>,
    pub coordinate_precision: u32,
    pub snapshot_path: Option<PathBuf>,
}

impl Default for CacheOptions {
    fn default() -> Self {
        CacheOptions {
            capacity: 64,
            ttl_secs: Some(24 * 60 * 60),
            coordinate_precision: 5,
            snapshot_path: None,
        }
    }
}

impl CacheOptions {
    pub fn ttl(&self) -> Option<Duration> {
        self.ttl_secs.map(Duration::from_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderOptions {
    pub server: String,
    pub api_key: Option<String>,
    pub retries: u32,
    pub retry_delay_ms: u64,
    pub alternatives: bool,
}

impl Default for ProviderOptions {
    fn default() -> Self {
        ProviderOptions {
            server: "https://graphhopper.com/api/1".to_string(),
            api_key: None,
            retries: 3,
            retry_delay_ms: 500,
            alternatives: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineOptions {
    pub filter: FilterOptions,
    pub routing: RoutingOptions,
    pub cache: CacheOptions,
    pub provider: ProviderOptions,
}

impl EngineOptions {
    pub fn from_json(json: &str) -> Result<Self> {
        let options: EngineOptions = serde_json::from_str(json)
            .map_err(|e| NavError::Config(format!("Invalid options JSON: {}", e)))?;
        options.validate()?;
        Ok(options)
    }

    pub fn validate(&self) -> Result<()> {
        let non_negative = [
            ("filter.max_accuracy_m", self.filter.max_accuracy_m),
            ("filter.min_movement_m", self.filter.min_movement_m),
            ("filter.dead_reckoning_cap_m", self.filter.dead_reckoning_cap_m),
            ("filter.snap_threshold_m", self.filter.snap_threshold_m),
            ("routing.rebuild_distance_m", self.routing.rebuild_distance_m),
            ("routing.follow_me_prepend_m", self.routing.follow_me_prepend_m),
            ("routing.simplify_tolerance_m", self.routing.simplify_tolerance_m),
            ("routing.maneuver_arrival_m", self.routing.maneuver_arrival_m),
        ];
        for (name, value) in non_negative {
            if !value.is_finite() || value < 0.0 {
                return Err(NavError::Config(format!(
                    "{} must be a non-negative number, got {}",
                    name, value
                )));
            }
        }

        if !(0.0..=1.0).contains(&self.filter.speed_smoothing) {
            return Err(NavError::Config(format!(
                "filter.speed_smoothing must be within [0, 1], got {}",
                self.filter.speed_smoothing
            )));
        }
        if self.cache.capacity == 0 {
            return Err(NavError::Config("cache.capacity must be at least 1".to_string()));
        }
        if self.cache.coordinate_precision > 9 {
            return Err(NavError::Config(format!(
                "cache.coordinate_precision {} is finer than GPS can resolve",
                self.cache.coordinate_precision
            )));
        }
        if self.provider.server.is_empty() {
            return Err(NavError::Config("provider.server must not be empty".to_string()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_thresholds() {
        let options = EngineOptions::default();
        assert_eq!(options.filter.max_accuracy_m, 25.0);
        assert_eq!(options.filter.dead_reckoning_cap_m, 200.0);
        assert_eq!(options.routing.rebuild_distance_m, 10.0);
        assert_eq!(options.cache.coordinate_precision, 5);
        assert!(options.validate().is_ok());
    }

    #[test]
    fn partial_json_overrides_only_named_fields() {
        let options =
            EngineOptions::from_json(r#"{"filter": {"max_accuracy_m": 40}, "cache": {"capacity": 8}}"#)
                .unwrap();
        assert_eq!(options.filter.max_accuracy_m, 40.0);
        assert_eq!(options.filter.min_movement_m, 3.0);
        assert_eq!(options.cache.capacity, 8);
        assert_eq!(options.provider.retries, 3);
    }

    #[test]
    fn rejects_invalid_values() {
        assert!(EngineOptions::from_json(r#"{"cache": {"capacity": 0}}"#).is_err());
        assert!(EngineOptions::from_json(r#"{"filter": {"speed_smoothing": 1.5}}"#).is_err());
        assert!(EngineOptions::from_json(r#"{"routing": {"rebuild_distance_m": -1}}"#).is_err());
        assert!(matches!(
            EngineOptions::from_json("{"),
            Err(NavError::Config(_))
        ));
    }
}
