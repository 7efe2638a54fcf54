use crate::core::config::CacheOptions;
use crate::core::errors::{NavError, Result};
use crate::core::types::{Point, Route, RouteProfile, RouteRequest};
use lru::LruCache;
use rustc_hash::FxBuildHasher;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::num::NonZeroUsize;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, SystemTime};

/// Canonical, coordinate-quantized serialization of a [`RouteRequest`].
///
/// Two requests whose points agree to `precision` decimal places (about a
/// meter at 5) and whose profiles are equal map to the same key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RouteRequestKey(String);

impl RouteRequestKey {
    pub fn new(request: &RouteRequest, precision: u32) -> Self {
        let scale = 10f64.powi(precision as i32);
        let points: Vec<String> = request
            .points()
            .map(|point| quantize_point(point, scale))
            .collect();

        RouteRequestKey(format!(
            "{}|{}",
            profile_fragment(&request.profile),
            points.join(";")
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RouteRequestKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn quantize_point(point: &Point, scale: f64) -> String {
    format!(
        "{},{}",
        (point.latitude() * scale).round() as i64,
        (point.longitude() * scale).round() as i64
    )
}

fn profile_fragment(profile: &RouteProfile) -> String {
    let terrain = match profile.terrain {
        Some(terrain) => format!(
            "h{}w{}",
            (terrain.hilliness * 100.0).round() as i64,
            (terrain.windingness * 100.0).round() as i64
        ),
        None => "-".to_string(),
    };
    format!("{:?}/{:?}/{}", profile.mode, profile.preference, terrain)
}

#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub key: RouteRequestKey,
    pub route: Arc<Route>,
    pub inserted_at: SystemTime,
}

#[derive(Serialize, Deserialize)]
struct SnapshotEntry {
    key: RouteRequestKey,
    route: Route,
    inserted_at: SystemTime,
}

/// Bounded LRU store of previously fetched routes.
///
/// Entries are whole `Arc<Route>` values swapped under the lock, so a reader
/// sees either the old route or the new one. The cache is advisory: a miss
/// only costs a provider call.
pub struct RouteCache {
    entries: Mutex<LruCache<RouteRequestKey, CacheEntry, FxBuildHasher>>,
    ttl: Option<Duration>,
    precision: u32,
}

impl RouteCache {
    pub fn new(capacity: usize, ttl: Option<Duration>, precision: u32) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        RouteCache {
            entries: Mutex::new(LruCache::with_hasher(capacity, FxBuildHasher)),
            ttl,
            precision,
        }
    }

    pub fn from_options(options: &CacheOptions) -> Self {
        RouteCache::new(options.capacity, options.ttl(), options.coordinate_precision)
    }

    pub fn key_for(&self, request: &RouteRequest) -> RouteRequestKey {
        RouteRequestKey::new(request, self.precision)
    }

    pub fn lookup(&self, request: &RouteRequest) -> Option<Arc<Route>> {
        let key = self.key_for(request);
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);

        let expired = match entries.get(&key) {
            Some(entry) if !self.is_expired(entry.inserted_at) => {
                log::debug!("Route cache hit for {}", key);
                return Some(entry.route.clone());
            }
            Some(_) => true,
            None => false,
        };

        if expired {
            log::debug!("Route cache entry for {} expired", key);
            entries.pop(&key);
        } else {
            log::debug!("Route cache miss for {}", key);
        }
        None
    }

    pub fn store(&self, request: &RouteRequest, route: Arc<Route>) {
        self.store_at(request, route, SystemTime::now());
    }

    fn store_at(&self, request: &RouteRequest, route: Arc<Route>, inserted_at: SystemTime) {
        let key = self.key_for(request);
        let entry = CacheEntry {
            key: key.clone(),
            route,
            inserted_at,
        };
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some((evicted, _)) = entries.push(key.clone(), entry) {
            if evicted != key {
                log::debug!("Route cache evicted {}", evicted);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    fn is_expired(&self, inserted_at: SystemTime) -> bool {
        match self.ttl {
            Some(ttl) => {
                SystemTime::now()
                    .duration_since(inserted_at)
                    .unwrap_or_default()
                    >= ttl
            }
            None => false,
        }
    }

    /// Writes all live entries to `path`, least recently used first so a
    /// reload restores the same recency order.
    pub fn save_snapshot(&self, path: &Path) -> Result<()> {
        let snapshot: Vec<SnapshotEntry> = {
            let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
            entries
                .iter()
                .rev()
                .filter(|(_, entry)| !self.is_expired(entry.inserted_at))
                .map(|(key, entry)| SnapshotEntry {
                    key: key.clone(),
                    route: entry.route.as_ref().clone(),
                    inserted_at: entry.inserted_at,
                })
                .collect()
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let writer = BufWriter::new(File::create(path)?);
        bincode::serialize_into(writer, &snapshot)?;
        log::info!("Saved {} cached routes to {}", snapshot.len(), path.display());

        Ok(())
    }

    /// Restores a cache from `path`. A missing file yields an empty cache;
    /// entries older than the TTL are dropped.
    pub fn load_snapshot(path: &Path, options: &CacheOptions) -> Result<Self> {
        let cache = RouteCache::from_options(options);
        if !path.exists() {
            return Ok(cache);
        }

        let reader = BufReader::new(File::open(path)?);
        let snapshot: Vec<SnapshotEntry> = bincode::deserialize_from(reader)
            .map_err(NavError::Bincode)?;

        let mut restored = 0;
        {
            let mut entries = cache.entries.lock().unwrap_or_else(PoisonError::into_inner);
            for item in snapshot {
                if cache.is_expired(item.inserted_at) {
                    continue;
                }
                entries.push(
                    item.key.clone(),
                    CacheEntry {
                        key: item.key,
                        route: Arc::new(item.route),
                        inserted_at: item.inserted_at,
                    },
                );
                restored += 1;
            }
        }
        log::info!("Restored {} cached routes from {}", restored, path.display());

        Ok(cache)
    }
}
