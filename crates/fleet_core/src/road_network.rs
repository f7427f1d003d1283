//! Pluggable road networks: trait abstraction for routing backends.
//!
//! - **`HaversineRoadNetwork`**: straight-line routes at a constant average speed.
//! - **`CachedRoadNetwork`**: LRU memoisation around any other network.
//!
//! The network is shared by every snapshot of the simulation state as an
//! `Arc<dyn RoadNetwork>`, constructed once when the scenario is built.

use std::fmt;
use std::num::NonZeroUsize;
use std::sync::Mutex;

use h3o::{CellIndex, Resolution};
use lru::LruCache;
use serde::{Deserialize, Serialize};

use crate::spatial::distance_km_between_cells;
use crate::units::{Kilometers, Kmph, LinkId};

pub mod route;

pub use route::{Link, Route, RouteTraversal};

/// Average city speed used by the straight-line network.
pub const DEFAULT_SPEED_KMPH: Kmph = 40.0;

/// Where an entity sits: the link it is on and the cell it occupies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityPosition {
    pub link_id: LinkId,
    #[serde(with = "cell_serde")]
    pub geoid: CellIndex,
}

impl EntityPosition {
    pub fn new(link_id: impl Into<LinkId>, geoid: CellIndex) -> Self {
        Self {
            link_id: link_id.into(),
            geoid,
        }
    }
}

/// Serde helper: serialize a `CellIndex` as `u64`.
pub(crate) mod cell_serde {
    use h3o::CellIndex;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(cell: &CellIndex, ser: S) -> Result<S::Ok, S::Error> {
        u64::from(*cell).serialize(ser)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<CellIndex, D::Error> {
        let raw = u64::deserialize(de)?;
        CellIndex::try_from(raw).map_err(serde::de::Error::custom)
    }
}

/// Trait for routing backends. Implementations must be `Send + Sync` so the network can be
/// shared by snapshots used across threads in parallel experiment runs.
pub trait RoadNetwork: Send + Sync {
    /// Route between two positions. Must be empty when both share a cell.
    fn route(&self, origin: &EntityPosition, destination: &EntityPosition) -> Route;

    /// Distance between two positions in kilometres.
    fn distance_by_position_km(&self, a: &EntityPosition, b: &EntityPosition) -> Kilometers;

    /// Snap a cell onto the network. `None` if the cell is not reachable.
    fn position_from_geoid(&self, geoid: CellIndex) -> Option<EntityPosition>;

    /// The resolution at which positions are stored.
    fn sim_h3_resolution(&self) -> Resolution;
}

impl fmt::Debug for dyn RoadNetwork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RoadNetwork(res={})", self.sim_h3_resolution())
    }
}

// ---------------------------------------------------------------------------
// Haversine network
// ---------------------------------------------------------------------------

/// Routes are a single great-circle link travelled at a constant speed.
#[derive(Debug, Clone, Copy)]
pub struct HaversineRoadNetwork {
    sim_h3_resolution: Resolution,
    speed_kmph: Kmph,
}

impl HaversineRoadNetwork {
    pub fn new(sim_h3_resolution: Resolution) -> Self {
        Self {
            sim_h3_resolution,
            speed_kmph: DEFAULT_SPEED_KMPH,
        }
    }

    pub fn with_speed_kmph(mut self, speed_kmph: Kmph) -> Self {
        self.speed_kmph = speed_kmph;
        self
    }

    pub fn speed_kmph(&self) -> Kmph {
        self.speed_kmph
    }
}

impl Default for HaversineRoadNetwork {
    fn default() -> Self {
        Self::new(Resolution::Fifteen)
    }
}

impl RoadNetwork for HaversineRoadNetwork {
    fn route(&self, origin: &EntityPosition, destination: &EntityPosition) -> Route {
        if origin.geoid == destination.geoid {
            return Route::new();
        }
        let link = Link::new(
            format!("{}-{}", origin.geoid, destination.geoid),
            origin.geoid,
            destination.geoid,
            self.speed_kmph,
        );
        vec![link]
    }

    fn distance_by_position_km(&self, a: &EntityPosition, b: &EntityPosition) -> Kilometers {
        distance_km_between_cells(a.geoid, b.geoid)
    }

    fn position_from_geoid(&self, geoid: CellIndex) -> Option<EntityPosition> {
        if geoid.resolution() != self.sim_h3_resolution {
            return None;
        }
        Some(EntityPosition::new(geoid.to_string(), geoid))
    }

    fn sim_h3_resolution(&self) -> Resolution {
        self.sim_h3_resolution
    }
}

// ---------------------------------------------------------------------------
// Cached network
// ---------------------------------------------------------------------------

/// Default route cache capacity.
pub const DEFAULT_ROUTE_CACHE_CAPACITY: usize = 20_000;

/// Memoises routes from an inner network in an LRU keyed by (origin cell, destination cell).
pub struct CachedRoadNetwork {
    inner: Box<dyn RoadNetwork>,
    cache: Mutex<LruCache<(u64, u64), Route>>,
}

impl CachedRoadNetwork {
    pub fn new(inner: Box<dyn RoadNetwork>, capacity: usize) -> Self {
        Self {
            inner,
            cache: Mutex::new(LruCache::new(
                NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN),
            )),
        }
    }

    /// Number of cached routes.
    pub fn cached_len(&self) -> usize {
        self.cache.lock().map(|c| c.len()).unwrap_or(0)
    }
}

impl RoadNetwork for CachedRoadNetwork {
    fn route(&self, origin: &EntityPosition, destination: &EntityPosition) -> Route {
        let key = (u64::from(origin.geoid), u64::from(destination.geoid));

        // Fast path: cache hit
        if let Ok(mut cache) = self.cache.lock() {
            if let Some(cached) = cache.get(&key) {
                return cached.clone();
            }
        }

        let route = self.inner.route(origin, destination);
        if let Ok(mut cache) = self.cache.lock() {
            cache.put(key, route.clone());
        }
        route
    }

    fn distance_by_position_km(&self, a: &EntityPosition, b: &EntityPosition) -> Kilometers {
        self.inner.distance_by_position_km(a, b)
    }

    fn position_from_geoid(&self, geoid: CellIndex) -> Option<EntityPosition> {
        self.inner.position_from_geoid(geoid)
    }

    fn sim_h3_resolution(&self) -> Resolution {
        self.inner.sim_h3_resolution()
    }
}
