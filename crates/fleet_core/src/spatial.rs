//! Spatial operations: H3 cell construction, distances, and ring searches.
//!
//! This module provides:
//!
//! - **Cell construction**: lat/lng to cell at a configured resolution
//! - **Distance calculations**: cached Haversine distance between H3 cells
//! - **Grid distance**: hex-grid step distance, `None` when H3 cannot compute it
//! - **Interpolation**: the cell some fraction of the way along a straight line
//! - **Nearest entity search**: ring search over a coarse search-resolution index
//!
//! Locations are stored at a fine resolution (default 15) and indexed for search at a coarse
//! resolution (default 7).

use std::collections::BTreeMap;
use std::num::NonZeroUsize;
use std::sync::{Mutex, OnceLock};

use h3o::{CellIndex, LatLng, Resolution};
use lru::LruCache;

use crate::error::SetupError;
use crate::units::Kilometers;

const EARTH_RADIUS_KM: f64 = 6371.0;

/// Sentinel distance used when a search finds nothing.
pub const NO_DISTANCE_KM: Kilometers = 1_000_000.0;

/// Build a cell from coordinates at the given resolution.
pub fn cell_at(lat: f64, lng: f64, resolution: Resolution) -> Result<CellIndex, SetupError> {
    LatLng::new(lat, lng)
        .map(|ll| ll.to_cell(resolution))
        .map_err(|e| SetupError::InvalidLocation {
            lat,
            lng,
            reason: e.to_string(),
        })
}

/// Parse a numeric H3 resolution.
pub fn resolution(value: u8) -> Result<Resolution, SetupError> {
    Resolution::try_from(value)
        .map_err(|e| SetupError::Config(format!("invalid h3 resolution {value}: {e}")))
}

/// Parent of `cell` at `res`, or the cell itself when it is already coarser.
pub fn search_cell(cell: CellIndex, res: Resolution) -> CellIndex {
    cell.parent(res).unwrap_or(cell)
}

/// Uncached distance calculation (internal use).
fn distance_km_between_cells_uncached(a: CellIndex, b: CellIndex) -> f64 {
    let a: LatLng = a.into();
    let b: LatLng = b.into();
    let (lat1, lon1) = (a.lat().to_radians(), a.lng().to_radians());
    let (lat2, lon2) = (b.lat().to_radians(), b.lng().to_radians());
    let dlat = lat2 - lat1;
    let dlon = lon2 - lon1;
    let sin_dlat = (dlat * 0.5).sin();
    let sin_dlon = (dlon * 0.5).sin();
    let h = sin_dlat * sin_dlat + lat1.cos() * lat2.cos() * sin_dlon * sin_dlon;
    2.0 * EARTH_RADIUS_KM * h.sqrt().asin()
}

/// Global distance cache (50,000 entries, ~800KB memory).
fn get_distance_cache() -> &'static Mutex<LruCache<(CellIndex, CellIndex), f64>> {
    static CACHE: OnceLock<Mutex<LruCache<(CellIndex, CellIndex), f64>>> = OnceLock::new();
    CACHE.get_or_init(|| {
        Mutex::new(LruCache::new(
            NonZeroUsize::new(50_000).unwrap_or(NonZeroUsize::MIN),
        ))
    })
}

/// Great-circle distance between two H3 cell centroids with LRU caching.
pub fn distance_km_between_cells(a: CellIndex, b: CellIndex) -> Kilometers {
    if a == b {
        return 0.0;
    }
    // Symmetric key (smaller cell first) to maximize cache hits
    let key = if a < b { (a, b) } else { (b, a) };

    let mut cache = match get_distance_cache().lock() {
        Ok(guard) => guard,
        Err(_) => return distance_km_between_cells_uncached(key.0, key.1),
    };

    *cache.get_or_insert(key, || distance_km_between_cells_uncached(key.0, key.1))
}

/// Hex-grid distance between two cells of the same resolution.
pub fn grid_distance(a: CellIndex, b: CellIndex) -> Option<u32> {
    a.grid_distance(b).ok().and_then(|d| u32::try_from(d).ok())
}

/// Cell at `ratio` of the way from `start` to `end`, at the resolution of `start`.
///
/// Ratios at (or numerically next to) the ends snap to the end cells.
pub fn point_along_line(start: CellIndex, end: CellIndex, ratio: f64) -> CellIndex {
    const THRESHOLD: f64 = 0.000001;
    if ratio < THRESHOLD {
        return start;
    }
    if ratio > 1.0 - THRESHOLD {
        return end;
    }
    let a: LatLng = start.into();
    let b: LatLng = end.into();
    let lat = a.lat() + (b.lat() - a.lat()) * ratio;
    let lng = a.lng() + (b.lng() - a.lng()) * ratio;
    LatLng::new(lat, lng)
        .map(|ll| ll.to_cell(start.resolution()))
        .unwrap_or(start)
}

/// Grid cell -> ids located in that cell. Values are kept sorted for deterministic scans.
pub type CellIndexMap = im::OrdMap<CellIndex, im::OrdSet<String>>;

/// Return the best entity found by a ring search over a coarse search index.
///
/// Rings are searched outward from the search-resolution parent of `origin`. Within the first
/// ring that holds a valid entity, the entity with the lowest `distance_fn` value wins; ties go
/// to the first id in ascending order. Returns `None` when nothing valid lies within
/// `max_search_distance_km`. `distance_fn` may return `None` to reject an entity.
pub fn nearest_entity<T, L, D>(
    origin: CellIndex,
    search_index: &CellIndexMap,
    search_resolution: Resolution,
    max_search_distance_km: Kilometers,
    lookup: L,
    mut distance_fn: D,
) -> Option<T>
where
    L: Fn(&str) -> Option<T>,
    D: FnMut(&T) -> Option<f64>,
{
    if search_index.is_empty() {
        return None;
    }
    let k_dist_km = search_resolution.edge_length_km() * 2.0;
    let max_k = (max_search_distance_km / k_dist_km).ceil().max(0.0) as u32;
    let origin_search = search_cell(origin, search_resolution);

    // ring -> ids in that ring, in ascending cell then id order
    let mut rings: BTreeMap<u32, Vec<&String>> = BTreeMap::new();
    for (cell, ids) in search_index.iter() {
        if let Some(k) = grid_distance(origin_search, *cell) {
            if k <= max_k {
                rings.entry(k).or_default().extend(ids.iter());
            }
        }
    }

    for (_, ids) in rings {
        let mut best: Option<(f64, T)> = None;
        for id in ids {
            let Some(entity) = lookup(id) else {
                continue;
            };
            let Some(dist) = distance_fn(&entity) else {
                continue;
            };
            let best_dist = best.as_ref().map_or(NO_DISTANCE_KM, |(d, _)| *d);
            if dist < best_dist {
                best = Some((dist, entity));
            }
        }
        if let Some((_, entity)) = best {
            return Some(entity);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{test_cell, test_cell_offset};

    #[test]
    fn distance_is_symmetric_and_zero_on_same_cell() {
        let a = test_cell();
        let b = test_cell_offset(0.01, 0.0);
        assert_eq!(distance_km_between_cells(a, a), 0.0);
        let ab = distance_km_between_cells(a, b);
        let ba = distance_km_between_cells(b, a);
        assert!((ab - ba).abs() < 1e-12);
        // 0.01 degrees of latitude is ~1.11 km
        assert!((ab - 1.11).abs() < 0.02, "got {ab}");
    }

    #[test]
    fn point_along_line_snaps_to_ends() {
        let a = test_cell();
        let b = test_cell_offset(0.01, 0.0);
        assert_eq!(point_along_line(a, b, 0.0), a);
        assert_eq!(point_along_line(a, b, 1.0), b);
        let mid = point_along_line(a, b, 0.5);
        let d = distance_km_between_cells(a, mid);
        assert!((d - 0.555).abs() < 0.01, "got {d}");
    }

    #[test]
    fn nearest_entity_prefers_closest_ring() {
        let res = Resolution::Seven;
        let origin = test_cell();
        let near = test_cell_offset(0.001, 0.0);
        let far = test_cell_offset(0.2, 0.0);
        let mut index = CellIndexMap::new();
        index
            .entry(search_cell(far, res))
            .or_insert_with(im::OrdSet::new)
            .insert("far".to_string());
        index
            .entry(search_cell(near, res))
            .or_insert_with(im::OrdSet::new)
            .insert("near".to_string());
        let cells: BTreeMap<&str, CellIndex> = [("near", near), ("far", far)].into_iter().collect();

        let found = nearest_entity(
            origin,
            &index,
            res,
            100.0,
            |id| cells.get(id).map(|c| (id.to_string(), *c)),
            |(_, c)| Some(distance_km_between_cells(origin, *c)),
        );
        assert_eq!(found.map(|(id, _)| id), Some("near".to_string()));
    }

    #[test]
    fn nearest_entity_respects_validity_and_radius() {
        let res = Resolution::Seven;
        let origin = test_cell();
        let far = test_cell_offset(0.5, 0.0);
        let mut index = CellIndexMap::new();
        index
            .entry(search_cell(far, res))
            .or_insert_with(im::OrdSet::new)
            .insert("far".to_string());

        let too_far = nearest_entity(
            origin,
            &index,
            res,
            1.0,
            |id| Some(id.to_string()),
            |_| Some(1.0),
        );
        assert!(too_far.is_none());

        let rejected = nearest_entity(
            origin,
            &index,
            res,
            500.0,
            |id| Some(id.to_string()),
            |_| None,
        );
        assert!(rejected.is_none());
    }
}
