//! Links, routes, and time-budgeted traversal of a route.

use h3o::CellIndex;
use serde::{Deserialize, Serialize};

use crate::error::{SimError, SimResult};
use crate::road_network::{cell_serde, EntityPosition};
use crate::spatial::{distance_km_between_cells, point_along_line};
use crate::units::{travel_time_seconds, Kilometers, Kmph, LinkId, SECONDS_TO_HOURS};

/// A directed traversal between two cells.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Link {
    pub link_id: LinkId,
    #[serde(with = "cell_serde")]
    pub start: CellIndex,
    #[serde(with = "cell_serde")]
    pub end: CellIndex,
    pub distance_km: Kilometers,
    pub speed_kmph: Kmph,
}

impl Link {
    /// Build a link whose distance is the great-circle distance between its ends.
    pub fn new(link_id: impl Into<LinkId>, start: CellIndex, end: CellIndex, speed_kmph: Kmph) -> Self {
        Self {
            link_id: link_id.into(),
            start,
            end,
            distance_km: distance_km_between_cells(start, end),
            speed_kmph,
        }
    }

    pub fn travel_time_seconds(&self) -> f64 {
        travel_time_seconds(self.distance_km, self.speed_kmph)
    }

    fn with_start(&self, start: CellIndex) -> Self {
        Link::new(self.link_id.clone(), start, self.end, self.speed_kmph)
    }

    fn with_end(&self, end: CellIndex) -> Self {
        Link::new(self.link_id.clone(), self.start, end, self.speed_kmph)
    }
}

pub type Route = Vec<Link>;

pub fn empty_route() -> Route {
    Route::new()
}

pub fn route_distance_km(route: &[Link]) -> Kilometers {
    route.iter().map(|l| l.distance_km).sum()
}

pub fn route_travel_time_seconds(route: &[Link]) -> f64 {
    route.iter().map(Link::travel_time_seconds).sum()
}

/// True when the route starts at `src` and, if given, ends at `dst`. Empty routes only
/// correspond when `src` and `dst` share a cell.
pub fn route_cooresponds_with_entities(
    route: &[Link],
    src: &EntityPosition,
    dst: Option<&EntityPosition>,
) -> bool {
    match (route.first(), route.last()) {
        (Some(first), Some(last)) => {
            let src_ok = first.start == src.geoid;
            let dst_ok = dst.map_or(true, |d| last.end == d.geoid);
            src_ok && dst_ok
        }
        _ => dst.map_or(true, |d| d.geoid == src.geoid),
    }
}

/// Result of walking a route for a bounded amount of time.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RouteTraversal {
    pub remaining_time_seconds: f64,
    pub traversal_distance_km: Kilometers,
    pub experienced_route: Route,
    pub remaining_route: Route,
}

impl RouteTraversal {
    pub fn no_time_left(&self) -> bool {
        self.remaining_time_seconds <= 0.0
    }
}

/// Split a link at the point reached after `available_time_seconds`.
fn traverse_up_to(link: &Link, available_time_seconds: f64) -> SimResult<(Link, Option<Link>, f64)> {
    if link.start == link.end {
        return Err(SimError::state(format!(
            "link {} has matching start and end cells",
            link.link_id
        )));
    }
    let tt = link.travel_time_seconds();
    if tt <= available_time_seconds {
        return Ok((link.clone(), None, available_time_seconds - tt));
    }
    let experienced_km = available_time_seconds * SECONDS_TO_HOURS * link.speed_kmph;
    let ratio = if link.distance_km > 0.0 {
        experienced_km / link.distance_km
    } else {
        1.0
    };
    let mid = point_along_line(link.start, link.end, ratio);
    if mid == link.end {
        return Ok((link.clone(), None, 0.0));
    }
    if mid == link.start {
        return Ok((link.with_end(link.start), Some(link.clone()), 0.0));
    }
    Ok((link.with_end(mid), Some(link.with_start(mid)), 0.0))
}

/// Walk `route` for `duration_seconds`.
///
/// Returns `Ok(None)` when there is nothing to traverse (the route is empty, or begins and ends
/// in the same cell).
pub fn traverse(route: &[Link], duration_seconds: f64) -> SimResult<Option<RouteTraversal>> {
    let (Some(first), Some(last)) = (route.first(), route.last()) else {
        return Ok(None);
    };
    if first.start == last.end {
        return Ok(None);
    }

    let mut acc = RouteTraversal {
        remaining_time_seconds: duration_seconds,
        ..RouteTraversal::default()
    };
    for link in route {
        if acc.no_time_left() {
            acc.remaining_route.push(link.clone());
            continue;
        }
        if link.start == link.end {
            // zero-length links are consumed for free
            continue;
        }
        let (experienced, remaining, time_left) = traverse_up_to(link, acc.remaining_time_seconds)?;
        if experienced.start != experienced.end {
            acc.traversal_distance_km += experienced.distance_km;
            acc.experienced_route.push(experienced);
        }
        if let Some(rest) = remaining {
            acc.remaining_route.push(rest);
        }
        acc.remaining_time_seconds = time_left;
    }
    Ok(Some(acc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{test_cell, test_cell_offset};

    /// Three ~1km links heading north at 1 km/h.
    fn three_link_route() -> Route {
        let a = test_cell();
        let b = test_cell_offset(0.008994, 0.0);
        let c = test_cell_offset(0.017998, 0.0);
        let d = test_cell_offset(0.026992, 0.0);
        vec![
            Link::new("1", a, b, 1.0),
            Link::new("2", b, c, 1.0),
            Link::new("3", c, d, 1.0),
        ]
    }

    #[test]
    fn empty_route_has_nothing_to_traverse() {
        let result = traverse(&[], 60.0).expect("no error");
        assert!(result.is_none());
    }

    #[test]
    fn traversal_splits_mid_link() {
        let route = three_link_route();
        let total = route_distance_km(&route);
        // 1.5 hours at 1 km/h covers ~1.5 links
        let t = traverse(&route, 5400.0).expect("ok").expect("traversal");
        assert!(t.no_time_left());
        assert_eq!(t.experienced_route.len(), 2);
        assert_eq!(t.remaining_route.len(), 2);
        assert!((t.traversal_distance_km - 1.5).abs() < 0.01, "{}", t.traversal_distance_km);
        let rest = route_distance_km(&t.remaining_route);
        assert!((t.traversal_distance_km + rest - total).abs() < 0.01);
        assert_eq!(t.experienced_route[1].end, t.remaining_route[0].start);
    }

    #[test]
    fn traversal_with_spare_time_consumes_whole_route() {
        let route = three_link_route();
        let t = traverse(&route, 100_000.0).expect("ok").expect("traversal");
        assert!(t.remaining_route.is_empty());
        assert_eq!(t.experienced_route.len(), 3);
        assert!(t.remaining_time_seconds > 0.0);
    }

    #[test]
    fn correspondence_checks_both_ends() {
        let route = three_link_route();
        let src = EntityPosition::new("s", route[0].start);
        let dst = EntityPosition::new("d", route[2].end);
        let wrong = EntityPosition::new("w", route[1].end);
        assert!(route_cooresponds_with_entities(&route, &src, Some(&dst)));
        assert!(route_cooresponds_with_entities(&route, &src, None));
        assert!(!route_cooresponds_with_entities(&route, &wrong, Some(&dst)));
        assert!(route_cooresponds_with_entities(&[], &src, Some(&src)));
        assert!(!route_cooresponds_with_entities(&[], &src, Some(&dst)));
    }
}
