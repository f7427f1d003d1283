#![allow(dead_code)]

use h3o::{CellIndex, LatLng, Resolution};
use fleet_core::test_helpers::{test_cell, TEST_RESOLUTION};

/// Centre of the search cell holding the standard test cell, so small offsets stay in the
/// same search cell.
pub fn search_center_cell() -> CellIndex {
    test_cell()
        .parent(Resolution::Seven)
        .and_then(|parent| parent.center_child(TEST_RESOLUTION))
        .expect("search cell centre")
}

/// A cell offset from `origin` by degrees of latitude and longitude.
pub fn cell_near(origin: CellIndex, dlat: f64, dlng: f64) -> CellIndex {
    let ll = LatLng::from(origin);
    LatLng::new(ll.lat() + dlat, ll.lng() + dlng)
        .expect("valid coordinates")
        .to_cell(TEST_RESOLUTION)
}
