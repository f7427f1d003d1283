//! Test helpers for common test setup and utilities.
//!
//! Shared fixtures: a standard location in the San Francisco Bay Area, mock energy models,
//! mock entities and a small simulation built on the straight-line road network.

use std::sync::Arc;

use h3o::{CellIndex, LatLng, Resolution};

use crate::config::FleetConfig;
use crate::environment::Environment;
use crate::model::charger::{DCFC, LEVEL_2};
use crate::model::{Base, Bev, Charger, Ice, Mechatronics, Request, RequestRateStructure, Station, Vehicle};
use crate::road_network::{EntityPosition, HaversineRoadNetwork, RoadNetwork};
use crate::simulation_state::SimulationState;
use crate::units::{Ratio, SimTime};

/// Latitude and longitude of the standard test location.
pub const TEST_LAT_LNG: (f64, f64) = (37.7749, -122.4194);

/// Mechatronics id of [`mock_bev`].
pub const MOCK_BEV_ID: &str = "bev";

/// Mechatronics id of [`mock_ice`].
pub const MOCK_ICE_ID: &str = "ice";

/// Resolution every mock position lives at.
pub const TEST_RESOLUTION: Resolution = Resolution::Fifteen;

/// Get the test cell as a `CellIndex`.
///
/// # Panics
///
/// Panics if the test coordinates are invalid (should never happen).
pub fn test_cell() -> CellIndex {
    test_cell_offset(0.0, 0.0)
}

/// A cell offset from the test cell by the given degrees of latitude and longitude.
/// 0.01 degrees of latitude is roughly 1.1 km.
///
/// # Panics
///
/// Panics if the offset leaves the valid coordinate range.
pub fn test_cell_offset(dlat: f64, dlng: f64) -> CellIndex {
    let (lat, lng) = TEST_LAT_LNG;
    LatLng::new(lat + dlat, lng + dlng)
        .expect("test coordinates should be valid")
        .to_cell(TEST_RESOLUTION)
}

/// The position the straight-line network gives a cell.
pub fn mock_position(cell: CellIndex) -> EntityPosition {
    EntityPosition::new(cell.to_string(), cell)
}

/// 50 kWh battery at 225 Wh/mile, tapering above 10 kW.
pub fn mock_bev() -> Bev {
    Bev::new(MOCK_BEV_ID, 50.0, 0.8, 225.0, 50.0, 10.0)
}

/// 15 gallon tank at 30 miles per gallon.
pub fn mock_ice() -> Ice {
    Ice::new(MOCK_ICE_ID, 15.0, 0.2, 30.0)
}

/// Four-seat vehicle at the test cell running on `mechatronics`.
pub fn mock_vehicle_with_mechatronics(id: &str, mechatronics: &dyn Mechatronics, soc: Ratio) -> Vehicle {
    Vehicle::new(
        id,
        mock_position(test_cell()),
        mechatronics.mechatronics_id().clone(),
        mechatronics.initial_energy(soc),
        4,
    )
}

/// Four-seat [`mock_bev`] vehicle at the test cell.
pub fn mock_vehicle_with_soc(id: &str, soc: Ratio) -> Vehicle {
    mock_vehicle_with_mechatronics(id, &mock_bev(), soc)
}

/// Station with `count` DCFC and `count` Level 2 plugs, all open to on-shift drivers.
pub fn mock_station(id: &str, cell: CellIndex, count: usize) -> Station {
    Station::new(id, mock_position(cell))
        .with_chargers(Charger::electric(DCFC, 50.0), count, true)
        .with_chargers(Charger::electric(LEVEL_2, 7.2), count, true)
}

pub fn mock_base(id: &str, cell: CellIndex, stalls: usize) -> Base {
    Base::new(id, mock_position(cell), stalls)
}

/// Non-pooling request valued with the default rate structure.
pub fn mock_request(
    id: &str,
    origin: CellIndex,
    destination: CellIndex,
    departure_time: SimTime,
    passengers: usize,
) -> Request {
    let network = HaversineRoadNetwork::new(TEST_RESOLUTION);
    Request::new(
        id,
        mock_position(origin),
        mock_position(destination),
        departure_time,
        passengers,
        false,
    )
    .assign_value(&RequestRateStructure::default(), &network)
}

/// Default configuration with both mock energy models registered.
pub fn mock_env() -> Environment {
    Environment::new(FleetConfig::default())
        .with_mechatronics(mock_bev())
        .with_mechatronics(mock_ice())
}

/// Empty simulation at time zero with one-minute steps.
///
/// # Panics
///
/// Panics if the default resolutions are inconsistent (should never happen).
pub fn mock_sim() -> SimulationState {
    let network: Arc<dyn RoadNetwork> = Arc::new(HaversineRoadNetwork::new(TEST_RESOLUTION));
    SimulationState::new(network, 0, 60, Resolution::Seven).expect("mock sim should build")
}

/// [`mock_sim`] populated with the given entities.
///
/// # Panics
///
/// Panics if any entity cannot be added, e.g. on duplicate ids.
pub fn mock_sim_with(
    vehicles: Vec<Vehicle>,
    requests: Vec<Request>,
    stations: Vec<Station>,
    bases: Vec<Base>,
) -> SimulationState {
    let mut sim = mock_sim();
    for station in stations {
        sim = sim.add_station(station).expect("add station");
    }
    for base in bases {
        sim = sim.add_base(base).expect("add base");
    }
    for vehicle in vehicles {
        sim = sim.add_vehicle(vehicle).expect("add vehicle");
    }
    for request in requests {
        sim = sim.add_request(request).expect("add request");
    }
    sim
}
