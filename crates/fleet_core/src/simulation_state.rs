//! The simulation snapshot.
//!
//! [`SimulationState`] holds every vehicle, request, station and base plus their spatial indices.
//! It is a persistent value: every `add_*`, `modify_*` and `remove_*` returns a new snapshot that
//! shares structure with the old one, and the old one stays valid. Entity tables are ordered by
//! id so every scan over them is deterministic.

use std::sync::Arc;

use h3o::{CellIndex, Resolution};

use crate::error::{SimError, SimResult};
use crate::instruction::Instruction;
use crate::model::{Base, Request, Station, Vehicle};
use crate::road_network::RoadNetwork;
use crate::spatial::CellIndexMap;
use crate::units::{Kilometers, SimTime, Seconds, VehicleId};
use crate::vehicle_state::UNASSIGNED_INSTANCE_ID;

pub mod entity_index;

pub use entity_index::{EntityIndex, Located};

/// Ids of every entity sharing one cell.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AtLocation<'a> {
    pub vehicles: Vec<&'a str>,
    pub requests: Vec<&'a str>,
    pub stations: Vec<&'a str>,
    pub bases: Vec<&'a str>,
}

#[derive(Debug, Clone)]
pub struct SimulationState {
    pub road_network: Arc<dyn RoadNetwork>,
    pub sim_time: SimTime,
    pub sim_timestep_duration_seconds: Seconds,
    pub sim_h3_location_resolution: Resolution,
    pub sim_h3_search_resolution: Resolution,
    vehicles: EntityIndex<Vehicle>,
    requests: EntityIndex<Request>,
    stations: EntityIndex<Station>,
    bases: EntityIndex<Base>,
    /// Instructions applied during the most recent step, by vehicle.
    pub applied_instructions: im::OrdMap<VehicleId, Instruction>,
    /// Next vehicle state instance id to hand out.
    next_instance_id: u64,
}

impl SimulationState {
    /// Empty snapshot. Locations are stored at the road network's resolution; the search
    /// resolution must be coarser.
    pub fn new(
        road_network: Arc<dyn RoadNetwork>,
        start_time: SimTime,
        sim_timestep_duration_seconds: Seconds,
        sim_h3_search_resolution: Resolution,
    ) -> SimResult<Self> {
        let sim_h3_location_resolution = road_network.sim_h3_resolution();
        if sim_h3_search_resolution >= sim_h3_location_resolution {
            return Err(SimError::state(format!(
                "search resolution {sim_h3_search_resolution} must be coarser than location resolution {sim_h3_location_resolution}"
            )));
        }
        Ok(Self {
            road_network,
            sim_time: start_time,
            sim_timestep_duration_seconds,
            sim_h3_location_resolution,
            sim_h3_search_resolution,
            vehicles: EntityIndex::new(sim_h3_search_resolution),
            requests: EntityIndex::new(sim_h3_search_resolution),
            stations: EntityIndex::new(sim_h3_search_resolution),
            bases: EntityIndex::new(sim_h3_search_resolution),
            applied_instructions: im::OrdMap::new(),
            next_instance_id: UNASSIGNED_INSTANCE_ID + 1,
        })
    }

    fn check_resolution(&self, kind: &str, id: &str, cell: CellIndex) -> SimResult<()> {
        if cell.resolution() != self.sim_h3_location_resolution {
            return Err(SimError::state(format!(
                "{kind} {id} is at resolution {}, simulation locations use {}",
                cell.resolution(),
                self.sim_h3_location_resolution
            )));
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Lookups
    // ------------------------------------------------------------------

    pub fn vehicle(&self, id: &str) -> Option<&Vehicle> {
        self.vehicles.get(id)
    }

    pub fn request(&self, id: &str) -> Option<&Request> {
        self.requests.get(id)
    }

    pub fn station(&self, id: &str) -> Option<&Station> {
        self.stations.get(id)
    }

    pub fn base(&self, id: &str) -> Option<&Base> {
        self.bases.get(id)
    }

    /// Vehicles in ascending id order.
    pub fn vehicles(&self) -> impl Iterator<Item = &Vehicle> {
        self.vehicles.values()
    }

    pub fn requests(&self) -> impl Iterator<Item = &Request> {
        self.requests.values()
    }

    pub fn stations(&self) -> impl Iterator<Item = &Station> {
        self.stations.values()
    }

    pub fn bases(&self) -> impl Iterator<Item = &Base> {
        self.bases.values()
    }

    pub fn vehicle_count(&self) -> usize {
        self.vehicles.len()
    }

    pub fn request_count(&self) -> usize {
        self.requests.len()
    }

    pub fn vehicle_search_index(&self) -> &CellIndexMap {
        self.vehicles.search_index()
    }

    pub fn request_search_index(&self) -> &CellIndexMap {
        self.requests.search_index()
    }

    pub fn station_search_index(&self) -> &CellIndexMap {
        self.stations.search_index()
    }

    pub fn base_search_index(&self) -> &CellIndexMap {
        self.bases.search_index()
    }

    /// Everything located exactly at `geoid`.
    pub fn at_geoid(&self, geoid: CellIndex) -> AtLocation<'_> {
        AtLocation {
            vehicles: self.vehicles.at(geoid),
            requests: self.requests.at(geoid),
            stations: self.stations.at(geoid),
            bases: self.bases.at(geoid),
        }
    }

    /// Road network distance between two cells, `None` if either is off the network.
    pub fn distance_km_between(&self, origin: CellIndex, destination: CellIndex) -> Option<Kilometers> {
        let o = self.road_network.position_from_geoid(origin)?;
        let d = self.road_network.position_from_geoid(destination)?;
        Some(self.road_network.distance_by_position_km(&o, &d))
    }

    /// True when every entity table agrees with its indices.
    pub fn indices_are_consistent(&self) -> bool {
        self.vehicles.is_consistent()
            && self.requests.is_consistent()
            && self.stations.is_consistent()
            && self.bases.is_consistent()
    }

    // ------------------------------------------------------------------
    // Updates
    // ------------------------------------------------------------------

    /// Give a newly installed vehicle state its instance id. States keep their id across
    /// updates of the same occupation.
    fn assign_instance_id(&self, vehicle: Vehicle) -> (Vehicle, u64) {
        if vehicle.vehicle_state.instance_id() != UNASSIGNED_INSTANCE_ID {
            return (vehicle, self.next_instance_id);
        }
        let state = vehicle.vehicle_state.clone().with_instance_id(self.next_instance_id);
        (vehicle.modify_vehicle_state(state), self.next_instance_id + 1)
    }

    pub fn add_vehicle(&self, vehicle: Vehicle) -> SimResult<Self> {
        self.check_resolution("vehicle", &vehicle.id, vehicle.geoid())?;
        let (vehicle, next_instance_id) = self.assign_instance_id(vehicle);
        Ok(Self {
            vehicles: self.vehicles.insert(vehicle)?,
            next_instance_id,
            ..self.clone()
        })
    }

    pub fn modify_vehicle(&self, vehicle: Vehicle) -> SimResult<Self> {
        self.check_resolution("vehicle", &vehicle.id, vehicle.geoid())?;
        let (vehicle, next_instance_id) = self.assign_instance_id(vehicle);
        Ok(Self {
            vehicles: self.vehicles.update(vehicle)?,
            next_instance_id,
            ..self.clone()
        })
    }

    pub fn remove_vehicle(&self, vehicle_id: &str) -> SimResult<Self> {
        Ok(Self {
            vehicles: self.vehicles.remove(vehicle_id)?,
            ..self.clone()
        })
    }

    pub fn add_request(&self, request: Request) -> SimResult<Self> {
        self.check_resolution("request", &request.id, request.origin())?;
        self.check_resolution("request", &request.id, request.destination())?;
        Ok(Self {
            requests: self.requests.insert(request)?,
            ..self.clone()
        })
    }

    pub fn modify_request(&self, request: Request) -> SimResult<Self> {
        Ok(Self {
            requests: self.requests.update(request)?,
            ..self.clone()
        })
    }

    pub fn remove_request(&self, request_id: &str) -> SimResult<Self> {
        Ok(Self {
            requests: self.requests.remove(request_id)?,
            ..self.clone()
        })
    }

    pub fn add_station(&self, station: Station) -> SimResult<Self> {
        self.check_resolution("station", &station.id, station.geoid())?;
        Ok(Self {
            stations: self.stations.insert(station)?,
            ..self.clone()
        })
    }

    pub fn modify_station(&self, station: Station) -> SimResult<Self> {
        Ok(Self {
            stations: self.stations.update(station)?,
            ..self.clone()
        })
    }

    pub fn remove_station(&self, station_id: &str) -> SimResult<Self> {
        Ok(Self {
            stations: self.stations.remove(station_id)?,
            ..self.clone()
        })
    }

    pub fn add_base(&self, base: Base) -> SimResult<Self> {
        self.check_resolution("base", &base.id, base.geoid())?;
        Ok(Self {
            bases: self.bases.insert(base)?,
            ..self.clone()
        })
    }

    pub fn modify_base(&self, base: Base) -> SimResult<Self> {
        Ok(Self {
            bases: self.bases.update(base)?,
            ..self.clone()
        })
    }

    pub fn remove_base(&self, base_id: &str) -> SimResult<Self> {
        Ok(Self {
            bases: self.bases.remove(base_id)?,
            ..self.clone()
        })
    }

    /// Advance the clock one timestep.
    pub fn tick(&self) -> Self {
        Self {
            sim_time: self.sim_time + self.sim_timestep_duration_seconds,
            ..self.clone()
        }
    }

    pub fn set_applied_instructions(&self, applied: im::OrdMap<VehicleId, Instruction>) -> Self {
        Self {
            applied_instructions: applied,
            ..self.clone()
        }
    }
}
