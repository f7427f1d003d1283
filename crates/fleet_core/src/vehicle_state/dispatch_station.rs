use serde::Serialize;

use crate::environment::Environment;
use crate::error::{SimError, SimResult};
use crate::model::Station;
use crate::road_network::route::route_cooresponds_with_entities;
use crate::road_network::Route;
use crate::simulation_state::SimulationState;
use crate::units::{ChargerId, StationId, VehicleId};
use crate::vehicle_state::ops;
use crate::vehicle_state::{
    UNASSIGNED_INSTANCE_ID, ChargeQueueing, ChargingStation, VehicleState, VehicleStateKind, VehicleStateOps,
};

/// Driving to a station to charge with `charger_id`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DispatchStation {
    pub vehicle_id: VehicleId,
    pub instance_id: u64,
    pub station_id: StationId,
    pub charger_id: ChargerId,
    pub route: Route,
}

impl DispatchStation {
    pub fn build(
        vehicle_id: impl Into<VehicleId>,
        station_id: impl Into<StationId>,
        charger_id: impl Into<ChargerId>,
        route: Route,
    ) -> Self {
        Self {
            vehicle_id: vehicle_id.into(),
            instance_id: UNASSIGNED_INSTANCE_ID,
            station_id: station_id.into(),
            charger_id: charger_id.into(),
            route,
        }
    }

    /// Plug in when a charger is free, queue otherwise.
    fn arrival_state(&self, station: &Station, sim: &SimulationState) -> VehicleState {
        if station.has_available_charger(&self.charger_id) {
            ChargingStation::build(self.vehicle_id.clone(), self.station_id.clone(), self.charger_id.clone()).into()
        } else {
            ChargeQueueing::build(
                self.vehicle_id.clone(),
                self.station_id.clone(),
                self.charger_id.clone(),
                sim.sim_time,
            )
            .into()
        }
    }
}

impl VehicleStateOps for DispatchStation {
    const KIND: VehicleStateKind = VehicleStateKind::DispatchStation;

    fn vehicle_id(&self) -> &str {
        &self.vehicle_id
    }

    fn instance_id(&self) -> u64 {
        self.instance_id
    }

    fn enter(&self, sim: &SimulationState, env: &Environment) -> SimResult<Option<SimulationState>> {
        let vehicle = ops::get_vehicle(sim, &self.vehicle_id)?;
        let station = ops::get_station(sim, &self.station_id)?;
        if vehicle.geoid() == station.geoid() {
            return self.arrival_state(station, sim).enter(sim, env);
        }
        if !route_cooresponds_with_entities(&self.route, &vehicle.position, Some(&station.position)) {
            return Ok(None);
        }
        if !station.membership.grant_access_to_membership(&vehicle.membership) {
            return Err(SimError::state(format!(
                "vehicle {} and station {} share no membership",
                self.vehicle_id, self.station_id
            )));
        }
        ops::apply_new_vehicle_state(sim, self.clone().into()).map(Some)
    }

    fn exit(
        &self,
        _next: &VehicleState,
        sim: &SimulationState,
        _env: &Environment,
    ) -> SimResult<Option<SimulationState>> {
        Ok(Some(sim.clone()))
    }

    fn has_reached_terminal_state_condition(&self, _sim: &SimulationState, _env: &Environment) -> bool {
        self.route.is_empty()
    }

    fn default_terminal_state(
        &self,
        sim: &SimulationState,
        _env: &Environment,
    ) -> SimResult<Option<VehicleState>> {
        let vehicle = ops::get_vehicle(sim, &self.vehicle_id)?;
        let station = ops::get_station(sim, &self.station_id)?;
        if vehicle.geoid() != station.geoid() {
            return Err(SimError::state(format!(
                "vehicle {} finished driving to station {} but is at {}, not {}",
                self.vehicle_id,
                self.station_id,
                vehicle.geoid(),
                station.geoid()
            )));
        }
        Ok(Some(self.arrival_state(station, sim)))
    }

    fn perform_update(&self, sim: &SimulationState, env: &Environment) -> SimResult<Option<SimulationState>> {
        ops::move_vehicle(sim, env, &self.vehicle_id, &self.route, |route| {
            DispatchStation { route, ..self.clone() }.into()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::charger::DCFC;
    use crate::test_helpers::{mock_env, mock_sim_with, mock_station, mock_vehicle_with_soc, test_cell_offset};

    fn drive(mut sim: SimulationState, env: &Environment, ticks: usize) -> SimulationState {
        for _ in 0..ticks {
            for id in ["v1", "v2"] {
                let Some(v) = sim.vehicle(id) else { continue };
                let state = v.vehicle_state.clone();
                if let Some(next) = state.update(&sim, env).expect("update") {
                    sim = next;
                }
            }
        }
        sim
    }

    #[test]
    fn arrival_plugs_in_or_queues() {
        let env = mock_env();
        let sim = mock_sim_with(
            vec![mock_vehicle_with_soc("v1", 0.2), mock_vehicle_with_soc("v2", 0.2)],
            vec![],
            vec![mock_station("s1", test_cell_offset(0.003, 0.0), 1)],
            vec![],
        );
        let station = sim.station("s1").expect("station").position.clone();
        let mut sim = sim;
        for id in ["v1", "v2"] {
            let v = sim.vehicle(id).expect("vehicle");
            let route = sim.road_network.route(&v.position, &station);
            let state: VehicleState = DispatchStation::build(id, "s1", DCFC, route).into();
            sim = state.enter(&sim, &env).expect("enter").expect("entered");
        }
        let sim = drive(sim, &env, 3);
        let kinds: Vec<VehicleStateKind> = ["v1", "v2"]
            .iter()
            .map(|id| sim.vehicle(id).expect("vehicle").vehicle_state.kind())
            .collect();
        assert_eq!(
            kinds,
            vec![VehicleStateKind::ChargingStation, VehicleStateKind::ChargeQueueing]
        );
    }

    #[test]
    fn dispatch_at_the_station_enters_charging_directly() {
        let env = mock_env();
        let sim = mock_sim_with(
            vec![mock_vehicle_with_soc("v1", 0.2)],
            vec![],
            vec![mock_station("s1", crate::test_helpers::test_cell(), 1)],
            vec![],
        );
        let state = DispatchStation::build("v1", "s1", DCFC, Route::new());
        let sim = state.enter(&sim, &env).expect("enter").expect("entered");
        assert_eq!(
            sim.vehicle("v1").expect("vehicle").vehicle_state.kind(),
            VehicleStateKind::ChargingStation
        );
    }
}
