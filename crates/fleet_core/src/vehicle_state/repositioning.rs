use serde::Serialize;

use crate::environment::Environment;
use crate::error::SimResult;
use crate::road_network::route::route_cooresponds_with_entities;
use crate::road_network::Route;
use crate::simulation_state::SimulationState;
use crate::units::VehicleId;
use crate::vehicle_state::ops;
use crate::vehicle_state::{UNASSIGNED_INSTANCE_ID, Idle, VehicleState, VehicleStateKind, VehicleStateOps};

/// Driving empty toward a cell, usually where demand is expected.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Repositioning {
    pub vehicle_id: VehicleId,
    pub instance_id: u64,
    pub route: Route,
}

impl Repositioning {
    pub fn build(vehicle_id: impl Into<VehicleId>, route: Route) -> Self {
        Self {
            vehicle_id: vehicle_id.into(),
            instance_id: UNASSIGNED_INSTANCE_ID,
            route,
        }
    }
}

impl VehicleStateOps for Repositioning {
    const KIND: VehicleStateKind = VehicleStateKind::Repositioning;

    fn vehicle_id(&self) -> &str {
        &self.vehicle_id
    }

    fn instance_id(&self) -> u64 {
        self.instance_id
    }

    fn enter(&self, sim: &SimulationState, _env: &Environment) -> SimResult<Option<SimulationState>> {
        let vehicle = ops::get_vehicle(sim, &self.vehicle_id)?;
        if !route_cooresponds_with_entities(&self.route, &vehicle.position, None) {
            return Ok(None);
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
        _sim: &SimulationState,
        _env: &Environment,
    ) -> SimResult<Option<VehicleState>> {
        Ok(Some(Idle::build(self.vehicle_id.clone()).into()))
    }

    fn perform_update(&self, sim: &SimulationState, env: &Environment) -> SimResult<Option<SimulationState>> {
        ops::move_vehicle(sim, env, &self.vehicle_id, &self.route, |route| {
            Repositioning { route, ..self.clone() }.into()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{mock_env, mock_sim_with, mock_vehicle_with_soc, test_cell_offset};

    #[test]
    fn repositions_until_arrival_then_idles() {
        let env = mock_env();
        let sim = mock_sim_with(vec![mock_vehicle_with_soc("v1", 1.0)], vec![], vec![], vec![]);
        let vehicle = sim.vehicle("v1").expect("vehicle");
        let dest = sim
            .road_network
            .position_from_geoid(test_cell_offset(0.005, 0.0))
            .expect("position");
        let route = sim.road_network.route(&vehicle.position, &dest);
        let state: VehicleState = Repositioning::build("v1", route).into();
        let mut sim = state.enter(&sim, &env).expect("enter").expect("entered");

        for _ in 0..20 {
            let state = sim.vehicle("v1").expect("vehicle").vehicle_state.clone();
            if let Some(next) = state.update(&sim, &env).expect("update") {
                sim = next;
            }
        }
        let v = sim.vehicle("v1").expect("vehicle");
        assert_eq!(v.geoid(), dest.geoid);
        assert_eq!(v.vehicle_state.kind(), VehicleStateKind::Idle);
    }

    #[test]
    fn route_must_start_at_vehicle() {
        let env = mock_env();
        let sim = mock_sim_with(vec![mock_vehicle_with_soc("v1", 1.0)], vec![], vec![], vec![]);
        let elsewhere = sim
            .road_network
            .position_from_geoid(test_cell_offset(0.01, 0.01))
            .expect("position");
        let dest = sim
            .road_network
            .position_from_geoid(test_cell_offset(0.02, 0.01))
            .expect("position");
        let route = sim.road_network.route(&elsewhere, &dest);
        let state = Repositioning::build("v1", route);
        assert!(state.enter(&sim, &env).expect("enter").is_none());
    }
}
