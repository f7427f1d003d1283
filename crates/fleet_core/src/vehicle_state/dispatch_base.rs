use serde::Serialize;

use crate::environment::Environment;
use crate::error::{SimError, SimResult};
use crate::road_network::route::route_cooresponds_with_entities;
use crate::road_network::Route;
use crate::simulation_state::SimulationState;
use crate::units::{BaseId, VehicleId};
use crate::vehicle_state::ops;
use crate::vehicle_state::{UNASSIGNED_INSTANCE_ID, Idle, ReserveBase, VehicleState, VehicleStateKind, VehicleStateOps};

/// Driving to a base to park.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DispatchBase {
    pub vehicle_id: VehicleId,
    pub instance_id: u64,
    pub base_id: BaseId,
    pub route: Route,
}

impl DispatchBase {
    pub fn build(vehicle_id: impl Into<VehicleId>, base_id: impl Into<BaseId>, route: Route) -> Self {
        Self {
            vehicle_id: vehicle_id.into(),
            instance_id: UNASSIGNED_INSTANCE_ID,
            base_id: base_id.into(),
            route,
        }
    }
}

impl VehicleStateOps for DispatchBase {
    const KIND: VehicleStateKind = VehicleStateKind::DispatchBase;

    fn vehicle_id(&self) -> &str {
        &self.vehicle_id
    }

    fn instance_id(&self) -> u64 {
        self.instance_id
    }

    fn enter(&self, sim: &SimulationState, _env: &Environment) -> SimResult<Option<SimulationState>> {
        let vehicle = ops::get_vehicle(sim, &self.vehicle_id)?;
        let base = ops::get_base(sim, &self.base_id)?;
        if !route_cooresponds_with_entities(&self.route, &vehicle.position, Some(&base.position)) {
            return Ok(None);
        }
        if !base.membership.grant_access_to_membership(&vehicle.membership) {
            return Err(SimError::state(format!(
                "vehicle {} and base {} share no membership",
                self.vehicle_id, self.base_id
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
        let base = ops::get_base(sim, &self.base_id)?;
        if vehicle.geoid() != base.geoid() {
            return Err(SimError::state(format!(
                "vehicle {} finished driving to base {} but is at {}, not {}",
                self.vehicle_id,
                self.base_id,
                vehicle.geoid(),
                base.geoid()
            )));
        }
        if base.has_available_stall(&vehicle.membership) {
            Ok(Some(ReserveBase::build(self.vehicle_id.clone(), self.base_id.clone()).into()))
        } else {
            Ok(Some(Idle::build(self.vehicle_id.clone()).into()))
        }
    }

    fn perform_update(&self, sim: &SimulationState, env: &Environment) -> SimResult<Option<SimulationState>> {
        ops::move_vehicle(sim, env, &self.vehicle_id, &self.route, |route| {
            DispatchBase { route, ..self.clone() }.into()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{mock_base, mock_env, mock_sim_with, mock_vehicle_with_soc, test_cell_offset};

    #[test]
    fn parks_on_arrival_when_a_stall_is_free() {
        let env = mock_env();
        let sim = mock_sim_with(
            vec![mock_vehicle_with_soc("v1", 0.8)],
            vec![],
            vec![],
            vec![mock_base("b1", test_cell_offset(0.004, 0.0), 1)],
        );
        let v = sim.vehicle("v1").expect("vehicle");
        let base = sim.base("b1").expect("base");
        let route = sim.road_network.route(&v.position, &base.position);
        let state: VehicleState = DispatchBase::build("v1", "b1", route).into();
        let mut sim = state.enter(&sim, &env).expect("enter").expect("entered");
        for _ in 0..3 {
            let state = sim.vehicle("v1").expect("vehicle").vehicle_state.clone();
            if let Some(next) = state.update(&sim, &env).expect("update") {
                sim = next;
            }
        }
        assert_eq!(
            sim.vehicle("v1").expect("vehicle").vehicle_state.kind(),
            VehicleStateKind::ReserveBase
        );
        assert_eq!(sim.base("b1").expect("base").available_stalls, 0);
    }

    #[test]
    fn full_base_leaves_the_vehicle_idle() {
        let env = mock_env();
        let sim = mock_sim_with(
            vec![mock_vehicle_with_soc("v1", 0.8)],
            vec![],
            vec![],
            vec![mock_base("b1", crate::test_helpers::test_cell(), 0)],
        );
        let state = DispatchBase::build("v1", "b1", Route::new());
        let next = state.default_terminal_state(&sim, &env).expect("next").expect("some");
        assert_eq!(next.kind(), VehicleStateKind::Idle);
    }
}
