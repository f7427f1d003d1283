use serde::Serialize;

use crate::environment::Environment;
use crate::error::SimResult;
use crate::simulation_state::SimulationState;
use crate::units::{Seconds, VehicleId};
use crate::vehicle_state::ops;
use crate::vehicle_state::{UNASSIGNED_INSTANCE_ID, OutOfService, VehicleState, VehicleStateKind, VehicleStateOps};

/// Waiting for instructions. Draws idle energy and counts how long it has waited.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Idle {
    pub vehicle_id: VehicleId,
    pub instance_id: u64,
    pub idle_duration: Seconds,
}

impl Idle {
    pub fn build(vehicle_id: impl Into<VehicleId>) -> Self {
        Self {
            vehicle_id: vehicle_id.into(),
            instance_id: UNASSIGNED_INSTANCE_ID,
            idle_duration: 0,
        }
    }
}

impl VehicleStateOps for Idle {
    const KIND: VehicleStateKind = VehicleStateKind::Idle;

    fn vehicle_id(&self) -> &str {
        &self.vehicle_id
    }

    fn instance_id(&self) -> u64 {
        self.instance_id
    }

    fn enter(&self, sim: &SimulationState, _env: &Environment) -> SimResult<Option<SimulationState>> {
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

    fn has_reached_terminal_state_condition(&self, sim: &SimulationState, env: &Environment) -> bool {
        ops::get_vehicle(sim, &self.vehicle_id)
            .and_then(|v| ops::get_mechatronics(env, v).map(|m| m.is_empty(v)))
            .unwrap_or(false)
    }

    fn default_terminal_state(
        &self,
        _sim: &SimulationState,
        _env: &Environment,
    ) -> SimResult<Option<VehicleState>> {
        Ok(Some(OutOfService::build(self.vehicle_id.clone()).into()))
    }

    fn perform_update(&self, sim: &SimulationState, env: &Environment) -> SimResult<Option<SimulationState>> {
        let vehicle = ops::get_vehicle(sim, &self.vehicle_id)?;
        let idled = ops::idle_vehicle(vehicle, env, sim)?;
        let next = Idle {
            idle_duration: self.idle_duration + sim.sim_timestep_duration_seconds,
            ..self.clone()
        };
        sim.modify_vehicle(idled.modify_vehicle_state(next.into())).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::EnergyType;
    use crate::test_helpers::{mock_env, mock_sim_with, mock_vehicle_with_soc};

    #[test]
    fn idling_draws_energy_and_counts_time() {
        let env = mock_env();
        let sim = mock_sim_with(vec![mock_vehicle_with_soc("v1", 0.5)], vec![], vec![], vec![]);
        let state = sim.vehicle("v1").expect("vehicle").vehicle_state.clone();

        let updated = state.update(&sim, &env).expect("update").expect("changed");
        let v = updated.vehicle("v1").expect("vehicle");
        assert_eq!(v.vehicle_state.idle_duration(), Some(sim.sim_timestep_duration_seconds));
        assert!(
            v.energy_of(EnergyType::Electric)
                < sim.vehicle("v1").expect("vehicle").energy_of(EnergyType::Electric)
        );
    }
}
