use serde::Serialize;
use tracing::debug;

use crate::environment::Environment;
use crate::error::{SimError, SimResult};
use crate::simulation_state::SimulationState;
use crate::units::{BaseId, VehicleId};
use crate::vehicle_state::ops;
use crate::vehicle_state::{UNASSIGNED_INSTANCE_ID, VehicleState, VehicleStateKind, VehicleStateOps};

/// Parked in a stall at a base. Holds the stall until it exits.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReserveBase {
    pub vehicle_id: VehicleId,
    pub instance_id: u64,
    pub base_id: BaseId,
}

impl ReserveBase {
    pub fn build(vehicle_id: impl Into<VehicleId>, base_id: impl Into<BaseId>) -> Self {
        Self {
            vehicle_id: vehicle_id.into(),
            instance_id: UNASSIGNED_INSTANCE_ID,
            base_id: base_id.into(),
        }
    }
}

impl VehicleStateOps for ReserveBase {
    const KIND: VehicleStateKind = VehicleStateKind::ReserveBase;

    fn vehicle_id(&self) -> &str {
        &self.vehicle_id
    }

    fn instance_id(&self) -> u64 {
        self.instance_id
    }

    fn enter(&self, sim: &SimulationState, _env: &Environment) -> SimResult<Option<SimulationState>> {
        let vehicle = ops::get_vehicle(sim, &self.vehicle_id)?;
        let base = ops::get_base(sim, &self.base_id)?;
        if vehicle.geoid() != base.geoid() {
            return Ok(None);
        }
        if !base.membership.grant_access_to_membership(&vehicle.membership) {
            return Err(SimError::state(format!(
                "vehicle {} and base {} share no membership",
                self.vehicle_id, self.base_id
            )));
        }
        let Some(reserved) = base.checkout_stall() else {
            debug!(vehicle_id = %self.vehicle_id, base_id = %self.base_id, "no stall available");
            return Ok(None);
        };
        let updated = sim.modify_base(reserved)?;
        ops::apply_new_vehicle_state(&updated, self.clone().into()).map(Some)
    }

    fn exit(
        &self,
        _next: &VehicleState,
        sim: &SimulationState,
        _env: &Environment,
    ) -> SimResult<Option<SimulationState>> {
        let Some(base) = sim.base(&self.base_id) else {
            return ops::missing_on_exit(sim, &self.vehicle_id, &format!("base {}", self.base_id));
        };
        sim.modify_base(base.return_stall()?).map(Some)
    }

    fn has_reached_terminal_state_condition(&self, _sim: &SimulationState, _env: &Environment) -> bool {
        false
    }

    fn default_terminal_state(
        &self,
        _sim: &SimulationState,
        _env: &Environment,
    ) -> SimResult<Option<VehicleState>> {
        Ok(None)
    }

    fn perform_update(&self, _sim: &SimulationState, _env: &Environment) -> SimResult<Option<SimulationState>> {
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{mock_base, mock_env, mock_sim_with, mock_vehicle_with_soc, test_cell, test_cell_offset};
    use crate::vehicle_state::Idle;

    #[test]
    fn reserving_takes_and_returns_a_stall() {
        let env = mock_env();
        let sim = mock_sim_with(
            vec![mock_vehicle_with_soc("v1", 1.0)],
            vec![],
            vec![],
            vec![mock_base("b1", test_cell(), 1)],
        );
        let state: VehicleState = ReserveBase::build("v1", "b1").into();
        let reserved = state.enter(&sim, &env).expect("enter").expect("entered");
        assert_eq!(reserved.base("b1").expect("base").available_stalls, 0);

        let second = mock_vehicle_with_soc("v2", 1.0);
        let crowded = reserved.add_vehicle(second).expect("add");
        let blocked = ReserveBase::build("v2", "b1").enter(&crowded, &env).expect("enter");
        assert!(blocked.is_none());

        let next: VehicleState = Idle::build("v1").into();
        let released = state.exit(&next, &reserved, &env).expect("exit").expect("exited");
        assert_eq!(released.base("b1").expect("base").available_stalls, 1);
    }

    #[test]
    fn must_be_at_the_base() {
        let env = mock_env();
        let sim = mock_sim_with(
            vec![mock_vehicle_with_soc("v1", 1.0)],
            vec![],
            vec![],
            vec![mock_base("b1", test_cell_offset(0.01, 0.0), 1)],
        );
        assert!(ReserveBase::build("v1", "b1").enter(&sim, &env).expect("enter").is_none());
    }

    #[test]
    fn missing_base_on_exit_is_tolerated() {
        let env = mock_env();
        let sim = mock_sim_with(vec![mock_vehicle_with_soc("v1", 1.0)], vec![], vec![], vec![]);
        let next: VehicleState = Idle::build("v1").into();
        let out = ReserveBase::build("v1", "gone").exit(&next, &sim, &env).expect("exit");
        assert!(out.is_some());
    }
}
