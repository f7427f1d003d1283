use serde::Serialize;

use crate::environment::Environment;
use crate::error::SimResult;
use crate::simulation_state::SimulationState;
use crate::units::VehicleId;
use crate::vehicle_state::ops;
use crate::vehicle_state::{UNASSIGNED_INSTANCE_ID, VehicleState, VehicleStateKind, VehicleStateOps};

/// Parked and inert. Only an explicit instruction moves a vehicle out of service.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutOfService {
    pub vehicle_id: VehicleId,
    pub instance_id: u64,
}

impl OutOfService {
    pub fn build(vehicle_id: impl Into<VehicleId>) -> Self {
        Self {
            vehicle_id: vehicle_id.into(),
            instance_id: UNASSIGNED_INSTANCE_ID,
        }
    }
}

impl VehicleStateOps for OutOfService {
    const KIND: VehicleStateKind = VehicleStateKind::OutOfService;

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
