use serde::Serialize;
use tracing::debug;

use crate::environment::Environment;
use crate::error::{SimError, SimResult};
use crate::simulation_state::SimulationState;
use crate::units::{ChargerId, StationId, VehicleId};
use crate::vehicle_state::ops;
use crate::vehicle_state::{UNASSIGNED_INSTANCE_ID, Idle, VehicleState, VehicleStateKind, VehicleStateOps};

/// Plugged in at a public station. Holds one plug of `charger_id` until it exits.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChargingStation {
    pub vehicle_id: VehicleId,
    pub instance_id: u64,
    pub station_id: StationId,
    pub charger_id: ChargerId,
}

impl ChargingStation {
    pub fn build(
        vehicle_id: impl Into<VehicleId>,
        station_id: impl Into<StationId>,
        charger_id: impl Into<ChargerId>,
    ) -> Self {
        Self {
            vehicle_id: vehicle_id.into(),
            instance_id: UNASSIGNED_INSTANCE_ID,
            station_id: station_id.into(),
            charger_id: charger_id.into(),
        }
    }
}

impl VehicleStateOps for ChargingStation {
    const KIND: VehicleStateKind = VehicleStateKind::ChargingStation;

    fn vehicle_id(&self) -> &str {
        &self.vehicle_id
    }

    fn instance_id(&self) -> u64 {
        self.instance_id
    }

    fn enter(&self, sim: &SimulationState, env: &Environment) -> SimResult<Option<SimulationState>> {
        let vehicle = ops::get_vehicle(sim, &self.vehicle_id)?;
        let station = ops::get_station(sim, &self.station_id)?;
        let mechatronics = ops::get_mechatronics(env, vehicle)?;
        if vehicle.geoid() != station.geoid() {
            return Ok(None);
        }
        if !station.membership.grant_access_to_membership(&vehicle.membership) {
            return Err(SimError::state(format!(
                "vehicle {} and station {} share no membership",
                self.vehicle_id, self.station_id
            )));
        }
        let charger = env
            .charger(&self.charger_id)
            .ok_or_else(|| SimError::state(format!("charger {} not found", self.charger_id)))?;
        if !mechatronics.valid_charger(charger) {
            return Err(SimError::state(format!(
                "vehicle {} cannot use charger {}",
                self.vehicle_id, self.charger_id
            )));
        }
        let Some(plugged_in) = station.checkout_charger(&self.charger_id)? else {
            debug!(
                vehicle_id = %self.vehicle_id,
                station_id = %self.station_id,
                charger_id = %self.charger_id,
                "no charger available"
            );
            return Ok(None);
        };
        let updated = sim.modify_station(plugged_in)?;
        ops::apply_new_vehicle_state(&updated, self.clone().into()).map(Some)
    }

    fn exit(
        &self,
        _next: &VehicleState,
        sim: &SimulationState,
        _env: &Environment,
    ) -> SimResult<Option<SimulationState>> {
        let Some(station) = sim.station(&self.station_id) else {
            return ops::missing_on_exit(sim, &self.vehicle_id, &format!("station {}", self.station_id));
        };
        sim.modify_station(station.return_charger(&self.charger_id)?).map(Some)
    }

    fn has_reached_terminal_state_condition(&self, sim: &SimulationState, env: &Environment) -> bool {
        ops::get_vehicle(sim, &self.vehicle_id)
            .and_then(|v| ops::get_mechatronics(env, v).map(|m| m.is_full(v)))
            .unwrap_or(false)
    }

    fn default_terminal_state(
        &self,
        _sim: &SimulationState,
        _env: &Environment,
    ) -> SimResult<Option<VehicleState>> {
        Ok(Some(Idle::build(self.vehicle_id.clone()).into()))
    }

    fn perform_update(&self, sim: &SimulationState, env: &Environment) -> SimResult<Option<SimulationState>> {
        ops::charge(sim, env, &self.vehicle_id, &self.station_id, &self.charger_id)
    }
}
