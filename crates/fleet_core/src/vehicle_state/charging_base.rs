use serde::Serialize;
use tracing::warn;

use crate::environment::Environment;
use crate::error::{SimError, SimResult};
use crate::simulation_state::SimulationState;
use crate::units::{BaseId, ChargerId, VehicleId};
use crate::vehicle_state::ops;
use crate::vehicle_state::{UNASSIGNED_INSTANCE_ID, ReserveBase, VehicleState, VehicleStateKind, VehicleStateOps};

/// Parked at a base and plugged into the base's station. Holds a stall and a plug.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChargingBase {
    pub vehicle_id: VehicleId,
    pub instance_id: u64,
    pub base_id: BaseId,
    pub charger_id: ChargerId,
}

impl ChargingBase {
    pub fn build(vehicle_id: impl Into<VehicleId>, base_id: impl Into<BaseId>, charger_id: impl Into<ChargerId>) -> Self {
        Self {
            vehicle_id: vehicle_id.into(),
            instance_id: UNASSIGNED_INSTANCE_ID,
            base_id: base_id.into(),
            charger_id: charger_id.into(),
        }
    }

    fn station_id<'a>(&self, sim: &'a SimulationState) -> SimResult<&'a str> {
        let base = ops::get_base(sim, &self.base_id)?;
        base.station_id
            .as_deref()
            .ok_or_else(|| SimError::state(format!("base {} has no station", self.base_id)))
    }
}

impl VehicleStateOps for ChargingBase {
    const KIND: VehicleStateKind = VehicleStateKind::ChargingBase;

    fn vehicle_id(&self) -> &str {
        &self.vehicle_id
    }

    fn instance_id(&self) -> u64 {
        self.instance_id
    }

    fn enter(&self, sim: &SimulationState, env: &Environment) -> SimResult<Option<SimulationState>> {
        let vehicle = ops::get_vehicle(sim, &self.vehicle_id)?;
        let base = ops::get_base(sim, &self.base_id)?;
        if vehicle.geoid() != base.geoid() {
            return Ok(None);
        }
        let station = ops::get_station(sim, self.station_id(sim)?)?;
        if !base.membership.grant_access_to_membership(&vehicle.membership) {
            return Err(SimError::state(format!(
                "vehicle {} and base {} share no membership",
                self.vehicle_id, self.base_id
            )));
        }
        let Some(reserved) = base.checkout_stall() else {
            return Ok(None);
        };
        let mechatronics = ops::get_mechatronics(env, vehicle)?;
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
            warn!(
                vehicle_id = %self.vehicle_id,
                base_id = %self.base_id,
                charger_id = %self.charger_id,
                "no charger available at base"
            );
            return Ok(None);
        };
        let updated = sim.modify_base(reserved)?.modify_station(plugged_in)?;
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
        let mut updated = sim.modify_base(base.return_stall()?)?;
        match base.station_id.as_deref().and_then(|id| updated.station(id)) {
            Some(station) => {
                let unplugged = station.return_charger(&self.charger_id)?;
                updated = updated.modify_station(unplugged)?;
            }
            None => warn!(
                vehicle_id = %self.vehicle_id,
                base_id = %self.base_id,
                "base station no longer exists on exit, continuing"
            ),
        }
        Ok(Some(updated))
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
        Ok(Some(ReserveBase::build(self.vehicle_id.clone(), self.base_id.clone()).into()))
    }

    fn perform_update(&self, sim: &SimulationState, env: &Environment) -> SimResult<Option<SimulationState>> {
        let station_id = self.station_id(sim)?;
        ops::charge(sim, env, &self.vehicle_id, station_id, &self.charger_id)
    }
}
