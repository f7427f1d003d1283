use serde::Serialize;
use tracing::warn;

use crate::environment::Environment;
use crate::error::{SimError, SimResult};
use crate::simulation_state::SimulationState;
use crate::units::{ChargerId, SimTime, StationId, VehicleId};
use crate::vehicle_state::ops;
use crate::vehicle_state::{
    UNASSIGNED_INSTANCE_ID, ChargingStation, Idle, VehicleState, VehicleStateKind, VehicleStateOps,
};

/// Waiting at a station for a plug of `charger_id`.
///
/// Queues are FIFO: a vehicle may plug in once its position in the queue is below the number
/// of free plugs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChargeQueueing {
    pub vehicle_id: VehicleId,
    pub instance_id: u64,
    pub station_id: StationId,
    pub charger_id: ChargerId,
    pub enqueue_time: SimTime,
}

impl ChargeQueueing {
    pub fn build(
        vehicle_id: impl Into<VehicleId>,
        station_id: impl Into<StationId>,
        charger_id: impl Into<ChargerId>,
        enqueue_time: SimTime,
    ) -> Self {
        Self {
            vehicle_id: vehicle_id.into(),
            instance_id: UNASSIGNED_INSTANCE_ID,
            station_id: station_id.into(),
            charger_id: charger_id.into(),
            enqueue_time,
        }
    }
}

impl VehicleStateOps for ChargeQueueing {
    const KIND: VehicleStateKind = VehicleStateKind::ChargeQueueing;

    fn vehicle_id(&self) -> &str {
        &self.vehicle_id
    }

    fn instance_id(&self) -> u64 {
        self.instance_id
    }

    fn enter(&self, sim: &SimulationState, _env: &Environment) -> SimResult<Option<SimulationState>> {
        let vehicle = ops::get_vehicle(sim, &self.vehicle_id)?;
        let station = ops::get_station(sim, &self.station_id)?;
        if vehicle.geoid() != station.geoid() {
            return Ok(None);
        }
        if station.has_available_charger(&self.charger_id) {
            return Ok(None);
        }
        if !station.membership.grant_access_to_membership(&vehicle.membership) {
            return Err(SimError::state(format!(
                "vehicle {} and station {} share no membership",
                self.vehicle_id, self.station_id
            )));
        }
        let enqueued = station.enqueue_for_vehicle(&self.charger_id, &self.vehicle_id)?;
        let updated = sim.modify_station(enqueued)?;
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
        match station.dequeue_for_vehicle(&self.charger_id, &self.vehicle_id) {
            Ok(dequeued) => sim.modify_station(dequeued).map(Some),
            Err(e) => {
                warn!(vehicle_id = %self.vehicle_id, "{e}");
                Ok(Some(sim.clone()))
            }
        }
    }

    fn has_reached_terminal_state_condition(&self, sim: &SimulationState, _env: &Environment) -> bool {
        let Some(station) = sim.station(&self.station_id) else {
            return true;
        };
        let Some(cs) = station.state.get(&self.charger_id) else {
            return true;
        };
        cs.enqueued_vehicles
            .index_of(&self.vehicle_id)
            .is_some_and(|position| position < cs.available_chargers)
    }

    fn default_terminal_state(
        &self,
        sim: &SimulationState,
        _env: &Environment,
    ) -> SimResult<Option<VehicleState>> {
        if sim.station(&self.station_id).is_none() {
            warn!(
                vehicle_id = %self.vehicle_id,
                station_id = %self.station_id,
                "queued at a station that no longer exists, going idle"
            );
            return Ok(Some(Idle::build(self.vehicle_id.clone()).into()));
        }
        Ok(Some(
            ChargingStation::build(self.vehicle_id.clone(), self.station_id.clone(), self.charger_id.clone()).into(),
        ))
    }

    fn perform_update(&self, sim: &SimulationState, env: &Environment) -> SimResult<Option<SimulationState>> {
        let vehicle = ops::get_vehicle(sim, &self.vehicle_id)?;
        let idled = ops::idle_vehicle(vehicle, env, sim)?;
        sim.modify_vehicle(idled).map(Some)
    }
}
