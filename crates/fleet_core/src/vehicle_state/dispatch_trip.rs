use serde::Serialize;
use tracing::warn;

use crate::environment::Environment;
use crate::error::{SimError, SimResult};
use crate::road_network::route::route_cooresponds_with_entities;
use crate::road_network::Route;
use crate::simulation_state::SimulationState;
use crate::units::{RequestId, VehicleId};
use crate::vehicle_state::ops;
use crate::vehicle_state::{
    UNASSIGNED_INSTANCE_ID, Idle, ServicingPoolingTrip, ServicingTrip, TripPhase, TripStop, VehicleState,
    VehicleStateKind, VehicleStateOps,
};

/// Driving empty to a request's origin. The request is marked as dispatched to this vehicle
/// for as long as the state lasts.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DispatchTrip {
    pub vehicle_id: VehicleId,
    pub instance_id: u64,
    pub request_id: RequestId,
    pub route: Route,
}

impl DispatchTrip {
    pub fn build(vehicle_id: impl Into<VehicleId>, request_id: impl Into<RequestId>, route: Route) -> Self {
        Self {
            vehicle_id: vehicle_id.into(),
            instance_id: UNASSIGNED_INSTANCE_ID,
            request_id: request_id.into(),
            route,
        }
    }
}

impl VehicleStateOps for DispatchTrip {
    const KIND: VehicleStateKind = VehicleStateKind::DispatchTrip;

    fn vehicle_id(&self) -> &str {
        &self.vehicle_id
    }

    fn instance_id(&self) -> u64 {
        self.instance_id
    }

    fn enter(&self, sim: &SimulationState, _env: &Environment) -> SimResult<Option<SimulationState>> {
        let vehicle = ops::get_vehicle(sim, &self.vehicle_id)?;
        let Some(request) = sim.request(&self.request_id) else {
            return Ok(None);
        };
        if !request.membership.grant_access_to_membership(&vehicle.membership) {
            return Err(SimError::state(format!(
                "vehicle {} cannot serve request {} with membership {}",
                self.vehicle_id, self.request_id, request.membership
            )));
        }
        if !route_cooresponds_with_entities(&self.route, &vehicle.position, Some(&request.origin_position)) {
            return Ok(None);
        }
        let assigned = request.assign_dispatched_vehicle(&self.vehicle_id, sim.sim_time);
        let updated = sim.modify_request(assigned)?;
        ops::apply_new_vehicle_state(&updated, self.clone().into()).map(Some)
    }

    fn exit(
        &self,
        _next: &VehicleState,
        sim: &SimulationState,
        _env: &Environment,
    ) -> SimResult<Option<SimulationState>> {
        match sim.request(&self.request_id) {
            Some(request) if request.dispatched_vehicle.as_deref() == Some(self.vehicle_id.as_str()) => {
                sim.modify_request(request.unassign_dispatched_vehicle()).map(Some)
            }
            _ => Ok(Some(sim.clone())),
        }
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
        let Some(request) = sim.request(&self.request_id) else {
            warn!(
                vehicle_id = %self.vehicle_id,
                request_id = %self.request_id,
                "request gone before pickup, going idle"
            );
            return Ok(Some(Idle::build(self.vehicle_id.clone()).into()));
        };
        if request.origin() != vehicle.geoid() {
            return Err(SimError::state(format!(
                "vehicle {} finished its dispatch at {} but request {} waits at {}",
                self.vehicle_id,
                vehicle.geoid(),
                self.request_id,
                request.origin()
            )));
        }
        let trip_route = sim
            .road_network
            .route(&request.origin_position, &request.destination_position);
        if vehicle.driver_state.allows_pooling() && request.allows_pooling {
            let plan = vec![
                TripStop::new(self.request_id.clone(), TripPhase::Pickup),
                TripStop::new(self.request_id.clone(), TripPhase::Dropoff),
            ];
            let servicing = ServicingPoolingTrip::build(
                self.vehicle_id.clone(),
                plan,
                vec![Route::new(), trip_route],
                im::OrdMap::new(),
                im::OrdMap::new(),
                0,
            );
            return Ok(Some(servicing.into()));
        }
        Ok(Some(
            ServicingTrip::build(self.vehicle_id.clone(), request.clone(), sim.sim_time, trip_route).into(),
        ))
    }

    fn perform_update(&self, sim: &SimulationState, env: &Environment) -> SimResult<Option<SimulationState>> {
        ops::move_vehicle(sim, env, &self.vehicle_id, &self.route, |route| {
            DispatchTrip { route, ..self.clone() }.into()
        })
    }
}
