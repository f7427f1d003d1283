//! Pooled trips: one vehicle serving several requests along an ordered plan of pickups and
//! dropoffs.
//!
//! [`DispatchPoolingTrip`] drives to the first stop of the plan. [`ServicingPoolingTrip`] then
//! works through the plan, holding one route per remaining stop. Whenever the route to the next
//! stop is empty the stop is completed on the spot, so several stops at the same cell complete
//! in one tick.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::environment::Environment;
use crate::error::{SimError, SimResult};
use crate::model::Request;
use crate::road_network::route::route_cooresponds_with_entities;
use crate::road_network::{EntityPosition, Route};
use crate::simulation_state::SimulationState;
use crate::units::{RequestId, SimTime, VehicleId};
use crate::vehicle_state::ops;
use crate::vehicle_state::{UNASSIGNED_INSTANCE_ID, Idle, VehicleState, VehicleStateKind, VehicleStateOps};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TripPhase {
    Pickup,
    Dropoff,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TripStop {
    pub request_id: RequestId,
    pub phase: TripPhase,
}

impl TripStop {
    pub fn new(request_id: impl Into<RequestId>, phase: TripPhase) -> Self {
        Self {
            request_id: request_id.into(),
            phase,
        }
    }
}

pub type BoardedRequests = im::OrdMap<RequestId, Request>;

/// Where a stop happens: a pickup at the waiting request's origin, a dropoff at the destination
/// of the boarded (or still waiting) request.
pub(crate) fn stop_position<'a>(
    sim: &'a SimulationState,
    stop: &TripStop,
    boarded: &'a BoardedRequests,
) -> Option<&'a EntityPosition> {
    match stop.phase {
        TripPhase::Pickup => sim.request(&stop.request_id).map(|r| &r.origin_position),
        TripPhase::Dropoff => boarded
            .get(&stop.request_id)
            .or_else(|| sim.request(&stop.request_id))
            .map(|r| &r.destination_position),
    }
}

/// One route per stop: `start` to the first stop, then between consecutive stops.
pub fn create_routes(
    sim: &SimulationState,
    start: &EntityPosition,
    trip_plan: &[TripStop],
    boarded: &BoardedRequests,
) -> SimResult<Vec<Route>> {
    let mut routes = Vec::with_capacity(trip_plan.len());
    let mut from = start.clone();
    for stop in trip_plan {
        let to = stop_position(sim, stop, boarded).ok_or_else(|| {
            SimError::state(format!(
                "cannot locate {:?} stop for request {}",
                stop.phase, stop.request_id
            ))
        })?;
        routes.push(sim.road_network.route(&from, to));
        from = to.clone();
    }
    Ok(routes)
}

/// Request ids in the plan that are not yet on board, in plan order without repeats.
fn unboarded_request_ids<'a>(trip_plan: &'a [TripStop], boarded: &BoardedRequests) -> Vec<&'a RequestId> {
    let mut seen = BTreeSet::new();
    trip_plan
        .iter()
        .map(|s| &s.request_id)
        .filter(|id| !boarded.contains_key(*id) && seen.insert(*id))
        .collect()
}

// ---------------------------------------------------------------------------
// DispatchPoolingTrip
// ---------------------------------------------------------------------------

/// Driving toward the first stop of a pooling plan, possibly with passengers already aboard.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DispatchPoolingTrip {
    pub vehicle_id: VehicleId,
    pub instance_id: u64,
    pub trip_plan: Vec<TripStop>,
    pub route: Route,
    pub boarded_requests: BoardedRequests,
    pub departure_times: im::OrdMap<RequestId, SimTime>,
    pub num_passengers: usize,
}

impl DispatchPoolingTrip {
    pub fn build(
        vehicle_id: impl Into<VehicleId>,
        trip_plan: Vec<TripStop>,
        route: Route,
        boarded_requests: BoardedRequests,
        departure_times: im::OrdMap<RequestId, SimTime>,
        num_passengers: usize,
    ) -> Self {
        Self {
            vehicle_id: vehicle_id.into(),
            instance_id: UNASSIGNED_INSTANCE_ID,
            trip_plan,
            route,
            boarded_requests,
            departure_times,
            num_passengers,
        }
    }
}

impl VehicleStateOps for DispatchPoolingTrip {
    const KIND: VehicleStateKind = VehicleStateKind::DispatchPoolingTrip;

    fn vehicle_id(&self) -> &str {
        &self.vehicle_id
    }

    fn instance_id(&self) -> u64 {
        self.instance_id
    }

    fn enter(&self, sim: &SimulationState, _env: &Environment) -> SimResult<Option<SimulationState>> {
        let Some(first) = self.trip_plan.first() else {
            return Err(SimError::state(format!(
                "vehicle {} cannot dispatch to an empty pooling plan",
                self.vehicle_id
            )));
        };
        let vehicle = ops::get_vehicle(sim, &self.vehicle_id)?;
        let waiting = unboarded_request_ids(&self.trip_plan, &self.boarded_requests);
        for request_id in &waiting {
            let Some(request) = sim.request(request_id) else {
                return Ok(None);
            };
            if !request.membership.grant_access_to_membership(&vehicle.membership) {
                return Err(SimError::state(format!(
                    "vehicle {} cannot serve request {} with membership {}",
                    self.vehicle_id, request.id, request.membership
                )));
            }
        }
        let Some(first_position) = stop_position(sim, first, &self.boarded_requests) else {
            return Ok(None);
        };
        if !route_cooresponds_with_entities(&self.route, &vehicle.position, Some(first_position)) {
            return Ok(None);
        }

        let mut updated = sim.clone();
        for request_id in waiting {
            if let Some(request) = updated.request(request_id) {
                let assigned = request.assign_dispatched_vehicle(&self.vehicle_id, sim.sim_time);
                updated = updated.modify_request(assigned)?;
            }
        }
        ops::apply_new_vehicle_state(&updated, self.clone().into()).map(Some)
    }

    fn exit(
        &self,
        next: &VehicleState,
        sim: &SimulationState,
        _env: &Environment,
    ) -> SimResult<Option<SimulationState>> {
        let pooling_next = matches!(
            next.kind(),
            VehicleStateKind::DispatchPoolingTrip | VehicleStateKind::ServicingPoolingTrip
        );
        if !self.boarded_requests.is_empty() && !pooling_next {
            return Ok(None);
        }
        if next.kind() == VehicleStateKind::ServicingPoolingTrip {
            // waiting requests stay assigned until the servicing leg picks them up
            return Ok(Some(sim.clone()));
        }
        let mut updated = sim.clone();
        for request_id in unboarded_request_ids(&self.trip_plan, &self.boarded_requests) {
            if let Some(request) = updated.request(request_id) {
                if request.dispatched_vehicle.as_deref() == Some(self.vehicle_id.as_str()) {
                    let released = request.unassign_dispatched_vehicle();
                    updated = updated.modify_request(released)?;
                }
            }
        }
        Ok(Some(updated))
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
        let routes = create_routes(sim, &vehicle.position, &self.trip_plan, &self.boarded_requests)?;
        Ok(Some(
            ServicingPoolingTrip::build(
                self.vehicle_id.clone(),
                self.trip_plan.clone(),
                routes,
                self.boarded_requests.clone(),
                self.departure_times.clone(),
                self.num_passengers,
            )
            .into(),
        ))
    }

    fn perform_update(&self, sim: &SimulationState, env: &Environment) -> SimResult<Option<SimulationState>> {
        ops::move_vehicle(sim, env, &self.vehicle_id, &self.route, |route| {
            DispatchPoolingTrip { route, ..self.clone() }.into()
        })
    }
}

// ---------------------------------------------------------------------------
// ServicingPoolingTrip
// ---------------------------------------------------------------------------

/// Working through a pooling plan. `routes[i]` leads to `trip_plan[i]`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServicingPoolingTrip {
    pub vehicle_id: VehicleId,
    pub instance_id: u64,
    pub trip_plan: Vec<TripStop>,
    pub routes: Vec<Route>,
    pub boarded_requests: BoardedRequests,
    pub departure_times: im::OrdMap<RequestId, SimTime>,
    pub num_passengers: usize,
}

impl ServicingPoolingTrip {
    pub fn build(
        vehicle_id: impl Into<VehicleId>,
        trip_plan: Vec<TripStop>,
        routes: Vec<Route>,
        boarded_requests: BoardedRequests,
        departure_times: im::OrdMap<RequestId, SimTime>,
        num_passengers: usize,
    ) -> Self {
        Self {
            vehicle_id: vehicle_id.into(),
            instance_id: UNASSIGNED_INSTANCE_ID,
            trip_plan,
            routes,
            boarded_requests,
            departure_times,
            num_passengers,
        }
    }

    fn with_current_route(&self, route: Route) -> Self {
        let mut routes = self.routes.clone();
        match routes.first_mut() {
            Some(first) => *first = route,
            None => routes.push(route),
        }
        Self {
            routes,
            ..self.clone()
        }
    }

    /// Complete every stop whose route is exhausted, then install the resulting state.
    fn complete_arrived_stops(&self, sim: &SimulationState, env: &Environment) -> SimResult<SimulationState> {
        let mut trip = self.clone();
        let mut sim = sim.clone();
        while trip.routes.first().is_some_and(|r| r.is_empty()) && !trip.trip_plan.is_empty() {
            let stop = trip.trip_plan.remove(0);
            trip.routes.remove(0);
            match stop.phase {
                TripPhase::Pickup => {
                    let Some(request) = sim.request(&stop.request_id) else {
                        warn!(
                            vehicle_id = %trip.vehicle_id,
                            request_id = %stop.request_id,
                            "pooled request gone before pickup, dropping it from the plan"
                        );
                        trip.trip_plan.retain(|s| s.request_id != stop.request_id);
                        let vehicle = ops::get_vehicle(&sim, &trip.vehicle_id)?;
                        trip.routes =
                            create_routes(&sim, &vehicle.position, &trip.trip_plan, &trip.boarded_requests)?;
                        continue;
                    };
                    let vehicle = ops::get_vehicle(&sim, &trip.vehicle_id)?;
                    if vehicle.geoid() != request.origin() {
                        return Err(SimError::state(format!(
                            "vehicle {} at {} cannot pick up request {} waiting at {}",
                            trip.vehicle_id,
                            vehicle.geoid(),
                            request.id,
                            request.origin()
                        )));
                    }
                    let boarded = ops::board_passengers(request, &trip.vehicle_id);
                    sim = ops::pick_up_trip(&sim, env, &trip.vehicle_id, &stop.request_id)?;
                    trip.num_passengers += boarded.passengers.len();
                    trip.departure_times.insert(stop.request_id.clone(), sim.sim_time);
                    trip.boarded_requests.insert(stop.request_id.clone(), boarded);
                }
                TripPhase::Dropoff => {
                    let Some(request) = trip.boarded_requests.remove(&stop.request_id) else {
                        return Err(SimError::state(format!(
                            "vehicle {} cannot drop off request {} which is not on board",
                            trip.vehicle_id, stop.request_id
                        )));
                    };
                    sim = ops::drop_off_trip(&sim, env, &trip.vehicle_id, &request)?;
                    trip.num_passengers = trip.num_passengers.saturating_sub(request.passengers.len());
                    trip.departure_times.remove(&stop.request_id);
                }
            }
        }
        ops::apply_new_vehicle_state(&sim, trip.into())
    }
}

impl VehicleStateOps for ServicingPoolingTrip {
    const KIND: VehicleStateKind = VehicleStateKind::ServicingPoolingTrip;

    fn vehicle_id(&self) -> &str {
        &self.vehicle_id
    }

    fn instance_id(&self) -> u64 {
        self.instance_id
    }

    fn enter(&self, sim: &SimulationState, env: &Environment) -> SimResult<Option<SimulationState>> {
        ops::get_vehicle(sim, &self.vehicle_id)?;
        if self.trip_plan.is_empty() {
            return Err(SimError::state(format!(
                "vehicle {} cannot service an empty pooling plan",
                self.vehicle_id
            )));
        }
        if self.routes.len() != self.trip_plan.len() {
            return Err(SimError::state(format!(
                "vehicle {} pooling plan has {} stops but {} routes",
                self.vehicle_id,
                self.trip_plan.len(),
                self.routes.len()
            )));
        }
        self.complete_arrived_stops(sim, env).map(Some)
    }

    fn exit(
        &self,
        next: &VehicleState,
        sim: &SimulationState,
        _env: &Environment,
    ) -> SimResult<Option<SimulationState>> {
        if self.trip_plan.is_empty() || next.kind() == VehicleStateKind::DispatchPoolingTrip {
            Ok(Some(sim.clone()))
        } else {
            Ok(None)
        }
    }

    fn has_reached_terminal_state_condition(&self, _sim: &SimulationState, _env: &Environment) -> bool {
        self.trip_plan.is_empty()
    }

    fn default_terminal_state(
        &self,
        _sim: &SimulationState,
        _env: &Environment,
    ) -> SimResult<Option<VehicleState>> {
        Ok(Some(Idle::build(self.vehicle_id.clone()).into()))
    }

    fn perform_update(&self, sim: &SimulationState, env: &Environment) -> SimResult<Option<SimulationState>> {
        let current = self.routes.first().cloned().unwrap_or_default();
        let moved = ops::move_vehicle(sim, env, &self.vehicle_id, &current, |route| {
            self.with_current_route(route).into()
        })?;
        let (moved_sim, trip) = match moved {
            Some(moved_sim) => {
                let trip = match &ops::get_vehicle(&moved_sim, &self.vehicle_id)?.vehicle_state {
                    VehicleState::ServicingPoolingTrip(trip) => trip.clone(),
                    _ => return Ok(Some(moved_sim)),
                };
                (moved_sim, trip)
            }
            None => (sim.clone(), self.with_current_route(Route::new())),
        };
        trip.complete_arrived_stops(&moved_sim, env).map(Some)
    }
}
