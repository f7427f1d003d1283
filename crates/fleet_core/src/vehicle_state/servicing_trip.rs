use serde::Serialize;

use crate::environment::Environment;
use crate::error::{SimError, SimResult};
use crate::model::Request;
use crate::road_network::route::route_cooresponds_with_entities;
use crate::road_network::Route;
use crate::simulation_state::SimulationState;
use crate::units::{SimTime, VehicleId};
use crate::vehicle_state::ops;
use crate::vehicle_state::{UNASSIGNED_INSTANCE_ID, Idle, VehicleState, VehicleStateKind, VehicleStateOps};

/// Carrying one request's passengers from its origin to its destination.
///
/// Entering picks the passengers up and removes the request from the simulation; the state
/// keeps the boarded copy until dropoff. Dropoff happens only in `perform_update`, on the tick
/// the route runs out.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServicingTrip {
    pub vehicle_id: VehicleId,
    pub instance_id: u64,
    pub request: Request,
    pub departure_time: SimTime,
    pub route: Route,
}

impl ServicingTrip {
    pub fn build(vehicle_id: impl Into<VehicleId>, request: Request, departure_time: SimTime, route: Route) -> Self {
        Self {
            vehicle_id: vehicle_id.into(),
            instance_id: UNASSIGNED_INSTANCE_ID,
            request,
            departure_time,
            route,
        }
    }

    fn drop_off(&self, sim: &SimulationState, env: &Environment) -> SimResult<SimulationState> {
        ops::drop_off_trip(sim, env, &self.vehicle_id, &self.request)
    }
}

impl VehicleStateOps for ServicingTrip {
    const KIND: VehicleStateKind = VehicleStateKind::ServicingTrip;

    fn vehicle_id(&self) -> &str {
        &self.vehicle_id
    }

    fn instance_id(&self) -> u64 {
        self.instance_id
    }

    fn enter(&self, sim: &SimulationState, env: &Environment) -> SimResult<Option<SimulationState>> {
        let vehicle = ops::get_vehicle(sim, &self.vehicle_id)?;
        let Some(request) = sim.request(&self.request.id) else {
            return Ok(None);
        };
        if !route_cooresponds_with_entities(
            &self.route,
            &request.origin_position,
            Some(&request.destination_position),
        ) {
            return Err(SimError::state(format!(
                "route for vehicle {} does not run from origin to destination of request {}",
                self.vehicle_id, request.id
            )));
        }
        if !request.membership.grant_access_to_membership(&vehicle.membership) {
            return Err(SimError::state(format!(
                "vehicle {} cannot serve request {} with membership {}",
                self.vehicle_id, request.id, request.membership
            )));
        }
        if vehicle.geoid() != request.origin() {
            return Ok(None);
        }

        let boarded = ServicingTrip {
            request: ops::board_passengers(request, &self.vehicle_id),
            ..self.clone()
        };
        let picked_up = ops::pick_up_trip(sim, env, &self.vehicle_id, &self.request.id)?;
        // a zero-length trip is dropped off by the perform_update that follows entry
        ops::apply_new_vehicle_state(&picked_up, boarded.into()).map(Some)
    }

    fn exit(
        &self,
        _next: &VehicleState,
        sim: &SimulationState,
        _env: &Environment,
    ) -> SimResult<Option<SimulationState>> {
        if self.route.is_empty() {
            Ok(Some(sim.clone()))
        } else {
            Ok(None)
        }
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
        let moved = ops::move_vehicle(sim, env, &self.vehicle_id, &self.route, |route| {
            ServicingTrip { route, ..self.clone() }.into()
        })?;
        let moved = match moved {
            Some(moved) => moved,
            // nothing left to drive, the passengers are already at their destination
            None => ops::apply_new_vehicle_state(
                sim,
                ServicingTrip {
                    route: Route::new(),
                    ..self.clone()
                }
                .into(),
            )?,
        };
        let arrived = matches!(
            &ops::get_vehicle(&moved, &self.vehicle_id)?.vehicle_state,
            VehicleState::ServicingTrip(s) if s.route.is_empty()
        );
        if arrived {
            self.drop_off(&moved, env).map(Some)
        } else {
            Ok(Some(moved))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reporting::{MemoryHandler, ReportType, Reporter};
    use crate::vehicle_state::DispatchTrip;
    use crate::test_helpers::{mock_env, mock_request, mock_sim_with, mock_vehicle_with_soc, test_cell, test_cell_offset};

    fn trip_sim() -> SimulationState {
        mock_sim_with(
            vec![mock_vehicle_with_soc("v1", 1.0)],
            vec![mock_request("r1", test_cell(), test_cell_offset(0.004, 0.0), 0, 2)],
            vec![],
            vec![],
        )
    }

    fn trip_for(sim: &SimulationState) -> ServicingTrip {
        let request = sim.request("r1").expect("request").clone();
        let route = sim
            .road_network
            .route(&request.origin_position, &request.destination_position);
        ServicingTrip::build("v1", request, sim.sim_time, route)
    }

    #[test]
    fn delivers_passengers_and_files_reports() {
        let env = mock_env().with_reporter(Reporter::new().with_handler(Box::new(MemoryHandler::new([
            ReportType::PickupRequestEvent,
            ReportType::DropoffRequestEvent,
        ]))));
        let sim = trip_sim();
        let state: VehicleState = trip_for(&sim).into();
        let mut sim = state.enter(&sim, &env).expect("enter").expect("entered");
        assert!(sim.request("r1").is_none());

        if let VehicleState::ServicingTrip(s) = &sim.vehicle("v1").expect("vehicle").vehicle_state {
            assert!(s.request.passengers.iter().all(|p| p.vehicle_id.as_deref() == Some("v1")));
        } else {
            panic!("expected ServicingTrip");
        }

        for _ in 0..3 {
            let state = sim.vehicle("v1").expect("vehicle").vehicle_state.clone();
            if let Some(next) = state.update(&sim, &env).expect("update") {
                sim = next;
            }
        }
        assert_eq!(sim.vehicle("v1").expect("vehicle").vehicle_state.kind(), VehicleStateKind::Idle);
        env.reporter.flush(&sim);
        let reports = env.reporter.collected_reports();
        let dropoffs = reports
            .iter()
            .filter(|r| r.report_type() == ReportType::DropoffRequestEvent)
            .count();
        assert_eq!(dropoffs, 1);
    }

    fn count(env: &Environment, sim: &SimulationState, report_type: ReportType) -> usize {
        env.reporter.flush(sim);
        env.reporter
            .collected_reports()
            .iter()
            .filter(|r| r.report_type() == report_type)
            .count()
    }

    #[test]
    fn zero_length_trip_resolves_with_one_pickup_and_one_dropoff() {
        let env = mock_env().with_reporter(Reporter::new().with_handler(Box::new(MemoryHandler::new([
            ReportType::PickupRequestEvent,
            ReportType::DropoffRequestEvent,
        ]))));
        let sim = mock_sim_with(
            vec![mock_vehicle_with_soc("v1", 1.0)],
            vec![mock_request("r1", test_cell(), test_cell(), 0, 1)],
            vec![],
            vec![],
        );
        let dispatch: VehicleState = DispatchTrip::build("v1", "r1", Route::new()).into();
        let mut sim = dispatch.enter(&sim, &env).expect("enter").expect("entered");

        let mut kinds = Vec::new();
        for _ in 0..2 {
            let state = sim.vehicle("v1").expect("vehicle").vehicle_state.clone();
            if let Some(next) = state.update(&sim, &env).expect("update") {
                sim = next;
            }
            kinds.push(sim.vehicle("v1").expect("vehicle").vehicle_state.kind());
        }
        assert_eq!(kinds, vec![VehicleStateKind::ServicingTrip, VehicleStateKind::Idle]);
        assert!(sim.request("r1").is_none());
        assert_eq!(count(&env, &sim, ReportType::PickupRequestEvent), 1);
        assert_eq!(count(&env, &sim, ReportType::DropoffRequestEvent), 1);
    }

    #[test]
    fn refuses_to_exit_mid_trip() {
        let env = mock_env();
        let sim = trip_sim();
        let state: VehicleState = trip_for(&sim).into();
        let sim = state.enter(&sim, &env).expect("enter").expect("entered");
        let current = sim.vehicle("v1").expect("vehicle").vehicle_state.clone();
        let next: VehicleState = Idle::build("v1").into();
        assert!(current.exit(&next, &sim, &env).expect("exit").is_none());
    }

    #[test]
    fn wrong_route_is_an_error() {
        let env = mock_env();
        let sim = trip_sim();
        let mut trip = trip_for(&sim);
        trip.route.clear();
        assert!(trip.enter(&sim, &env).is_err());
    }
}
