//! Validation of pooling trip plans.
//!
//! A plan may be issued to an idle vehicle or to one already running a pooling plan. In the
//! latter case the passengers on board carry over, and the new plan must still drop every one of
//! them off.

use std::collections::BTreeSet;

use crate::error::{SimError, SimResult};
use crate::model::Vehicle;
use crate::road_network::Route;
use crate::simulation_state::SimulationState;
use crate::units::{RequestId, SimTime};
use crate::vehicle_state::pooling::{stop_position, BoardedRequests};
use crate::vehicle_state::{TripPhase, TripStop, VehicleState};

/// Trip progress carried from the vehicle's current pooling state into the new plan.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PoolingCarryOver {
    pub boarded_requests: BoardedRequests,
    pub departure_times: im::OrdMap<RequestId, SimTime>,
    pub num_passengers: usize,
}

impl PoolingCarryOver {
    pub fn from_vehicle_state(state: &VehicleState) -> Self {
        match state {
            VehicleState::DispatchPoolingTrip(s) => Self {
                boarded_requests: s.boarded_requests.clone(),
                departure_times: s.departure_times.clone(),
                num_passengers: s.num_passengers,
            },
            VehicleState::ServicingPoolingTrip(s) => Self {
                boarded_requests: s.boarded_requests.clone(),
                departure_times: s.departure_times.clone(),
                num_passengers: s.num_passengers,
            },
            _ => Self::default(),
        }
    }
}

/// Every request is picked up at most once, never after its dropoff, never when already aboard,
/// and dropped off exactly once. Walking the plan from `boarded` must end with nobody aboard.
pub fn trip_plan_ordering_is_valid(trip_plan: &[TripStop], boarded: &BTreeSet<RequestId>) -> bool {
    let mut aboard: BTreeSet<&str> = boarded.iter().map(String::as_str).collect();
    let mut picked_up: BTreeSet<&str> = BTreeSet::new();
    let mut dropped_off: BTreeSet<&str> = BTreeSet::new();
    for stop in trip_plan {
        let id = stop.request_id.as_str();
        match stop.phase {
            TripPhase::Pickup => {
                if aboard.contains(id) || dropped_off.contains(id) || !picked_up.insert(id) {
                    return false;
                }
                aboard.insert(id);
            }
            TripPhase::Dropoff => {
                if !aboard.remove(id) {
                    return false;
                }
                dropped_off.insert(id);
            }
        }
    }
    aboard.is_empty()
}

/// Check a plan against the vehicle and the requests in `sim`, returning what carries over.
pub fn validate_trip_plan(
    sim: &SimulationState,
    vehicle: &Vehicle,
    trip_plan: &[TripStop],
) -> SimResult<PoolingCarryOver> {
    if trip_plan.is_empty() {
        return Err(SimError::instruction(format!(
            "pooling plan for vehicle {} is empty",
            vehicle.id
        )));
    }
    if !vehicle.driver_state.allows_pooling() {
        return Err(SimError::instruction(format!(
            "driver of vehicle {} does not allow pooling",
            vehicle.id
        )));
    }

    let carried = PoolingCarryOver::from_vehicle_state(&vehicle.vehicle_state);
    let boarded_ids: BTreeSet<RequestId> = carried.boarded_requests.keys().cloned().collect();

    let dropoffs: BTreeSet<&str> = trip_plan
        .iter()
        .filter(|s| s.phase == TripPhase::Dropoff)
        .map(|s| s.request_id.as_str())
        .collect();
    if let Some(missing) = boarded_ids.iter().find(|id| !dropoffs.contains(id.as_str())) {
        return Err(SimError::instruction(format!(
            "pooling plan for vehicle {} abandons boarded request {missing}",
            vehicle.id
        )));
    }
    if !trip_plan_ordering_is_valid(trip_plan, &boarded_ids) {
        return Err(SimError::instruction(format!(
            "pooling plan for vehicle {} has an invalid pickup and dropoff order",
            vehicle.id
        )));
    }

    let mut seats_used = carried.num_passengers;
    for stop in trip_plan {
        if boarded_ids.contains(&stop.request_id) {
            continue;
        }
        let request = sim.request(&stop.request_id).ok_or_else(|| {
            SimError::instruction(format!(
                "pooling plan for vehicle {} names unknown request {}",
                vehicle.id, stop.request_id
            ))
        })?;
        if !request.allows_pooling {
            return Err(SimError::instruction(format!(
                "request {} does not allow pooling",
                request.id
            )));
        }
        match stop.phase {
            TripPhase::Pickup => {
                seats_used += request.passengers.len();
                if seats_used > vehicle.total_seats {
                    return Err(SimError::instruction(format!(
                        "pooling plan for vehicle {} needs {seats_used} seats but it has {}",
                        vehicle.id, vehicle.total_seats
                    )));
                }
            }
            TripPhase::Dropoff => seats_used = seats_used.saturating_sub(request.passengers.len()),
        }
    }

    Ok(carried)
}

/// Route from the vehicle to the first stop of a validated plan.
pub fn route_to_first_stop(
    sim: &SimulationState,
    vehicle: &Vehicle,
    trip_plan: &[TripStop],
    boarded: &BoardedRequests,
) -> SimResult<Route> {
    let first = trip_plan
        .first()
        .ok_or_else(|| SimError::instruction(format!("pooling plan for vehicle {} is empty", vehicle.id)))?;
    let position = stop_position(sim, first, boarded).ok_or_else(|| {
        SimError::instruction(format!(
            "cannot locate first stop of request {} for vehicle {}",
            first.request_id, vehicle.id
        ))
    })?;
    Ok(sim.road_network.route(&vehicle.position, position))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver_state::DriverState;
    use crate::environment::Environment;
    use crate::instruction::Instruction;
    use crate::model::Request;
    use crate::test_helpers::{mock_env, mock_request, mock_sim_with, mock_vehicle_with_soc, test_cell, test_cell_offset};
    use crate::vehicle_state::VehicleStateKind;

    fn pickup(id: &str) -> TripStop {
        TripStop::new(id, TripPhase::Pickup)
    }

    fn dropoff(id: &str) -> TripStop {
        TripStop::new(id, TripPhase::Dropoff)
    }

    fn poolable(id: &str, passengers: usize) -> Request {
        let mut request = mock_request(id, test_cell_offset(0.003, 0.0), test_cell_offset(0.01, 0.0), 0, passengers);
        request.allows_pooling = true;
        request
    }

    fn setup(requests: Vec<Request>) -> (SimulationState, Environment) {
        (
            mock_sim_with(vec![mock_vehicle_with_soc("v1", 1.0)], requests, vec![], vec![]),
            mock_env(),
        )
    }

    #[test]
    fn ordering_rules() {
        let none = BTreeSet::new();
        assert!(trip_plan_ordering_is_valid(&[pickup("a"), pickup("b"), dropoff("a"), dropoff("b")], &none));
        assert!(!trip_plan_ordering_is_valid(&[dropoff("a"), pickup("a")], &none));
        assert!(!trip_plan_ordering_is_valid(&[pickup("a")], &none));
        assert!(!trip_plan_ordering_is_valid(&[pickup("a"), dropoff("a"), pickup("a"), dropoff("a")], &none));

        let boarded: BTreeSet<RequestId> = ["a".to_string()].into_iter().collect();
        assert!(trip_plan_ordering_is_valid(&[pickup("b"), dropoff("a"), dropoff("b")], &boarded));
        assert!(!trip_plan_ordering_is_valid(&[pickup("a"), dropoff("a")], &boarded));
    }

    #[test]
    fn accepts_a_two_request_plan() {
        let (sim, env) = setup(vec![poolable("a", 1), poolable("b", 2)]);
        let instruction =
            Instruction::dispatch_pooling_trip("v1", vec![pickup("a"), pickup("b"), dropoff("b"), dropoff("a")]);
        let result = instruction.apply(&sim, &env).expect("valid plan");
        assert_eq!(result.next.kind(), VehicleStateKind::DispatchPoolingTrip);
    }

    #[test]
    fn rejects_requests_that_do_not_pool() {
        let (sim, env) = setup(vec![
            poolable("a", 1),
            mock_request("solo", test_cell(), test_cell_offset(0.01, 0.0), 0, 1),
        ]);
        let instruction =
            Instruction::dispatch_pooling_trip("v1", vec![pickup("a"), pickup("solo"), dropoff("a"), dropoff("solo")]);
        assert!(matches!(instruction.apply(&sim, &env), Err(SimError::Instruction(_))));
    }

    #[test]
    fn rejects_plans_over_seat_capacity() {
        let (sim, env) = setup(vec![poolable("a", 3), poolable("b", 2)]);
        let seats = sim.vehicle("v1").expect("vehicle").total_seats;
        assert!(seats < 5);
        let instruction =
            Instruction::dispatch_pooling_trip("v1", vec![pickup("a"), pickup("b"), dropoff("a"), dropoff("b")]);
        assert!(matches!(instruction.apply(&sim, &env), Err(SimError::Instruction(_))));
    }

    #[test]
    fn rejects_drivers_that_do_not_pool() {
        let (sim, env) = setup(vec![poolable("a", 1)]);
        let vehicle = sim.vehicle("v1").expect("vehicle");
        let human = vehicle.modify_driver_state(DriverState::human_unavailable("v1", "day", "b1", false));
        let sim = sim.modify_vehicle(human).expect("modify");
        let instruction = Instruction::dispatch_pooling_trip("v1", vec![pickup("a"), dropoff("a")]);
        assert!(matches!(instruction.apply(&sim, &env), Err(SimError::Instruction(_))));
    }

    #[test]
    fn replans_must_keep_boarded_passengers() {
        let (sim, env) = setup(vec![poolable("a", 1), poolable("b", 1)]);
        let vehicle = sim.vehicle("v1").expect("vehicle");
        let a = sim.request("a").expect("a").clone();
        let mut boarded = BoardedRequests::new();
        boarded.insert("a".to_string(), a);
        let in_progress: VehicleState = crate::vehicle_state::ServicingPoolingTrip::build(
            "v1",
            vec![dropoff("a")],
            vec![Route::new()],
            boarded,
            im::OrdMap::new(),
            1,
        )
        .into();
        let sim = sim
            .modify_vehicle(vehicle.modify_vehicle_state(in_progress))
            .expect("modify");

        let abandons = Instruction::dispatch_pooling_trip("v1", vec![pickup("b"), dropoff("b")]);
        assert!(matches!(abandons.apply(&sim, &env), Err(SimError::Instruction(_))));

        let keeps = Instruction::dispatch_pooling_trip("v1", vec![pickup("b"), dropoff("a"), dropoff("b")]);
        let result = keeps.apply(&sim, &env).expect("replan");
        let VehicleState::DispatchPoolingTrip(next) = result.next else {
            panic!("expected DispatchPoolingTrip");
        };
        assert_eq!(next.num_passengers, 1);
        assert!(next.boarded_requests.contains_key("a"));
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        /// Shuffles of a well-formed plan: each request picked up then dropped off.
        fn plans() -> impl Strategy<Value = Vec<TripStop>> {
            (1..5usize)
                .prop_flat_map(|n| {
                    let stops: Vec<TripStop> = (0..n)
                        .flat_map(|i| {
                            let id = format!("r{i}");
                            [TripStop::new(id.clone(), TripPhase::Pickup), TripStop::new(id, TripPhase::Dropoff)]
                        })
                        .collect();
                    Just(stops).prop_shuffle()
                })
        }

        proptest! {
            #[test]
            fn prop_valid_orderings_never_carry_negative_load(plan in plans()) {
                if trip_plan_ordering_is_valid(&plan, &BTreeSet::new()) {
                    let mut load: i64 = 0;
                    for stop in &plan {
                        load += match stop.phase {
                            TripPhase::Pickup => 1,
                            TripPhase::Dropoff => -1,
                        };
                        prop_assert!(load >= 0);
                    }
                    prop_assert_eq!(load, 0);
                }
            }

            #[test]
            fn prop_pickup_before_dropoff_is_valid(n in 1..5usize) {
                let plan: Vec<TripStop> = (0..n)
                    .map(|i| TripStop::new(format!("r{i}"), TripPhase::Pickup))
                    .chain((0..n).rev().map(|i| TripStop::new(format!("r{i}"), TripPhase::Dropoff)))
                    .collect();
                prop_assert!(trip_plan_ordering_is_valid(&plan, &BTreeSet::new()));
            }
        }
    }
}
