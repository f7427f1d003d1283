//! Assigns available vehicles to waiting requests, one fleet at a time.

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::config::DispatcherConfig;
use crate::dispatcher::assignment::{find_assignment, h3_distance_cost};
use crate::dispatcher::InstructionGenerator;
use crate::environment::Environment;
use crate::instruction::Instruction;
use crate::model::{Request, Vehicle};
use crate::simulation_state::SimulationState;
use crate::units::{MembershipId, RequestId, VehicleId};
use crate::vehicle_state::VehicleStateKind;

#[derive(Debug, Clone, PartialEq)]
pub struct Dispatcher {
    pub config: DispatcherConfig,
}

impl Dispatcher {
    pub fn new(config: DispatcherConfig) -> Self {
        Self { config }
    }

    fn is_valid_for_dispatch(&self, vehicle: &Vehicle, env: &Environment, fleet_id: Option<&str>) -> bool {
        let kind = vehicle.vehicle_state.kind();
        if !self.config.is_valid_dispatch_state(kind) || !vehicle.driver_state.available() {
            return false;
        }
        if let Some(fleet_id) = fleet_id {
            if !vehicle.membership.grant_access_to_membership_id(fleet_id) {
                return false;
            }
        }
        let Some(mechatronics) = env.mechatronics_for(vehicle) else {
            warn!(vehicle_id = %vehicle.id, mechatronics_id = %vehicle.mechatronics_id, "mechatronics not found");
            return false;
        };
        let range_remaining_km = mechatronics.range_remaining_km(vehicle);
        if kind == VehicleStateKind::ChargingBase
            && range_remaining_km < self.config.base_charging_range_km_threshold
        {
            return false;
        }
        range_remaining_km > self.config.matching_range_km_threshold
    }

    fn is_valid_request(request: &Request, fleet_id: Option<&str>) -> bool {
        request.dispatched_vehicle.is_none()
            && fleet_id.map_or(true, |id| request.membership.grant_access_to_membership_id(id))
    }

    /// One assignment round for a single fleet. Vehicles and requests already matched by an
    /// earlier fleet are left out.
    fn solve_assignment(
        &self,
        sim: &SimulationState,
        env: &Environment,
        fleet_id: Option<&str>,
        matched_vehicles: &mut BTreeSet<VehicleId>,
        matched_requests: &mut BTreeSet<RequestId>,
    ) -> Vec<Instruction> {
        let vehicles: Vec<&Vehicle> = sim
            .vehicles()
            .filter(|v| !matched_vehicles.contains(&v.id))
            .filter(|v| self.is_valid_for_dispatch(v, env, fleet_id))
            .collect();
        let mut requests: Vec<&Request> = sim
            .requests()
            .filter(|r| !matched_requests.contains(&r.id))
            .filter(|r| Self::is_valid_request(r, fleet_id))
            .collect();
        // most valuable first, stable on id
        requests.sort_by(|a, b| b.value.total_cmp(&a.value));

        let solution = find_assignment(&vehicles, &requests, |v, r| {
            h3_distance_cost(v.geoid(), r.origin())
        });
        debug!(
            fleet_id = fleet_id.unwrap_or("*"),
            vehicles = vehicles.len(),
            requests = requests.len(),
            assigned = solution.pairs.len(),
            "dispatch assignment"
        );

        solution
            .pairs
            .into_iter()
            .map(|(vi, ri)| {
                let (vehicle, request) = (vehicles[vi], requests[ri]);
                matched_vehicles.insert(vehicle.id.clone());
                matched_requests.insert(request.id.clone());
                Instruction::dispatch_trip(vehicle.id.clone(), request.id.clone())
            })
            .collect()
    }
}

impl InstructionGenerator for Dispatcher {
    fn name(&self) -> &str {
        "dispatcher"
    }

    fn generate_instructions(
        self: Arc<Self>,
        sim: &SimulationState,
        env: &Environment,
    ) -> (Arc<dyn InstructionGenerator>, Vec<Instruction>) {
        let fleets: Vec<Option<&MembershipId>> = if env.fleet_ids.is_empty() {
            vec![None]
        } else {
            env.fleet_ids.iter().map(Some).collect()
        };
        let mut matched_vehicles = BTreeSet::new();
        let mut matched_requests = BTreeSet::new();
        let instructions = fleets
            .into_iter()
            .flat_map(|fleet_id| {
                self.solve_assignment(
                    sim,
                    env,
                    fleet_id.map(String::as_str),
                    &mut matched_vehicles,
                    &mut matched_requests,
                )
            })
            .collect();
        (self, instructions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Membership;
    use crate::test_helpers::{
        mock_env, mock_position, mock_request, mock_sim_with, mock_vehicle_with_soc, test_cell_offset,
    };

    fn dispatch(sim: &SimulationState, env: &Environment) -> Vec<Instruction> {
        Arc::new(Dispatcher::new(env.config.dispatcher.clone()))
            .generate_instructions(sim, env)
            .1
    }

    #[test]
    fn nearest_vehicle_gets_the_request() {
        let env = mock_env();
        let near = mock_vehicle_with_soc("near", 1.0);
        let mut far = mock_vehicle_with_soc("far", 1.0);
        far.position = mock_position(test_cell_offset(0.05, 0.0));
        let request = mock_request("r1", test_cell_offset(0.001, 0.0), test_cell_offset(0.01, 0.0), 0, 1);
        let sim = mock_sim_with(vec![near, far], vec![request], vec![], vec![]);

        assert_eq!(dispatch(&sim, &env), vec![Instruction::dispatch_trip("near", "r1")]);
    }

    #[test]
    fn skips_low_range_and_dispatched() {
        let env = mock_env();
        let low = mock_vehicle_with_soc("low", 0.05);
        let request = mock_request("r1", test_cell_offset(0.001, 0.0), test_cell_offset(0.01, 0.0), 0, 1);
        let sim = mock_sim_with(vec![low], vec![request.clone()], vec![], vec![]);
        assert!(dispatch(&sim, &env).is_empty());

        let taken = request.assign_dispatched_vehicle("other", 0);
        let sim = mock_sim_with(vec![mock_vehicle_with_soc("v1", 1.0)], vec![taken], vec![], vec![]);
        assert!(dispatch(&sim, &env).is_empty());
    }

    #[test]
    fn fleets_only_serve_their_members() {
        let env = mock_env().with_fleet_id("red").with_fleet_id("blue");
        let red = mock_vehicle_with_soc("red_car", 1.0).with_membership(Membership::single("red").expect("m"));
        let blue_request = mock_request("r1", test_cell_offset(0.001, 0.0), test_cell_offset(0.01, 0.0), 0, 1)
            .with_membership(Membership::single("blue").expect("m"));
        let sim = mock_sim_with(vec![red], vec![blue_request], vec![], vec![]);
        assert!(dispatch(&sim, &env).is_empty());
    }
}
