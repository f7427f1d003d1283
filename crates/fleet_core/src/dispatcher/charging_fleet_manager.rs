//! Sends low-range vehicles to charge.

use std::sync::Arc;

use tracing::warn;

use crate::config::DispatcherConfig;
use crate::dispatcher::charging_search::{
    instruct_vehicles_to_dispatch_to_station, nearest_valid_station_distance, ChargingSearch,
};
use crate::dispatcher::InstructionGenerator;
use crate::environment::Environment;
use crate::instruction::Instruction;
use crate::model::Vehicle;
use crate::reporting::events::refuel_search_event;
use crate::simulation_state::SimulationState;
use crate::vehicle_state::VehicleStateKind;

/// A vehicle is a charge candidate when it is Idle or Repositioning, below the soft range
/// threshold, and the hard threshold plus the distance to its nearest usable station is at least
/// its remaining range.
#[derive(Debug, Clone, PartialEq)]
pub struct ChargingFleetManager {
    pub config: DispatcherConfig,
}

impl ChargingFleetManager {
    pub fn new(config: DispatcherConfig) -> Self {
        Self { config }
    }

    fn search(&self) -> ChargingSearch {
        ChargingSearch::new(
            self.config.charging_search_type,
            self.config.max_search_radius_km,
            self.config.ideal_fastcharge_soc_limit,
        )
    }

    fn is_charge_candidate(&self, vehicle: &Vehicle, sim: &SimulationState, env: &Environment) -> bool {
        if !matches!(
            vehicle.vehicle_state.kind(),
            VehicleStateKind::Idle | VehicleStateKind::Repositioning
        ) {
            return false;
        }
        let Some(mechatronics) = env.mechatronics_for(vehicle) else {
            warn!(vehicle_id = %vehicle.id, mechatronics_id = %vehicle.mechatronics_id, "mechatronics not found");
            return false;
        };
        let range_remaining_km = mechatronics.range_remaining_km(vehicle);
        if range_remaining_km > self.config.charging_range_km_soft_threshold {
            return false;
        }
        let station_distance_km = nearest_valid_station_distance(sim, env, vehicle, vehicle.geoid(), &self.search());
        self.config.charging_range_km_threshold + station_distance_km >= range_remaining_km
    }
}

impl InstructionGenerator for ChargingFleetManager {
    fn name(&self) -> &str {
        "charging_fleet_manager"
    }

    fn generate_instructions(
        self: Arc<Self>,
        sim: &SimulationState,
        env: &Environment,
    ) -> (Arc<dyn InstructionGenerator>, Vec<Instruction>) {
        let candidates: Vec<&Vehicle> = sim
            .vehicles()
            .filter(|v| self.is_charge_candidate(v, sim, env))
            .collect();
        for vehicle in &candidates {
            env.reporter.file_report(refuel_search_event(sim, vehicle));
        }
        let instructions =
            instruct_vehicles_to_dispatch_to_station(candidates.len(), candidates, sim, env, &self.search());
        (self, instructions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{mock_env, mock_sim_with, mock_station, mock_vehicle_with_soc, test_cell_offset};

    fn manage(sim: &SimulationState, env: &Environment) -> Vec<Instruction> {
        Arc::new(ChargingFleetManager::new(env.config.dispatcher.clone()))
            .generate_instructions(sim, env)
            .1
    }

    #[test]
    fn full_vehicles_stay_put() {
        let env = mock_env();
        let sim = mock_sim_with(
            vec![mock_vehicle_with_soc("v1", 1.0)],
            vec![],
            vec![mock_station("s1", test_cell_offset(0.01, 0.0), 1)],
            vec![],
        );
        assert!(manage(&sim, &env).is_empty());
    }

    #[test]
    fn low_vehicles_go_to_a_station() {
        let env = mock_env();
        let sim = mock_sim_with(
            vec![mock_vehicle_with_soc("v1", 0.01)],
            vec![],
            vec![mock_station("s1", test_cell_offset(0.01, 0.0), 1)],
            vec![],
        );
        let instructions = manage(&sim, &env);
        assert_eq!(instructions, vec![Instruction::dispatch_station("v1", "s1", "DCFC")]);
    }
}
