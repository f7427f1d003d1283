//! The per-tick update.
//!
//! An [`Update`] runs its pre-step functions in order (request injection, cancellation, price
//! changes), then one [`StepSimulation`]: driver updates, instruction generation, instruction
//! application, vehicle updates and the clock tick.

use std::fmt;
use std::sync::Arc;

use crate::config::FleetConfig;
use crate::dispatcher::{ChargingFleetManager, Dispatcher, InstructionGenerator};
use crate::environment::Environment;
use crate::model::Request;
use crate::simulation_state::SimulationState;

pub mod cancel_requests;
pub mod charging_price_update;
pub mod step_simulation;
pub mod update_requests;

pub use cancel_requests::CancelRequests;
pub use charging_price_update::{ChargingPriceUpdate, PriceRow, PriceTarget};
pub use step_simulation::StepSimulation;
pub use update_requests::UpdateRequests;

/// A change applied to the simulation before the step, such as new demand.
///
/// Functions with memory (a request stream cursor, pending price rows) advance it in place.
pub trait SimulationUpdateFunction: Send + fmt::Debug {
    fn name(&self) -> &str;

    fn update(&mut self, sim: &SimulationState, env: &Environment) -> SimulationState;
}

#[derive(Debug)]
pub struct Update {
    pub pre_step_update: Vec<Box<dyn SimulationUpdateFunction>>,
    pub step_update: StepSimulation,
}

impl Update {
    pub fn new(pre_step_update: Vec<Box<dyn SimulationUpdateFunction>>, step_update: StepSimulation) -> Self {
        Self {
            pre_step_update,
            step_update,
        }
    }

    /// Price updates, request injection and cancellation, followed by a step with the given
    /// generators.
    pub fn build(
        requests: Vec<Request>,
        prices: ChargingPriceUpdate,
        instruction_generators: Vec<Arc<dyn InstructionGenerator>>,
    ) -> Self {
        Self::new(
            vec![
                Box::new(prices),
                Box::new(UpdateRequests::new(requests)),
                Box::new(CancelRequests),
            ],
            StepSimulation::new(instruction_generators),
        )
    }

    /// [`Update::build`] with the standard fleet managers: charging first, then trip dispatch.
    pub fn with_default_generators(config: &FleetConfig, requests: Vec<Request>, prices: ChargingPriceUpdate) -> Self {
        Self::build(requests, prices, default_instruction_generators(config))
    }

    /// Advance the simulation by one tick.
    pub fn apply_update(&mut self, sim: &SimulationState, env: &Environment) -> SimulationState {
        let cleared = sim.set_applied_instructions(im::OrdMap::new());
        let pre_stepped = self
            .pre_step_update
            .iter_mut()
            .fold(cleared, |acc, f| f.update(&acc, env));
        self.step_update.update(&pre_stepped, env)
    }
}

pub fn default_instruction_generators(config: &FleetConfig) -> Vec<Arc<dyn InstructionGenerator>> {
    vec![
        Arc::new(ChargingFleetManager::new(config.dispatcher.clone())),
        Arc::new(Dispatcher::new(config.dispatcher.clone())),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{mock_env, mock_request, mock_sim_with, mock_vehicle_with_soc, test_cell, test_cell_offset};

    #[test]
    fn applied_instructions_are_reset_every_tick() {
        let env = mock_env();
        let sim = mock_sim_with(vec![mock_vehicle_with_soc("v1", 1.0)], vec![], vec![], vec![]);
        let mut update = Update::with_default_generators(
            &env.config,
            vec![mock_request("r1", test_cell(), test_cell_offset(0.01, 0.0), 0, 1)],
            ChargingPriceUpdate::default(),
        );

        let first = update.apply_update(&sim, &env);
        assert!(first.applied_instructions.contains_key("v1"));

        let second = update.apply_update(&first, &env);
        assert!(second.applied_instructions.is_empty());
        assert_eq!(second.sim_time, 2 * sim.sim_timestep_duration_seconds);
    }
}
