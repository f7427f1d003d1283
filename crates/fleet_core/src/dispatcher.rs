//! Instruction generators: fleet-level strategies that look at a snapshot and propose
//! instructions for the current tick.
//!
//! Generators run in the order they were configured. Every instruction is pushed onto a per-vehicle
//! stack and the last one pushed is the one applied, so later generators override earlier ones.
//! Drivers get the final word: each vehicle's driver state may push one more instruction after
//! all generators have run.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::environment::Environment;
use crate::instruction::Instruction;
use crate::simulation_state::SimulationState;
use crate::units::VehicleId;

pub mod assignment;
pub mod charging_fleet_manager;
pub mod charging_search;
pub mod position_fleet_manager;
pub mod trip_dispatcher;

pub use charging_fleet_manager::ChargingFleetManager;
pub use position_fleet_manager::{DemandForecaster, ForecastRow, PositionFleetManager};
pub use trip_dispatcher::Dispatcher;

/// A strategy producing instructions each tick.
///
/// Generation is pure: a generator with internal memory returns its successor instead of
/// mutating itself. Stateless generators return `self`.
pub trait InstructionGenerator: Send + Sync + fmt::Debug {
    fn name(&self) -> &str;

    fn generate_instructions(
        self: Arc<Self>,
        sim: &SimulationState,
        env: &Environment,
    ) -> (Arc<dyn InstructionGenerator>, Vec<Instruction>);
}

/// Wraps a plain function as an [`InstructionGenerator`].
pub struct FnGenerator<F> {
    name: String,
    f: F,
}

impl<F> FnGenerator<F>
where
    F: Fn(&SimulationState, &Environment) -> Vec<Instruction> + Send + Sync + 'static,
{
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self { name: name.into(), f }
    }
}

impl<F> fmt::Debug for FnGenerator<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnGenerator").field("name", &self.name).finish()
    }
}

impl<F> InstructionGenerator for FnGenerator<F>
where
    F: Fn(&SimulationState, &Environment) -> Vec<Instruction> + Send + Sync + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn generate_instructions(
        self: Arc<Self>,
        sim: &SimulationState,
        env: &Environment,
    ) -> (Arc<dyn InstructionGenerator>, Vec<Instruction>) {
        let instructions = (self.f)(sim, env);
        (self, instructions)
    }
}

/// Instructions stacked per vehicle plus the generators' successors.
#[derive(Debug, Default)]
pub struct InstructionGenerationResult {
    pub instruction_stack: BTreeMap<VehicleId, Vec<Instruction>>,
    pub updated_instruction_generators: Vec<Arc<dyn InstructionGenerator>>,
}

impl InstructionGenerationResult {
    fn push(&mut self, instruction: Instruction) {
        self.instruction_stack
            .entry(instruction.vehicle_id().to_string())
            .or_default()
            .push(instruction);
    }

    fn apply_instruction_generator(
        mut self,
        generator: &Arc<dyn InstructionGenerator>,
        sim: &SimulationState,
        env: &Environment,
    ) -> Self {
        let (updated, instructions) = Arc::clone(generator).generate_instructions(sim, env);
        for instruction in instructions {
            self.push(instruction);
        }
        self.updated_instruction_generators.push(updated);
        self
    }

    fn add_driver_instructions(mut self, sim: &SimulationState, env: &Environment) -> Self {
        let driver_instructions: Vec<Instruction> = sim
            .vehicles()
            .filter_map(|v| v.driver_state.generate_instruction(sim, env))
            .collect();
        for instruction in driver_instructions {
            self.push(instruction);
        }
        self
    }

    /// The winning (last stacked) instruction per vehicle, in vehicle id order.
    pub fn final_instructions(&self) -> Vec<Instruction> {
        self.instruction_stack
            .values()
            .filter_map(|stack| stack.last().cloned())
            .collect()
    }
}

/// Run every generator in order, then let drivers add theirs.
pub fn generate_instructions(
    generators: &[Arc<dyn InstructionGenerator>],
    sim: &SimulationState,
    env: &Environment,
) -> InstructionGenerationResult {
    generators
        .iter()
        .fold(InstructionGenerationResult::default(), |acc, generator| {
            acc.apply_instruction_generator(generator, sim, env)
        })
        .add_driver_instructions(sim, env)
}
