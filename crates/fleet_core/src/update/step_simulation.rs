//! One simulation step.

use std::sync::Arc;

use tracing::{debug, error};

use crate::dispatcher::{generate_instructions, InstructionGenerator};
use crate::environment::Environment;
use crate::error::{SimError, SimResult};
use crate::instruction::{Instruction, InstructionResult};
use crate::model::Vehicle;
use crate::reporting::events;
use crate::simulation_state::SimulationState;
use crate::units::{SimTime, VehicleId};
use crate::vehicle_state::{ops, VehicleState};

/// Runs the configured instruction generators, in order, as part of every step.
#[derive(Debug, Clone, Default)]
pub struct StepSimulation {
    instruction_generators: Vec<Arc<dyn InstructionGenerator>>,
}

impl StepSimulation {
    pub fn new(instruction_generators: Vec<Arc<dyn InstructionGenerator>>) -> Self {
        Self {
            instruction_generators,
        }
    }

    pub fn instruction_generators(&self) -> &[Arc<dyn InstructionGenerator>] {
        &self.instruction_generators
    }

    pub fn instruction_generator(&self, name: &str) -> Option<&Arc<dyn InstructionGenerator>> {
        self.instruction_generators.iter().find(|g| g.name() == name)
    }

    /// Replace the generator sharing `generator`'s name, keeping its position.
    pub fn update_instruction_generator(&self, generator: Arc<dyn InstructionGenerator>) -> SimResult<Self> {
        let idx = self
            .instruction_generators
            .iter()
            .position(|g| g.name() == generator.name())
            .ok_or_else(|| SimError::state(format!("{} not found in step simulation", generator.name())))?;
        let mut instruction_generators = self.instruction_generators.clone();
        instruction_generators[idx] = generator;
        Ok(Self {
            instruction_generators,
        })
    }

    /// Update drivers, generate and apply instructions, update every vehicle, then tick.
    pub fn update(&mut self, sim: &SimulationState, env: &Environment) -> SimulationState {
        let with_drivers = perform_driver_state_updates(sim, env);

        let generated = generate_instructions(&self.instruction_generators, &with_drivers, env);
        let final_instructions = generated.final_instructions();
        self.instruction_generators = generated.updated_instruction_generators;
        log_instructions(&final_instructions, sim, env);

        let with_instructions = apply_instructions(&with_drivers, env, &final_instructions);
        perform_vehicle_state_updates(&with_instructions, env).tick()
    }
}

fn log_instructions(instructions: &[Instruction], sim: &SimulationState, env: &Environment) {
    for instruction in instructions {
        env.reporter
            .file_report(events::instruction_report(sim, instruction));
    }
}

/// Let every driver react to its schedule. Failures are logged and skipped.
pub fn perform_driver_state_updates(sim: &SimulationState, env: &Environment) -> SimulationState {
    let vehicle_ids: Vec<VehicleId> = sim.vehicles().map(|v| v.id.clone()).collect();
    vehicle_ids.iter().fold(sim.clone(), |acc, vehicle_id| {
        let Some(vehicle) = acc.vehicle(vehicle_id) else {
            return acc;
        };
        match vehicle.driver_state.update(&acc, env) {
            Ok(Some(updated)) => updated,
            Ok(None) => acc,
            Err(e) => {
                error!(vehicle_id = %vehicle_id, error = %e, "driver state update failed");
                acc
            }
        }
    })
}

/// Resolve every instruction against the same snapshot, then transition each vehicle in turn.
/// Rejected instructions and refused transitions are logged and dropped.
pub fn apply_instructions(sim: &SimulationState, env: &Environment, instructions: &[Instruction]) -> SimulationState {
    let mut applied = sim.applied_instructions.clone();
    let mut results: Vec<InstructionResult> = Vec::with_capacity(instructions.len());
    for instruction in instructions {
        match instruction.apply(sim, env) {
            Ok(result) => {
                applied.insert(instruction.vehicle_id().to_string(), instruction.clone());
                results.push(result);
            }
            Err(e) => error!(
                vehicle_id = %instruction.vehicle_id(),
                instruction = instruction.name(),
                error = %e,
                "instruction rejected"
            ),
        }
    }

    results
        .iter()
        .fold(sim.set_applied_instructions(applied), |acc, result| {
            match ops::transition_previous_to_next(&acc, env, &result.prev, &result.next) {
                Ok(Some(updated)) => updated,
                Ok(None) => {
                    debug!(
                        vehicle_id = %result.prev.vehicle_id(),
                        "transition {} -> {} not applied",
                        result.prev.kind(),
                        result.next.kind()
                    );
                    acc
                }
                Err(e) => {
                    error!(vehicle_id = %result.prev.vehicle_id(), error = %e, "transition failed");
                    acc
                }
            }
        })
}

/// Vehicles in update order: id order, except that charge queueing vehicles go last, ordered
/// by enqueue time then id, so queues release in arrival order.
pub fn vehicle_update_order(sim: &SimulationState) -> Vec<VehicleId> {
    let (mut queueing, others): (Vec<&Vehicle>, Vec<&Vehicle>) = sim
        .vehicles()
        .partition(|v| matches!(v.vehicle_state, VehicleState::ChargeQueueing(_)));
    let enqueue_time = |v: &Vehicle| -> SimTime {
        match &v.vehicle_state {
            VehicleState::ChargeQueueing(q) => q.enqueue_time,
            _ => 0,
        }
    };
    queueing.sort_by(|a, b| enqueue_time(a).cmp(&enqueue_time(b)).then_with(|| a.id.cmp(&b.id)));
    others
        .into_iter()
        .chain(queueing)
        .map(|v| v.id.clone())
        .collect()
}

/// Run each vehicle's state update. Failures are logged and the vehicle is left as it was.
pub fn perform_vehicle_state_updates(sim: &SimulationState, env: &Environment) -> SimulationState {
    vehicle_update_order(sim)
        .iter()
        .fold(sim.clone(), |acc, vehicle_id| {
            let Some(vehicle) = acc.vehicle(vehicle_id) else {
                return acc;
            };
            match vehicle.vehicle_state.clone().update(&acc, env) {
                Ok(Some(updated)) => updated,
                Ok(None) => acc,
                Err(e) => {
                    error!(
                        vehicle_id = %vehicle_id,
                        state = %vehicle.vehicle_state.kind(),
                        error = %e,
                        "vehicle state update failed"
                    );
                    acc
                }
            }
        })
}
