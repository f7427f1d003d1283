//! Same-seed reproducibility check.
//!
//! Builds and runs one scenario twice and compares the final state field by field. Any
//! difference points at iteration-order or RNG leakage somewhere in the step.

use fleet_core::reporting::SummaryStats;
use fleet_core::runner::{LocalSimulationRunner, RunnerPayload};
use serde::Serialize;
use tracing::{info, warn};

use crate::error::ExperimentResult;
use crate::scenario::{build_scenario, ScenarioParams};

/// Outcome of running one scenario twice.
#[derive(Debug, Clone, Serialize)]
pub struct DeterminismReport {
    pub seed: u64,
    pub sim_time: u64,
    /// Names of the compared quantities that differ between the runs.
    pub mismatches: Vec<String>,
}

impl DeterminismReport {
    pub fn is_deterministic(&self) -> bool {
        self.mismatches.is_empty()
    }
}

fn run_once(params: &ScenarioParams) -> ExperimentResult<(RunnerPayload, Option<SummaryStats>)> {
    let finished = LocalSimulationRunner::run(build_scenario(params)?);
    let stats = finished.summary_stats();
    Ok((finished, stats))
}

/// Run `params` twice and compare vehicle states, positions, energy and summary statistics.
pub fn check_determinism(params: &ScenarioParams) -> ExperimentResult<DeterminismReport> {
    let (first, first_stats) = run_once(params)?;
    let (second, second_stats) = run_once(params)?;

    let mut mismatches = Vec::new();
    if first.sim.sim_time != second.sim.sim_time {
        mismatches.push("sim_time".to_string());
    }
    if first_stats != second_stats {
        mismatches.push("summary_stats".to_string());
    }

    let a: Vec<_> = first.sim.vehicles().collect();
    let b: Vec<_> = second.sim.vehicles().collect();
    if a.len() != b.len() {
        mismatches.push("vehicle_count".to_string());
    }
    for (left, right) in a.iter().zip(&b) {
        if left.id != right.id {
            mismatches.push(format!("vehicle order at {}", left.id));
            continue;
        }
        if left.vehicle_state.kind() != right.vehicle_state.kind() {
            mismatches.push(format!("{} state", left.id));
        }
        if left.position != right.position {
            mismatches.push(format!("{} position", left.id));
        }
        if left.energy != right.energy {
            mismatches.push(format!("{} energy", left.id));
        }
        if left.distance_traveled_km != right.distance_traveled_km {
            mismatches.push(format!("{} distance", left.id));
        }
    }

    let report = DeterminismReport {
        seed: params.seed,
        sim_time: first.sim.sim_time,
        mismatches,
    };
    if report.is_deterministic() {
        info!(seed = report.seed, sim_time = report.sim_time, "runs are identical");
    } else {
        warn!(seed = report.seed, mismatches = report.mismatches.len(), "runs diverged");
    }
    Ok(report)
}
