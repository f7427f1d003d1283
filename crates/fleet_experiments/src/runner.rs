//! Parallel simulation execution using rayon.
//!
//! Each parameter set builds its own scenario and runs to completion with no shared state,
//! so sets can be spread across a thread pool freely.

use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use tracing::{debug, warn};

use fleet_core::error::SetupError;
use fleet_core::runner::LocalSimulationRunner;

use crate::error::ExperimentResult;
use crate::metrics::{extract_metrics, SimulationResult};
use crate::parameters::ParameterSet;
use crate::scenario::build_scenario;

const PROGRESS_TEMPLATE: &str = "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})";

/// Run a single simulation with the given parameter set.
///
/// Builds the scenario for the set's seed, steps it to the configured end time and
/// flattens the summary statistics into a result row.
pub fn run_single_simulation(param_set: &ParameterSet) -> ExperimentResult<SimulationResult> {
    let params = param_set.scenario_params();
    let payload = build_scenario(&params)?;
    let finished = LocalSimulationRunner::run(payload);
    let stats = finished
        .summary_stats()
        .ok_or_else(|| SetupError::Config("scenario has no stats handler".into()))?;
    debug!(
        experiment_id = %param_set.experiment_id,
        run_id = param_set.run_id,
        served = stats.requests_served_percent,
        "run complete"
    );
    Ok(extract_metrics(param_set, &stats))
}

/// Run multiple simulations in parallel, with a progress bar.
///
/// Results come back in the order of `parameter_sets`. Sets that fail setup are logged and
/// left out.
pub fn run_parallel_experiments(
    parameter_sets: Vec<ParameterSet>,
    num_threads: Option<usize>,
) -> ExperimentResult<Vec<SimulationResult>> {
    run_parallel_experiments_with_progress(parameter_sets, num_threads, true)
}

pub fn run_parallel_experiments_with_progress(
    parameter_sets: Vec<ParameterSet>,
    num_threads: Option<usize>,
    show_progress: bool,
) -> ExperimentResult<Vec<SimulationResult>> {
    let total = parameter_sets.len();
    let pb = if show_progress && total > 0 {
        let bar = ProgressBar::new(total as u64);
        match ProgressStyle::default_bar().template(PROGRESS_TEMPLATE) {
            Ok(style) => bar.set_style(style.progress_chars("#>-")),
            Err(e) => warn!(error = %e, "invalid progress template, using the default style"),
        }
        Some(bar)
    } else {
        None
    };

    let mut builder = rayon::ThreadPoolBuilder::new();
    if let Some(threads) = num_threads {
        builder = builder.num_threads(threads);
    }
    let pool = builder.build()?;

    let outcomes: Vec<ExperimentResult<SimulationResult>> = pool.install(|| {
        parameter_sets
            .par_iter()
            .map(|param_set| {
                let result = run_single_simulation(param_set);
                if let Some(progress_bar) = &pb {
                    progress_bar.inc(1);
                }
                result
            })
            .collect()
    });

    if let Some(progress_bar) = &pb {
        progress_bar.finish_with_message("Completed");
    }

    let results = outcomes
        .into_iter()
        .zip(&parameter_sets)
        .filter_map(|(outcome, set)| match outcome {
            Ok(result) => Some(result),
            Err(e) => {
                warn!(experiment_id = %set.experiment_id, run_id = set.run_id, error = %e, "run failed");
                None
            }
        })
        .collect();
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parameters::ParameterSpace;
    use crate::scenario::ScenarioParams;

    fn small_base() -> ScenarioParams {
        ScenarioParams::default()
            .with_num_vehicles(4)
            .with_num_requests(10)
            .with_num_stations(2)
            .with_num_bases(1)
            .with_request_window_seconds(1800)
            .with_duration_hours(1)
    }

    #[test]
    fn single_simulation_reports_the_fleet() {
        let sets = ParameterSpace::grid().with_base(small_base()).generate();
        let result = run_single_simulation(&sets[0]).expect("run");
        assert_eq!(result.final_vehicle_count, 4);
        assert!(result.requests_served_percent >= 0.0 && result.requests_served_percent <= 1.0);
    }

    #[test]
    fn parallel_results_keep_input_order() {
        let sets = ParameterSpace::grid()
            .with_base(small_base())
            .num_vehicles(vec![2, 3])
            .num_requests(vec![5, 8])
            .generate();
        let results = run_parallel_experiments_with_progress(sets, Some(2), false).expect("runs");
        assert_eq!(results.len(), 4);
        let fleets: Vec<usize> = results.iter().map(|r| r.final_vehicle_count).collect();
        assert_eq!(fleets, vec![2, 2, 3, 3]);
    }

    #[test]
    fn invalid_sets_are_skipped() {
        let good = ParameterSet::new(small_base(), "good".into(), 0, 1);
        let bad = ParameterSet::new(small_base().with_ice_share(2.0), "bad".into(), 0, 2);
        let results = run_parallel_experiments_with_progress(vec![good, bad], Some(1), false).expect("runs");
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].experiment_id, "good");
    }
}
