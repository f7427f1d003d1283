//! Result export and analysis utilities.
//!
//! Writes experiment results to Parquet, JSON or CSV, and picks the best run by health score.

use std::path::Path;

use crate::error::ExperimentResult;
use crate::health::{calculate_health_scores, HealthWeights};
use crate::metrics::SimulationResult;
use crate::parameters::ParameterSet;

#[path = "export/csv.rs"]
mod csv;
#[path = "export/json.rs"]
mod json;
#[path = "export/parquet.rs"]
mod parquet;
#[path = "export/ranking.rs"]
mod ranking;
#[path = "export/writer_utils.rs"]
mod writer_utils;

/// Export simulation results to Parquet, one row per run with a health score column.
///
/// # Errors
///
/// Fails when `results` is empty or the file cannot be written.
pub fn export_to_parquet(
    results: &[SimulationResult],
    weights: &HealthWeights,
    path: impl AsRef<Path>,
) -> ExperimentResult<()> {
    writer_utils::ensure_not_empty(results)?;
    let scores = calculate_health_scores(results, weights);
    let file = writer_utils::create_output_file(path)?;
    parquet::export_to_parquet_impl(results, &scores, file)
}

/// Export simulation results to a pretty-printed JSON array.
pub fn export_to_json(results: &[SimulationResult], path: impl AsRef<Path>) -> ExperimentResult<()> {
    let file = writer_utils::create_output_file(path)?;
    json::export_to_json_impl(results, file)
}

/// Export simulation results with their parameters and health scores to CSV.
///
/// Results are matched to parameter sets by experiment and run id, so runs that failed and
/// were left out of `results` do not shift the rows.
pub fn export_to_csv(
    results: &[SimulationResult],
    parameter_sets: &[ParameterSet],
    weights: &HealthWeights,
    path: impl AsRef<Path>,
) -> ExperimentResult<()> {
    writer_utils::ensure_not_empty(results)?;
    let scores = calculate_health_scores(results, weights);
    let file = writer_utils::create_output_file(path)?;
    csv::export_to_csv_impl(results, parameter_sets, &scores, file)
}

/// The parameter set behind the result with the highest health score.
pub fn find_best_parameters<'a>(
    results: &[SimulationResult],
    parameter_sets: &'a [ParameterSet],
    weights: &HealthWeights,
) -> Option<&'a ParameterSet> {
    ranking::find_best_parameters_impl(results, parameter_sets, weights)
}

/// Index of the result with the highest health score, or `None` when there are no results.
pub fn find_best_result_index(results: &[SimulationResult], weights: &HealthWeights) -> Option<usize> {
    ranking::find_best_index_by_health(results, weights)
}
