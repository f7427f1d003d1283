use std::cmp::Ordering;

use crate::health::{calculate_health_scores, HealthWeights};
use crate::metrics::SimulationResult;
use crate::parameters::ParameterSet;

/// Ties go to the earliest result.
pub(crate) fn find_best_index_by_health(results: &[SimulationResult], weights: &HealthWeights) -> Option<usize> {
    calculate_health_scores(results, weights)
        .iter()
        .enumerate()
        .fold(None, |best: Option<(usize, f64)>, (idx, &score)| match best {
            Some((_, best_score)) if score.partial_cmp(&best_score) != Some(Ordering::Greater) => best,
            _ => Some((idx, score)),
        })
        .map(|(idx, _)| idx)
}

pub(crate) fn find_best_parameters_impl<'a>(
    results: &[SimulationResult],
    parameter_sets: &'a [ParameterSet],
    weights: &HealthWeights,
) -> Option<&'a ParameterSet> {
    let best = &results[find_best_index_by_health(results, weights)?];
    parameter_sets
        .iter()
        .find(|set| set.experiment_id == best.experiment_id && set.run_id == best.run_id)
}
