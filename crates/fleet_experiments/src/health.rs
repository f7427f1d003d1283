//! Fleet health score calculation.
//!
//! Combines several run metrics into one weighted score so sweeps can be ranked. Each metric
//! is min-max normalised across the batch being scored, so scores are only comparable within
//! one call.

use crate::metrics::SimulationResult;

/// Configurable weights for the fleet health score.
///
/// # Default Weights
///
/// - Requests served: 0.4
/// - Fleet revenue: 0.25
/// - Final state of charge: 0.15
/// - Charging time: 0.1 (inverted, lower is better)
/// - Deadhead share of distance: -0.2 (penalty)
#[derive(Debug, Clone, Copy)]
pub struct HealthWeights {
    pub served_weight: f64,
    pub revenue_weight: f64,
    pub soc_weight: f64,
    /// Applied to the inverted charging time share.
    pub charging_time_weight: f64,
    /// Negative; applied to the normalised deadhead share.
    pub deadhead_penalty: f64,
}

impl Default for HealthWeights {
    fn default() -> Self {
        Self {
            served_weight: 0.4,
            revenue_weight: 0.25,
            soc_weight: 0.15,
            charging_time_weight: 0.1,
            deadhead_penalty: -0.2,
        }
    }
}

impl HealthWeights {
    pub fn new(
        served_weight: f64,
        revenue_weight: f64,
        soc_weight: f64,
        charging_time_weight: f64,
        deadhead_penalty: f64,
    ) -> Self {
        Self {
            served_weight,
            revenue_weight,
            soc_weight,
            charging_time_weight,
            deadhead_penalty,
        }
    }
}

/// Normalize a metric value to [0, 1]. If min == max, returns 0.5.
fn normalize_metric(value: f64, min: f64, max: f64) -> f64 {
    if max == min {
        0.5
    } else {
        ((value - min) / (max - min)).clamp(0.0, 1.0)
    }
}

fn deadhead_share(result: &SimulationResult) -> f64 {
    if result.total_vkt > 0.0 {
        result.deadhead_vkt / result.total_vkt
    } else {
        0.0
    }
}

/// Min and max of `metric` across `results`, paired with the metric itself.
struct Range<F> {
    metric: F,
    min: f64,
    max: f64,
}

impl<F: Fn(&SimulationResult) -> f64> Range<F> {
    fn over(results: &[SimulationResult], metric: F) -> Self {
        let (min, max) = results
            .iter()
            .map(&metric)
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(min, max), v| (min.min(v), max.max(v)));
        Self { metric, min, max }
    }

    fn normalized(&self, result: &SimulationResult) -> f64 {
        normalize_metric((self.metric)(result), self.min, self.max)
    }
}

/// Calculate health scores for all simulation results, in input order.
///
/// Higher scores indicate a healthier fleet.
pub fn calculate_health_scores(results: &[SimulationResult], weights: &HealthWeights) -> Vec<f64> {
    if results.is_empty() {
        return vec![];
    }

    let served = Range::over(results, |r| r.requests_served_percent);
    let revenue = Range::over(results, |r| r.fleet_revenue);
    let soc = Range::over(results, |r| r.mean_final_soc);
    let charging = Range::over(results, |r| r.charging_time_percent);
    let deadhead = Range::over(results, deadhead_share);

    results
        .iter()
        .map(|result| {
            served.normalized(result) * weights.served_weight
                + revenue.normalized(result) * weights.revenue_weight
                + soc.normalized(result) * weights.soc_weight
                + (1.0 - charging.normalized(result)) * weights.charging_time_weight
                + deadhead.normalized(result) * weights.deadhead_penalty
        })
        .collect()
}
