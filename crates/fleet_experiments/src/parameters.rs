//! Parameter variation framework for exploring the fleet scenario space.
//!
//! A [`ParameterSpace`] holds a base [`ScenarioParams`] plus lists of values to vary. Grid
//! search takes the Cartesian product of every non-empty list; random sampling draws
//! combinations until it has the requested number of distinct ones.

use std::collections::HashSet;

use fleet_core::config::ChargingSearchType;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::scenario::ScenarioParams;

const SEED_MIX: u64 = 0x9e37_79b9;
const MAX_SAMPLE_ATTEMPTS: usize = 10_000;

/// A single parameter configuration for a simulation run.
///
/// Wraps [`ScenarioParams`] with the experiment metadata needed to trace a result row back to
/// the run that produced it.
#[derive(Debug, Clone)]
pub struct ParameterSet {
    pub params: ScenarioParams,
    /// Shared by every replication of one combination.
    pub experiment_id: String,
    pub run_id: usize,
    pub seed: u64,
}

impl ParameterSet {
    pub fn new(params: ScenarioParams, experiment_id: String, run_id: usize, seed: u64) -> Self {
        Self {
            params,
            experiment_id,
            run_id,
            seed,
        }
    }

    /// The scenario parameters with this run's seed applied.
    pub fn scenario_params(&self) -> ScenarioParams {
        self.params.clone().with_seed(self.seed)
    }
}

/// Values to explore around a base scenario. Empty lists keep the base value.
#[derive(Debug, Clone)]
pub struct ParameterSpace {
    base: ScenarioParams,
    num_vehicles: Vec<usize>,
    num_requests: Vec<usize>,
    num_stations: Vec<usize>,
    charging_search_types: Vec<ChargingSearchType>,
    fastcharge_soc_limits: Vec<f64>,
    human_driver_shares: Vec<f64>,
    duration_hours: Vec<u64>,
    replications: usize,
}

impl Default for ParameterSpace {
    fn default() -> Self {
        Self::new()
    }
}

impl ParameterSpace {
    pub fn new() -> Self {
        Self {
            base: ScenarioParams::default(),
            num_vehicles: vec![],
            num_requests: vec![],
            num_stations: vec![],
            charging_search_types: vec![],
            fastcharge_soc_limits: vec![],
            human_driver_shares: vec![],
            duration_hours: vec![],
            replications: 1,
        }
    }

    /// Create a new parameter space for grid search.
    pub fn grid() -> Self {
        Self::new()
    }

    pub fn num_vehicles(mut self, counts: Vec<usize>) -> Self {
        self.num_vehicles = counts;
        self
    }

    pub fn num_requests(mut self, counts: Vec<usize>) -> Self {
        self.num_requests = counts;
        self
    }

    pub fn num_stations(mut self, counts: Vec<usize>) -> Self {
        self.num_stations = counts;
        self
    }

    pub fn charging_search_type(mut self, types: Vec<ChargingSearchType>) -> Self {
        self.charging_search_types = types;
        self
    }

    pub fn fastcharge_soc_limit(mut self, limits: Vec<f64>) -> Self {
        self.fastcharge_soc_limits = limits;
        self
    }

    pub fn human_driver_share(mut self, shares: Vec<f64>) -> Self {
        self.human_driver_shares = shares;
        self
    }

    pub fn duration_hours(mut self, hours: Vec<u64>) -> Self {
        self.duration_hours = hours;
        self
    }

    /// Number of seeded runs per combination, at least one.
    pub fn replications(mut self, runs: usize) -> Self {
        self.replications = runs.max(1);
        self
    }

    /// Set base parameters (used as defaults).
    pub fn with_base(mut self, base: ScenarioParams) -> Self {
        self.base = base;
        self
    }

    /// Number of distinct combinations a grid search would produce.
    pub fn combination_count(&self) -> usize {
        [
            self.num_vehicles.len(),
            self.num_requests.len(),
            self.num_stations.len(),
            self.charging_search_types.len(),
            self.fastcharge_soc_limits.len(),
            self.human_driver_shares.len(),
            self.duration_hours.len(),
        ]
        .iter()
        .map(|&n| n.max(1))
        .product()
    }

    /// Generate every combination (Cartesian product), each replicated with its own seed.
    ///
    /// Replications of one combination share an `experiment_id` and differ in `run_id`.
    pub fn generate(&self) -> Vec<ParameterSet> {
        let mut combos = vec![self.base.clone()];
        combos = expand(combos, &self.num_vehicles, |p, &n| p.num_vehicles = n);
        combos = expand(combos, &self.num_requests, |p, &n| p.num_requests = n);
        combos = expand(combos, &self.num_stations, |p, &n| p.num_stations = n);
        combos = expand(combos, &self.charging_search_types, |p, &t| {
            p.dispatcher.charging_search_type = t
        });
        combos = expand(combos, &self.fastcharge_soc_limits, |p, &soc| {
            p.dispatcher.ideal_fastcharge_soc_limit = soc
        });
        combos = expand(combos, &self.human_driver_shares, |p, &share| {
            p.human_driver_share = share
        });
        combos = expand(combos, &self.duration_hours, |p, &hours| {
            *p = p.clone().with_duration_hours(hours)
        });

        combos
            .into_iter()
            .enumerate()
            .flat_map(|(experiment, params)| {
                (0..self.replications).map(move |run_id| {
                    let seed = self
                        .base
                        .seed
                        .wrapping_add((experiment * self.replications + run_id) as u64)
                        .wrapping_mul(SEED_MIX);
                    ParameterSet::new(params.clone(), format!("exp_{experiment}"), run_id, seed)
                })
            })
            .collect()
    }

    /// Draw `count` distinct combinations at random (Monte Carlo sampling).
    ///
    /// Stops early when the space has fewer distinct combinations than requested.
    pub fn sample_random(&self, count: usize, seed: u64) -> Vec<ParameterSet> {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut parameter_sets = Vec::new();
        let mut seen = HashSet::new();
        let mut attempts = 0;

        while parameter_sets.len() < count && attempts < MAX_SAMPLE_ATTEMPTS {
            attempts += 1;
            let mut params = self.base.clone();
            if let Some(&n) = self.num_vehicles.choose(&mut rng) {
                params.num_vehicles = n;
            }
            if let Some(&n) = self.num_requests.choose(&mut rng) {
                params.num_requests = n;
            }
            if let Some(&n) = self.num_stations.choose(&mut rng) {
                params.num_stations = n;
            }
            if let Some(&t) = self.charging_search_types.choose(&mut rng) {
                params.dispatcher.charging_search_type = t;
            }
            if let Some(&soc) = self.fastcharge_soc_limits.choose(&mut rng) {
                params.dispatcher.ideal_fastcharge_soc_limit = soc;
            }
            if let Some(&share) = self.human_driver_shares.choose(&mut rng) {
                params.human_driver_share = share;
            }
            if let Some(&hours) = self.duration_hours.choose(&mut rng) {
                params = params.with_duration_hours(hours);
            }

            if !seen.insert(format!("{params:?}")) {
                continue;
            }

            let seed_value = seed
                .wrapping_add(parameter_sets.len() as u64)
                .wrapping_mul(SEED_MIX);
            parameter_sets.push(ParameterSet::new(
                params,
                format!("random_{}", parameter_sets.len()),
                0,
                seed_value,
            ));
        }

        parameter_sets
    }
}

/// One copy of every combination per value, or the combinations unchanged when `values` is empty.
fn expand<T>(
    combos: Vec<ScenarioParams>,
    values: &[T],
    apply: impl Fn(&mut ScenarioParams, &T),
) -> Vec<ScenarioParams> {
    if values.is_empty() {
        return combos;
    }
    let apply = &apply;
    combos
        .into_iter()
        .flat_map(|params| {
            values.iter().map(move |value| {
                let mut next = params.clone();
                apply(&mut next, value);
                next
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grid_search_single_parameter() {
        let sets = ParameterSpace::grid().num_vehicles(vec![10, 20, 30]).generate();
        assert_eq!(sets.len(), 3);
        let counts: Vec<usize> = sets.iter().map(|s| s.params.num_vehicles).collect();
        assert_eq!(counts, vec![10, 20, 30]);
    }

    #[test]
    fn grid_search_multiple_parameters() {
        let space = ParameterSpace::grid()
            .num_vehicles(vec![10, 20])
            .charging_search_type(vec![
                ChargingSearchType::NearestShortestQueue,
                ChargingSearchType::ShortestTimeToCharge,
            ]);
        assert_eq!(space.combination_count(), 4);
        let sets = space.generate();
        assert_eq!(sets.len(), 4);
        assert!(sets.iter().any(|s| s.params.num_vehicles == 20
            && s.params.dispatcher.charging_search_type == ChargingSearchType::ShortestTimeToCharge));
    }

    #[test]
    fn replications_share_an_experiment_with_distinct_seeds() {
        let sets = ParameterSpace::grid()
            .num_stations(vec![2, 4])
            .replications(3)
            .generate();
        assert_eq!(sets.len(), 6);
        let first: Vec<&ParameterSet> = sets.iter().filter(|s| s.experiment_id == "exp_0").collect();
        assert_eq!(first.len(), 3);
        let seeds: HashSet<u64> = sets.iter().map(|s| s.seed).collect();
        assert_eq!(seeds.len(), 6);
    }

    #[test]
    fn duration_sets_the_end_time() {
        let sets = ParameterSpace::grid().duration_hours(vec![1, 2]).generate();
        let ends: Vec<u64> = sets.iter().map(|s| s.params.sim.end_time).collect();
        assert_eq!(ends, vec![3600, 7200]);
    }

    #[test]
    fn scenario_params_carry_the_run_seed() {
        let set = ParameterSet::new(ScenarioParams::default(), "exp".into(), 0, 1234);
        assert_eq!(set.scenario_params().seed, 1234);
    }

    #[test]
    fn random_sampling_is_distinct_and_bounded_by_the_space() {
        let space = ParameterSpace::grid()
            .num_vehicles(vec![10, 20, 30, 40])
            .num_requests(vec![100, 200, 300]);
        let sets = space.sample_random(10, 42);
        assert_eq!(sets.len(), 10);
        let distinct: HashSet<(usize, usize)> = sets
            .iter()
            .map(|s| (s.params.num_vehicles, s.params.num_requests))
            .collect();
        assert_eq!(distinct.len(), 10);

        let small = ParameterSpace::grid().num_vehicles(vec![1, 2]).sample_random(5, 7);
        assert_eq!(small.len(), 2);
    }

    #[test]
    fn random_sampling_is_reproducible() {
        let space = ParameterSpace::grid().fastcharge_soc_limit(vec![0.6, 0.7, 0.8, 0.9]);
        let a: Vec<f64> = space
            .sample_random(3, 5)
            .iter()
            .map(|s| s.params.dispatcher.ideal_fastcharge_soc_limit)
            .collect();
        let b: Vec<f64> = space
            .sample_random(3, 5)
            .iter()
            .map(|s| s.params.dispatcher.ideal_fastcharge_soc_limit)
            .collect();
        assert_eq!(a, b);
    }
}
