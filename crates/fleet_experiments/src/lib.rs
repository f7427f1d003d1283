//! Parallel experimentation framework for fleet simulation parameter sweeps.
//!
//! Generates synthetic fleet scenarios from a handful of parameters, runs many of them in
//! parallel, flattens each run into a result row and scores the rows so sweeps can be ranked.
//!
//! # Quick Start
//!
//! ```no_run
//! use fleet_experiments::{find_best_result_index, run_parallel_experiments, HealthWeights, ParameterSpace};
//!
//! let space = ParameterSpace::grid()
//!     .num_vehicles(vec![25, 50, 100])
//!     .num_stations(vec![5, 10]);
//!
//! let results = run_parallel_experiments(space.generate(), None).expect("thread pool");
//! let best_idx = find_best_result_index(&results, &HealthWeights::default());
//! ```
//!
//! # Architecture
//!
//! - [`scenario`]: seeded synthetic scenario generation
//! - [`parameters`]: parameter variation (grid search, random sampling)
//! - [`runner`]: parallel simulation execution using rayon
//! - [`metrics`]: flattening summary statistics into result rows
//! - [`health`]: weighted fleet health scores
//! - [`export`]: Parquet, JSON and CSV output
//! - [`determinism`]: same-seed reproducibility check

pub mod determinism;
pub mod error;
pub mod export;
pub mod health;
pub mod metrics;
pub mod parameter_spaces;
pub mod parameters;
pub mod runner;
pub mod scenario;

pub use determinism::{check_determinism, DeterminismReport};
pub use error::{ExperimentError, ExperimentResult};
pub use export::{export_to_csv, export_to_json, export_to_parquet, find_best_parameters, find_best_result_index};
pub use health::{calculate_health_scores, HealthWeights};
pub use metrics::SimulationResult;
pub use parameters::{ParameterSet, ParameterSpace};
pub use runner::{run_parallel_experiments, run_single_simulation};
pub use scenario::{build_scenario, ScenarioParams};
