pub mod config;
pub mod dispatcher;
pub mod driver_state;
pub mod environment;
pub mod error;
pub mod instruction;
pub mod model;
pub mod reporting;
pub mod road_network;
pub mod runner;
pub mod schedule;
pub mod simulation_state;
pub mod spatial;
pub mod units;
pub mod update;
pub mod vehicle_state;

#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers;
