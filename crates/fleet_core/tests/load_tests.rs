//! Load tests for fleet_core: step throughput with realistic fleet sizes.

use std::sync::Arc;
use std::time::Instant;

use fleet_core::config::{FleetConfig, SimConfig};
use fleet_core::environment::Environment;
use fleet_core::reporting::StatsHandler;
use fleet_core::runner::{LocalSimulationRunner, RunnerPayload};
use fleet_core::test_helpers::{
    mock_bev, mock_ice, mock_position, mock_request, mock_sim_with, mock_station, mock_vehicle_with_soc,
    test_cell_offset,
};
use fleet_core::update::{ChargingPriceUpdate, Update};
use h3o::CellIndex;

/// Deterministic cells over roughly a 10 km square.
fn spread(n: usize, salt: usize) -> Vec<CellIndex> {
    (0..n)
        .map(|i| {
            let k = (i * 7919 + salt * 104_729) % 10_000;
            test_cell_offset((k / 100) as f64 * 0.001 - 0.05, (k % 100) as f64 * 0.001 - 0.05)
        })
        .collect()
}

fn payload(vehicles: usize, requests: usize, request_window: u64, end_time: u64) -> RunnerPayload {
    let config = FleetConfig::default().with_sim(SimConfig::default().with_end_time(end_time));
    let env = Arc::new(
        Environment::new(config.clone())
            .with_mechatronics(mock_bev())
            .with_mechatronics(mock_ice()),
    );
    env.reporter.add_handler(Box::new(StatsHandler::new()));

    let fleet = spread(vehicles, 1)
        .into_iter()
        .enumerate()
        .map(|(i, cell)| {
            let mut v = mock_vehicle_with_soc(&format!("v{i}"), 0.15 + (i % 9) as f64 * 0.1);
            v.position = mock_position(cell);
            v
        })
        .collect();
    let stations = spread(vehicles / 20 + 1, 2)
        .into_iter()
        .enumerate()
        .map(|(i, cell)| mock_station(&format!("s{i}"), cell, 6))
        .collect();
    let stream = spread(requests, 3)
        .into_iter()
        .zip(spread(requests, 4))
        .enumerate()
        .map(|(i, (o, d))| mock_request(&format!("r{i}"), o, d, (i as u64 * request_window) / requests as u64, 1))
        .collect();

    let sim = mock_sim_with(fleet, vec![], stations, vec![]);
    let update = Update::with_default_generators(&config, stream, ChargingPriceUpdate::default());
    RunnerPayload::new(sim, env, update).expect("load scenario")
}

fn run_timed(label: &str, payload: RunnerPayload) -> RunnerPayload {
    let ticks = (payload.env.config.sim.end_time - payload.sim.sim_time) / payload.sim.sim_timestep_duration_seconds;
    let start = Instant::now();
    let done = LocalSimulationRunner::run(payload);
    let elapsed = start.elapsed().as_secs_f64();
    println!(
        "{label}: {ticks} ticks in {elapsed:.2}s ({:.1} ticks/sec)",
        ticks as f64 / elapsed
    );
    done
}

#[test]
#[ignore] // Only run explicitly: cargo test --package fleet_core --test load_tests -- --ignored
fn sustained_load() {
    let done = run_timed("sustained load", payload(500, 2000, 3600, 2 * 3600));
    let stats = done.summary_stats().expect("stats");
    assert_eq!(stats.final_vehicle_count, 500);
    assert!(stats.requests_served_percent > 0.0);
    assert!(done.sim.indices_are_consistent());
}

#[test]
#[ignore]
fn peak_load() {
    // every request departs within the first ten minutes
    let done = run_timed("peak load", payload(200, 1500, 600, 3600));
    let stats = done.summary_stats().expect("stats");
    assert!(stats.requests_served_percent > 0.0);
    assert!(done.sim.vehicles().all(|v| v.energy.values().all(|e| *e >= 0.0)));
}
