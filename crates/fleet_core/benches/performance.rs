//! Performance benchmarks for fleet_core using Criterion.rs.

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use fleet_core::config::{FleetConfig, SimConfig};
use fleet_core::dispatcher::assignment::{find_assignment, h3_distance_cost};
use fleet_core::environment::Environment;
use fleet_core::runner::{LocalSimulationRunner, RunnerPayload};
use fleet_core::test_helpers::{
    mock_bev, mock_ice, mock_position, mock_request, mock_sim_with, mock_station, mock_vehicle_with_soc,
    test_cell, test_cell_offset,
};
use fleet_core::update::{ChargingPriceUpdate, Update};

/// Spread `n` cells over roughly a 5 km square around the test cell.
fn spread(n: usize, salt: usize) -> Vec<h3o::CellIndex> {
    (0..n)
        .map(|i| {
            let k = (i * 7919 + salt * 104_729) % 2500;
            test_cell_offset((k / 50) as f64 * 0.001 - 0.025, (k % 50) as f64 * 0.001 - 0.025)
        })
        .collect()
}

fn payload(vehicles: usize, requests: usize) -> RunnerPayload {
    let config = FleetConfig {
        sim: SimConfig::default().with_end_time(3600),
        ..FleetConfig::default()
    };
    let env = Arc::new(
        Environment::new(config.clone())
            .with_mechatronics(mock_bev())
            .with_mechatronics(mock_ice()),
    );
    let fleet = spread(vehicles, 1)
        .into_iter()
        .enumerate()
        .map(|(i, cell)| {
            let mut v = mock_vehicle_with_soc(&format!("v{i}"), 0.2 + (i % 8) as f64 * 0.1);
            v.position = mock_position(cell);
            v
        })
        .collect();
    let stations = spread(vehicles / 10 + 1, 2)
        .into_iter()
        .enumerate()
        .map(|(i, cell)| mock_station(&format!("s{i}"), cell, 4))
        .collect();
    let origins = spread(requests, 3);
    let destinations = spread(requests, 4);
    let stream = origins
        .into_iter()
        .zip(destinations)
        .enumerate()
        .map(|(i, (o, d))| mock_request(&format!("r{i}"), o, d, (i as u64 * 3600) / requests as u64, 1))
        .collect();

    let sim = mock_sim_with(fleet, vec![], stations, vec![]);
    let update = Update::with_default_generators(&config, stream, ChargingPriceUpdate::default());
    RunnerPayload::new(sim, env, update).expect("bench scenario")
}

fn bench_simulation_run(c: &mut Criterion) {
    let scenarios = vec![("small", 20, 100), ("medium", 100, 500), ("large", 250, 1000)];

    let mut group = c.benchmark_group("simulation_run");
    group.sample_size(10);
    for (name, vehicles, requests) in scenarios {
        group.bench_with_input(
            BenchmarkId::from_parameter(name),
            &(vehicles, requests),
            |b, &(vehicles, requests)| {
                b.iter(|| black_box(LocalSimulationRunner::run(payload(vehicles, requests)).sim.sim_time));
            },
        );
    }
    group.finish();
}

fn bench_assignment(c: &mut Criterion) {
    let origin = test_cell();
    let mut group = c.benchmark_group("assignment");
    for n in [10usize, 50, 100] {
        let vehicles = spread(n, 5);
        let requests = spread(n, 6);
        group.bench_with_input(BenchmarkId::new("h3_distance", n), &n, |b, _| {
            b.iter(|| {
                black_box(find_assignment(&vehicles, &requests, |v, r| h3_distance_cost(*v, *r)));
            });
        });
    }
    group.bench_function("h3_distance_cost", |b| {
        let far = test_cell_offset(0.02, 0.02);
        b.iter(|| black_box(h3_distance_cost(origin, far)));
    });
    group.finish();
}

criterion_group!(benches, bench_simulation_run, bench_assignment);
criterion_main!(benches);
