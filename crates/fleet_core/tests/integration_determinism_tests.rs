mod support;

use fleet_core::reporting::{Report, ReportType};
use fleet_core::runner::{LocalSimulationRunner, RunnerPayload};
use fleet_core::test_helpers::{
    mock_base, mock_position, mock_request, mock_station, mock_vehicle_with_soc, test_cell, test_cell_offset,
};

use support::scenario::ScenarioBuilder;

fn busy_scenario() -> RunnerPayload {
    let mut builder = ScenarioBuilder::new()
        .with_end_time(3600)
        .with_reports([ReportType::VehicleChargeEvent])
        .with_station(mock_station("s1", test_cell_offset(0.01, 0.01), 2))
        .with_base(mock_base("b1", test_cell_offset(-0.01, 0.0), 4).with_station("s1"));
    for (i, soc) in [0.9, 0.6, 0.15, 0.05].into_iter().enumerate() {
        let mut vehicle = mock_vehicle_with_soc(&format!("v{i}"), soc);
        vehicle.position = mock_position(test_cell_offset(0.002 * i as f64, 0.0));
        builder = builder.with_vehicle(vehicle);
    }
    for i in 0..8u64 {
        let offset = 0.003 * i as f64;
        builder = builder.with_streamed_request(mock_request(
            &format!("r{i}"),
            test_cell_offset(offset, -offset),
            test_cell_offset(-offset, offset + 0.01),
            i * 240,
            1,
        ));
    }
    builder.with_request(mock_request("r_first", test_cell(), test_cell_offset(0.01, 0.0), 0, 1)).build()
}

#[test]
fn identical_inputs_give_identical_runs() {
    let first = LocalSimulationRunner::run(busy_scenario());
    let second = LocalSimulationRunner::run(busy_scenario());

    assert_eq!(first.summary_stats(), second.summary_stats());
    for vehicle in first.sim.vehicles() {
        let other = second.sim.vehicle(&vehicle.id).expect("same vehicles");
        assert_eq!(vehicle.position, other.position);
        assert_eq!(vehicle.energy, other.energy);
        assert_eq!(vehicle.vehicle_state.kind(), other.vehicle_state.kind());
        assert_eq!(vehicle.distance_traveled_km, other.distance_traveled_km);
    }
}

#[test]
fn busy_run_keeps_indices_and_energy_consistent() {
    let mut payload = busy_scenario();
    while !payload.is_finished() {
        let next = LocalSimulationRunner::step(payload).expect("step before end time");
        assert!(next.sim.indices_are_consistent(), "at {}", next.sim.sim_time);
        for vehicle in next.sim.vehicles() {
            assert!(vehicle.energy.values().all(|level| *level >= 0.0));
        }
        for station in next.sim.stations() {
            for charger in station.state.values() {
                assert!(charger.available_chargers <= charger.total_chargers);
            }
        }
        payload = next;
    }
    assert!(payload.summary_stats().expect("stats").total_vkt > 0.0);
}

fn charge_sessions(payload: &RunnerPayload) -> Vec<(String, u64, u64)> {
    payload
        .env
        .reporter
        .collected_reports()
        .into_iter()
        .filter_map(|report| match report {
            Report::VehicleChargeEvent {
                vehicle_id,
                session_id,
                sim_time_start,
                ..
            } => Some((vehicle_id, session_id, sim_time_start)),
            _ => None,
        })
        .collect()
}

#[test]
fn charge_session_ids_repeat_across_runs_in_one_process() {
    let first = LocalSimulationRunner::run(busy_scenario());
    // an unrelated run in between must not shift the ids of the next one
    let _ = LocalSimulationRunner::run(busy_scenario());
    let third = LocalSimulationRunner::run(busy_scenario());

    let sessions = charge_sessions(&first);
    assert!(!sessions.is_empty());
    assert_eq!(sessions, charge_sessions(&third));
}
