//! Run summary statistics.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::environment::Environment;
use crate::reporting::{Report, ReportHandler};
use crate::simulation_state::SimulationState;
use crate::units::{Currency, Kilometers, Ratio};
use crate::vehicle_state::VehicleStateKind;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct VehicleStateSummary {
    /// Share of vehicle-ticks spent in this state.
    pub observed_percent: Ratio,
    pub vkt: Kilometers,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SummaryStats {
    pub mean_final_soc: Ratio,
    pub requests_served_percent: Ratio,
    pub total_vkt: Kilometers,
    pub station_revenue: Currency,
    pub fleet_revenue: Currency,
    pub final_vehicle_count: usize,
    pub vehicle_state: BTreeMap<VehicleStateKind, VehicleStateSummary>,
}

impl SummaryStats {
    pub fn log(&self) {
        info!("{:.2} %\tMean Final SOC", self.mean_final_soc * 100.0);
        info!("{:.2} %\tRequests Served", self.requests_served_percent * 100.0);
        for (state, summary) in &self.vehicle_state {
            info!(
                "{:.2} %\tTime in State {state} ({:.2} km)",
                summary.observed_percent * 100.0,
                summary.vkt
            );
        }
        info!("{:.2} km\tTotal Kilometers Traveled", self.total_vkt);
        info!("$ {:.2}\tStation Revenue", self.station_revenue);
        info!("$ {:.2}\tFleet Revenue", self.fleet_revenue);
    }
}

/// Counts state occupancy once per flush and accumulates distance per state from move events.
#[derive(Debug, Clone, Default)]
pub struct StatsHandler {
    state_count: BTreeMap<VehicleStateKind, u64>,
    vkt: BTreeMap<VehicleStateKind, Kilometers>,
    requests: u64,
    cancelled_requests: u64,
}

impl StatsHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn compile_stats(&self, sim: &SimulationState, env: &Environment) -> SummaryStats {
        let socs: Vec<Ratio> = sim
            .vehicles()
            .filter_map(|v| env.mechatronics_for(v).map(|m| m.fuel_source_soc(v)))
            .collect();
        let mean_final_soc = if socs.is_empty() {
            0.0
        } else {
            socs.iter().sum::<Ratio>() / socs.len() as f64
        };
        let requests_served_percent = if self.requests > 0 {
            1.0 - self.cancelled_requests as f64 / self.requests as f64
        } else {
            0.0
        };

        let total_state_count: u64 = self.state_count.values().sum();
        let mut vehicle_state: BTreeMap<VehicleStateKind, VehicleStateSummary> = BTreeMap::new();
        for (kind, count) in &self.state_count {
            vehicle_state.entry(*kind).or_default().observed_percent =
                *count as f64 / total_state_count.max(1) as f64;
        }
        for (kind, km) in &self.vkt {
            vehicle_state.entry(*kind).or_default().vkt = *km;
        }

        SummaryStats {
            mean_final_soc,
            requests_served_percent,
            total_vkt: self.vkt.values().sum(),
            station_revenue: sim.stations().map(|s| s.balance).sum(),
            fleet_revenue: sim.vehicles().map(|v| v.balance).sum(),
            final_vehicle_count: sim.vehicle_count(),
            vehicle_state,
        }
    }
}

impl ReportHandler for StatsHandler {
    fn handle(&mut self, reports: &[Report], sim: &SimulationState) {
        for vehicle in sim.vehicles() {
            *self.state_count.entry(vehicle.vehicle_state.kind()).or_insert(0) += 1;
        }
        for report in reports {
            match report {
                Report::VehicleMoveEvent {
                    vehicle_state,
                    distance_km,
                    ..
                } => *self.vkt.entry(*vehicle_state).or_insert(0.0) += distance_km,
                Report::AddRequestEvent { .. } => self.requests += 1,
                Report::CancelRequestEvent { .. } => self.cancelled_requests += 1,
                _ => {}
            }
        }
    }

    fn summary_stats(&self, sim: &SimulationState, env: &Environment) -> Option<SummaryStats> {
        Some(self.compile_stats(sim, env))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{mock_env, mock_sim, mock_vehicle_with_soc};

    fn add(id: &str) -> Report {
        Report::AddRequestEvent {
            sim_time: 0,
            request_id: id.into(),
            departure_time: 0,
            passengers: 1,
            fleet_id: String::new(),
            value: 5.0,
        }
    }

    #[test]
    fn compiles_served_percent_and_vkt() {
        let env = mock_env();
        let sim = mock_sim()
            .add_vehicle(mock_vehicle_with_soc("v1", 0.5))
            .and_then(|s| s.add_vehicle(mock_vehicle_with_soc("v2", 1.0)))
            .expect("vehicles");
        let mut handler = StatsHandler::new();
        let reports = vec![
            add("r1"),
            add("r2"),
            Report::CancelRequestEvent {
                sim_time: 60,
                request_id: "r2".into(),
                departure_time: 0,
                fleet_id: String::new(),
            },
            Report::VehicleMoveEvent {
                sim_time_start: 0,
                sim_time_end: 60,
                vehicle_id: "v1".into(),
                vehicle_state: VehicleStateKind::ServicingTrip,
                distance_km: 0.6,
                energy: -0.1,
                energy_units: "kilowatthour",
                geoid: String::new(),
            },
        ];
        handler.handle(&reports, &sim);
        let stats = handler.compile_stats(&sim, &env);
        assert!((stats.requests_served_percent - 0.5).abs() < 1e-12);
        assert!((stats.total_vkt - 0.6).abs() < 1e-12);
        assert!((stats.mean_final_soc - 0.75).abs() < 1e-9);
        assert_eq!(stats.final_vehicle_count, 2);
        let idle = stats.vehicle_state.get(&VehicleStateKind::Idle).expect("idle observed");
        assert_eq!(idle.observed_percent, 1.0);
    }

    #[test]
    fn no_requests_means_zero_served() {
        let env = mock_env();
        let sim = mock_sim();
        let stats = StatsHandler::new().compile_stats(&sim, &env);
        assert_eq!(stats.requests_served_percent, 0.0);
        assert_eq!(stats.mean_final_soc, 0.0);
    }
}
