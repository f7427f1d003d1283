//! Metrics extraction from finished runs.
//!
//! Flattens a run's [`SummaryStats`] into one row per run, tagged with the parameters that
//! produced it, ready for export.

use fleet_core::config::ChargingSearchType;
use fleet_core::reporting::SummaryStats;
use fleet_core::vehicle_state::VehicleStateKind;
use serde::Serialize;

use crate::parameters::ParameterSet;

/// States in which a vehicle drives without a passenger aboard.
const DEADHEAD_STATES: [VehicleStateKind; 5] = [
    VehicleStateKind::Repositioning,
    VehicleStateKind::DispatchTrip,
    VehicleStateKind::DispatchPoolingTrip,
    VehicleStateKind::DispatchStation,
    VehicleStateKind::DispatchBase,
];

const SERVICING_STATES: [VehicleStateKind; 2] =
    [VehicleStateKind::ServicingTrip, VehicleStateKind::ServicingPoolingTrip];

const CHARGING_STATES: [VehicleStateKind; 3] = [
    VehicleStateKind::ChargingStation,
    VehicleStateKind::ChargeQueueing,
    VehicleStateKind::ChargingBase,
];

/// Aggregated metrics from a single simulation run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulationResult {
    pub experiment_id: String,
    pub run_id: usize,
    pub seed: u64,
    pub num_vehicles: usize,
    pub num_requests: usize,
    pub num_stations: usize,
    pub charging_search_type: String,
    /// Mean state of charge across the fleet when the run ended.
    pub mean_final_soc: f64,
    /// Share of requests that were picked up.
    pub requests_served_percent: f64,
    pub total_vkt: f64,
    /// Kilometres driven with passengers aboard.
    pub servicing_vkt: f64,
    /// Kilometres driven empty: to pickups, stations, bases or repositioning.
    pub deadhead_vkt: f64,
    /// Share of vehicle-ticks spent charging or queueing to charge.
    pub charging_time_percent: f64,
    pub idle_time_percent: f64,
    pub station_revenue: f64,
    pub fleet_revenue: f64,
    pub final_vehicle_count: usize,
}

pub fn charging_search_label(search_type: ChargingSearchType) -> &'static str {
    match search_type {
        ChargingSearchType::NearestShortestQueue => "nearest_shortest_queue",
        ChargingSearchType::ShortestTimeToCharge => "shortest_time_to_charge",
    }
}

fn vkt_in(stats: &SummaryStats, states: &[VehicleStateKind]) -> f64 {
    states
        .iter()
        .filter_map(|s| stats.vehicle_state.get(s))
        .map(|summary| summary.vkt)
        .sum()
}

fn time_in(stats: &SummaryStats, states: &[VehicleStateKind]) -> f64 {
    states
        .iter()
        .filter_map(|s| stats.vehicle_state.get(s))
        .map(|summary| summary.observed_percent)
        .sum()
}

/// Build the result row for `param_set` from its run's summary.
pub fn extract_metrics(param_set: &ParameterSet, stats: &SummaryStats) -> SimulationResult {
    let params = &param_set.params;
    SimulationResult {
        experiment_id: param_set.experiment_id.clone(),
        run_id: param_set.run_id,
        seed: param_set.seed,
        num_vehicles: params.num_vehicles,
        num_requests: params.num_requests,
        num_stations: params.num_stations,
        charging_search_type: charging_search_label(params.dispatcher.charging_search_type).to_string(),
        mean_final_soc: stats.mean_final_soc,
        requests_served_percent: stats.requests_served_percent,
        total_vkt: stats.total_vkt,
        servicing_vkt: vkt_in(stats, &SERVICING_STATES),
        deadhead_vkt: vkt_in(stats, &DEADHEAD_STATES),
        charging_time_percent: time_in(stats, &CHARGING_STATES),
        idle_time_percent: time_in(stats, &[VehicleStateKind::Idle]),
        station_revenue: stats.station_revenue,
        fleet_revenue: stats.fleet_revenue,
        final_vehicle_count: stats.final_vehicle_count,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenario::ScenarioParams;
    use fleet_core::reporting::VehicleStateSummary;

    #[test]
    fn state_groups_are_summed() {
        let mut stats = SummaryStats {
            mean_final_soc: 0.6,
            requests_served_percent: 0.75,
            total_vkt: 30.0,
            final_vehicle_count: 3,
            ..SummaryStats::default()
        };
        let summary = |observed_percent, vkt| VehicleStateSummary { observed_percent, vkt };
        stats.vehicle_state.insert(VehicleStateKind::ServicingTrip, summary(0.3, 18.0));
        stats.vehicle_state.insert(VehicleStateKind::DispatchTrip, summary(0.1, 7.0));
        stats.vehicle_state.insert(VehicleStateKind::DispatchStation, summary(0.05, 5.0));
        stats.vehicle_state.insert(VehicleStateKind::ChargingStation, summary(0.2, 0.0));
        stats.vehicle_state.insert(VehicleStateKind::ChargeQueueing, summary(0.05, 0.0));
        stats.vehicle_state.insert(VehicleStateKind::Idle, summary(0.3, 0.0));

        let set = ParameterSet::new(ScenarioParams::default(), "exp".to_string(), 2, 9);
        let result = extract_metrics(&set, &stats);
        assert_eq!(result.run_id, 2);
        assert_eq!(result.seed, 9);
        assert_eq!(result.servicing_vkt, 18.0);
        assert_eq!(result.deadhead_vkt, 12.0);
        assert!((result.charging_time_percent - 0.25).abs() < 1e-12);
        assert_eq!(result.idle_time_percent, 0.3);
        assert_eq!(result.charging_search_type, "nearest_shortest_queue");
    }
}
