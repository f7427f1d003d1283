use std::collections::HashMap;

use crate::error::ExperimentResult;
use crate::metrics::SimulationResult;
use crate::parameters::ParameterSet;
use crate::scenario::ScenarioParams;

const HEADER: [&str; 24] = [
    "experiment_id",
    "run_id",
    "seed",
    "num_vehicles",
    "num_requests",
    "num_stations",
    "num_bases",
    "ice_share",
    "human_driver_share",
    "pooling_share",
    "charging_search_type",
    "ideal_fastcharge_soc_limit",
    "end_time",
    "mean_final_soc",
    "requests_served_percent",
    "total_vkt",
    "servicing_vkt",
    "deadhead_vkt",
    "charging_time_percent",
    "idle_time_percent",
    "station_revenue",
    "fleet_revenue",
    "final_vehicle_count",
    "health_score",
];

/// Writes one row per result. Parameter columns come from the set with the same
/// `(experiment_id, run_id)` and are left blank when no set matches.
pub(crate) fn export_to_csv_impl(
    results: &[SimulationResult],
    parameter_sets: &[ParameterSet],
    health_scores: &[f64],
    file: std::fs::File,
) -> ExperimentResult<()> {
    let by_run: HashMap<(&str, usize), &ParameterSet> = parameter_sets
        .iter()
        .map(|set| ((set.experiment_id.as_str(), set.run_id), set))
        .collect();

    let mut wtr = csv::Writer::from_writer(file);
    wtr.write_record(HEADER)?;

    for (idx, result) in results.iter().enumerate() {
        let params = by_run
            .get(&(result.experiment_id.as_str(), result.run_id))
            .map(|set| &set.params);
        let param = |f: &dyn Fn(&ScenarioParams) -> String| params.map(f).unwrap_or_default();

        wtr.write_record([
            result.experiment_id.clone(),
            result.run_id.to_string(),
            result.seed.to_string(),
            result.num_vehicles.to_string(),
            result.num_requests.to_string(),
            result.num_stations.to_string(),
            param(&|p| p.num_bases.to_string()),
            param(&|p| p.ice_share.to_string()),
            param(&|p| p.human_driver_share.to_string()),
            param(&|p| p.pooling_share.to_string()),
            result.charging_search_type.clone(),
            param(&|p| p.dispatcher.ideal_fastcharge_soc_limit.to_string()),
            param(&|p| p.sim.end_time.to_string()),
            result.mean_final_soc.to_string(),
            result.requests_served_percent.to_string(),
            result.total_vkt.to_string(),
            result.servicing_vkt.to_string(),
            result.deadhead_vkt.to_string(),
            result.charging_time_percent.to_string(),
            result.idle_time_percent.to_string(),
            result.station_revenue.to_string(),
            result.fleet_revenue.to_string(),
            result.final_vehicle_count.to_string(),
            health_scores.get(idx).map(|s| s.to_string()).unwrap_or_default(),
        ])?;
    }

    wtr.flush()?;
    Ok(())
}
