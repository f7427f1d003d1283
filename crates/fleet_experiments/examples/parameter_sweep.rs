//! Example: parameter sweep over a named space.
//!
//! Usage: `cargo run -p fleet_experiments --example parameter_sweep -- [space] [output.csv]`
//!
//! Spaces: comprehensive, charging_search, supply_demand, driver_mix, minimal (default).
//! Set `RUST_LOG=fleet_experiments=debug` for per-run logging.

use fleet_experiments::parameter_spaces::space_by_name;
use fleet_experiments::{
    export_to_csv, export_to_parquet, find_best_parameters, find_best_result_index, run_parallel_experiments,
    HealthWeights,
};
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let mut args = std::env::args().skip(1);
    let space_name = args.next().unwrap_or_else(|| "minimal".to_string());
    let output = args.next().unwrap_or_else(|| "experiment_results.csv".to_string());

    let space = space_by_name(&space_name).ok_or_else(|| format!("unknown parameter space '{space_name}'"))?;
    let parameter_sets = space.generate();
    println!("Running {} simulations from '{space_name}'...", parameter_sets.len());

    let results = run_parallel_experiments(parameter_sets.clone(), None)?;
    println!("Completed {} simulations", results.len());

    let weights = HealthWeights::default();
    let best_idx = find_best_result_index(&results, &weights).ok_or("no results to analyze")?;
    let best = &results[best_idx];
    println!("\n=== Best Run ({} / run {}) ===", best.experiment_id, best.run_id);
    println!("Requests served: {:.1}%", best.requests_served_percent * 100.0);
    println!("Fleet revenue: ${:.2}", best.fleet_revenue);
    println!("Total VKT: {:.1} (deadhead {:.1})", best.total_vkt, best.deadhead_vkt);
    println!("Mean final SOC: {:.2}", best.mean_final_soc);

    if let Some(set) = find_best_parameters(&results, &parameter_sets, &weights) {
        println!("\n=== Best Parameters ===");
        println!("Vehicles: {}", set.params.num_vehicles);
        println!("Requests: {}", set.params.num_requests);
        println!("Stations: {}", set.params.num_stations);
        println!("Charging search: {}", best.charging_search_type);
        println!("Fast charge SOC limit: {:.2}", set.params.dispatcher.ideal_fastcharge_soc_limit);
        println!("Human driver share: {:.2}", set.params.human_driver_share);
    }

    export_to_csv(&results, &parameter_sets, &weights, &output)?;
    println!("\nExported to {output}");
    let parquet_path = std::path::Path::new(&output).with_extension("parquet");
    export_to_parquet(&results, &weights, &parquet_path)?;
    println!("Exported to {}", parquet_path.display());

    Ok(())
}
