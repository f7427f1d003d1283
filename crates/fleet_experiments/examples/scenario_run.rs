//! Example: run one generated scenario and print its summary.
//!
//! Usage: `cargo run -p fleet_experiments --example scenario_run -- [seed] [vehicles] [requests]`

use fleet_core::runner::LocalSimulationRunner;
use fleet_core::vehicle_state::VehicleStateKind;
use fleet_experiments::{build_scenario, ScenarioParams};
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let mut args = std::env::args().skip(1);
    let seed: u64 = args.next().map(|s| s.parse()).transpose()?.unwrap_or(42);
    let vehicles: usize = args.next().map(|s| s.parse()).transpose()?.unwrap_or(50);
    let requests: usize = args.next().map(|s| s.parse()).transpose()?.unwrap_or(500);

    let params = ScenarioParams::default()
        .with_seed(seed)
        .with_num_vehicles(vehicles)
        .with_num_requests(requests)
        .with_human_driver_share(0.25)
        .with_pooling_share(0.2);

    let finished = LocalSimulationRunner::run(build_scenario(&params)?);
    let stats = finished.summary_stats().ok_or("scenario has no stats handler")?;

    println!("=== Summary (seed {seed}) ===");
    println!("Vehicles: {}", stats.final_vehicle_count);
    println!("Requests served: {:.1}%", stats.requests_served_percent * 100.0);
    println!("Mean final SOC: {:.2}", stats.mean_final_soc);
    println!("Total VKT: {:.1}", stats.total_vkt);
    println!("Fleet revenue: ${:.2}", stats.fleet_revenue);
    println!("Station revenue: ${:.2}", stats.station_revenue);
    println!("\n{:<22} {:>9} {:>9}", "state", "time %", "vkt");
    for (kind, summary) in &stats.vehicle_state {
        if *kind == VehicleStateKind::OutOfService && summary.observed_percent == 0.0 {
            continue;
        }
        println!("{:<22} {:>8.1}% {:>9.1}", format!("{kind:?}"), summary.observed_percent * 100.0, summary.vkt);
    }

    Ok(())
}
