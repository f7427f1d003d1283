use std::path::Path;
use std::process::{exit, Command, ExitStatus};

use clap::{Parser, Subcommand, ValueEnum};

// ── CLI definition ─────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "xtask",
    about = "Task runner for the fleet simulation workspace",
    long_about = "A unified CLI for running scenarios, parameter sweeps, benchmarks,\n\
                  and CI checks in the fleet simulation workspace."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one generated scenario and print its summary
    Run {
        #[arg(long, default_value_t = 42)]
        seed: u64,
        #[arg(long, default_value_t = 50)]
        vehicles: usize,
        #[arg(long, default_value_t = 500)]
        requests: usize,
    },
    /// Run a parameter sweep experiment
    Sweep {
        /// Named parameter space
        #[arg(long, default_value = "minimal")]
        space: String,
        /// CSV output path; a Parquet file is written next to it
        #[arg(long, default_value = "experiment_results.csv")]
        output: String,
    },
    /// Run the same-seed reproducibility tests
    Determinism,
    /// Run Criterion benchmarks
    Bench,
    /// Compare benchmarks: stash changes, create baseline, restore, compare
    BenchCompare,
    /// Run CI checks (fmt, clippy, tests, examples, benchmarks)
    Ci {
        /// Job to run
        #[arg(value_enum, default_value_t = CiJob::Check)]
        job: CiJob,
    },
    /// Run load tests (ignored tests in fleet_core)
    LoadTest,
}

#[derive(Clone, ValueEnum)]
enum CiJob {
    /// Formatting, clippy, and tests
    Check,
    /// Build and run example scenarios
    Examples,
    /// Run benchmarks
    Bench,
    /// Run check + examples + bench
    All,
}

// ── helpers ────────────────────────────────────────────────────────

fn step(label: &str) {
    eprintln!("\n=== {label} ===");
}

fn cargo(args: &[&str]) -> ExitStatus {
    eprintln!("+ cargo {}", args.join(" "));
    Command::new("cargo")
        .args(args)
        .status()
        .expect("failed to execute cargo")
}

fn git(args: &[&str]) -> ExitStatus {
    eprintln!("+ git {}", args.join(" "));
    Command::new("git")
        .args(args)
        .status()
        .expect("failed to execute git")
}

fn run_cargo(args: &[&str]) {
    let status = cargo(args);
    if !status.success() {
        exit(status.code().unwrap_or(1));
    }
}

fn run_git(args: &[&str]) {
    let status = git(args);
    if !status.success() {
        exit(status.code().unwrap_or(1));
    }
}

fn bench(extra: &[&str]) {
    let mut args = vec!["bench", "--package", "fleet_core", "--bench", "performance"];
    if !extra.is_empty() {
        args.push("--");
        args.extend_from_slice(extra);
    }
    run_cargo(&args);
}

fn scenario_run(seed: u64, vehicles: usize, requests: usize) {
    let (seed, vehicles, requests) = (seed.to_string(), vehicles.to_string(), requests.to_string());
    run_cargo(&[
        "run",
        "-p",
        "fleet_experiments",
        "--example",
        "scenario_run",
        "--release",
        "--",
        &seed,
        &vehicles,
        &requests,
    ]);
}

fn determinism() {
    step("Core determinism tests");
    run_cargo(&["test", "-p", "fleet_core", "--test", "integration_determinism_tests"]);

    step("Generated scenario determinism");
    run_cargo(&["test", "-p", "fleet_experiments", "determinism"]);
}

// ── CI jobs ────────────────────────────────────────────────────────

fn ci_check() {
    step("Check formatting");
    run_cargo(&["fmt", "--all", "--", "--check"]);

    step("Clippy");
    run_cargo(&[
        "clippy",
        "--all-targets",
        "--all-features",
        "--",
        "-D",
        "warnings",
    ]);

    step("Test fleet_core");
    run_cargo(&["test", "-p", "fleet_core"]);

    step("Test fleet_experiments");
    run_cargo(&["test", "-p", "fleet_experiments"]);
}

fn ci_examples() {
    step("Run scenario_run (50 vehicles, 500 requests)");
    scenario_run(42, 50, 500);

    step("Run parameter_sweep (minimal space)");
    run_cargo(&[
        "run",
        "-p",
        "fleet_experiments",
        "--example",
        "parameter_sweep",
        "--release",
        "--",
        "minimal",
        "target/ci/minimal_sweep.csv",
    ]);
}

fn ci_bench() {
    step("Run benchmarks");
    bench(&[]);
}

// ── main ───────────────────────────────────────────────────────────

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            seed,
            vehicles,
            requests,
        } => scenario_run(seed, vehicles, requests),
        Commands::Sweep { space, output } => {
            run_cargo(&[
                "run",
                "-p",
                "fleet_experiments",
                "--example",
                "parameter_sweep",
                "--release",
                "--",
                &space,
                &output,
            ]);
        }
        Commands::Determinism => determinism(),
        Commands::Bench => bench(&[]),
        Commands::BenchCompare => {
            let baseline_dir = Path::new("target/criterion");
            if baseline_dir.exists() {
                step("Removing existing benchmark data");
                std::fs::remove_dir_all(baseline_dir).expect("failed to remove target/criterion");
            }

            step("Stashing current changes");
            run_git(&[
                "stash",
                "push",
                "-m",
                "Temporary stash for benchmark comparison",
            ]);

            step("Running benchmark to create baseline");
            bench(&["--save-baseline", "main"]);

            step("Reapplying changes");
            run_git(&["stash", "pop"]);

            step("Running benchmark comparing against baseline");
            bench(&["--baseline", "main"]);

            eprintln!("\nDone! Check the output above to see performance comparison.");
        }
        Commands::Ci { job } => {
            match job {
                CiJob::Check => ci_check(),
                CiJob::Examples => ci_examples(),
                CiJob::Bench => ci_bench(),
                CiJob::All => {
                    ci_check();
                    ci_examples();
                    ci_bench();
                }
            }
            eprintln!("\nCI job passed.");
        }
        Commands::LoadTest => {
            run_cargo(&[
                "test",
                "-p",
                "fleet_core",
                "--test",
                "load_tests",
                "--release",
                "--",
                "--ignored",
            ]);
        }
    }
}
