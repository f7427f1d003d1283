//! Simulation runner: advances the clock one tick at a time until the end time.
//!
//! Each step applies the [`Update`] to the current snapshot, then flushes the reporter so
//! handlers see the reports filed during that tick alongside the resulting state.

use std::sync::Arc;

use tracing::{debug, info};

use crate::environment::Environment;
use crate::error::SetupError;
use crate::reporting::SummaryStats;
use crate::simulation_state::SimulationState;
use crate::update::Update;

/// Everything a run carries from one tick to the next.
#[derive(Debug)]
pub struct RunnerPayload {
    pub sim: SimulationState,
    pub env: Arc<Environment>,
    pub update: Update,
}

impl RunnerPayload {
    /// Checks setup-time invariants before the first tick: every vehicle's energy model must be
    /// registered.
    pub fn new(sim: SimulationState, env: Arc<Environment>, update: Update) -> Result<Self, SetupError> {
        for vehicle in sim.vehicles() {
            env.validate_vehicle(vehicle)?;
        }
        Ok(Self { sim, env, update })
    }

    pub fn is_finished(&self) -> bool {
        self.sim.sim_time >= self.env.config.sim.end_time
    }

    pub fn summary_stats(&self) -> Option<SummaryStats> {
        self.env.reporter.get_summary_stats(&self.sim, &self.env)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LocalSimulationRunner;

impl LocalSimulationRunner {
    /// Step until `sim_time` reaches the configured end time.
    pub fn run(payload: RunnerPayload) -> RunnerPayload {
        let start = payload.sim.sim_time;
        let end = payload.env.config.sim.end_time;
        info!(start, end, vehicles = payload.sim.vehicle_count(), "simulation started");

        let mut current = payload;
        let mut ticks: u64 = 0;
        while !current.is_finished() {
            current = Self::apply_step(current);
            ticks += 1;
        }

        info!(ticks, sim_time = current.sim.sim_time, "simulation finished");
        current
    }

    /// Apply one tick, or `None` once the end time is reached.
    pub fn step(payload: RunnerPayload) -> Option<RunnerPayload> {
        (!payload.is_finished()).then(|| Self::apply_step(payload))
    }

    /// Apply up to `n` ticks, stopping early at the end time.
    pub fn run_steps(payload: RunnerPayload, n: usize) -> RunnerPayload {
        let mut current = payload;
        for _ in 0..n {
            if current.is_finished() {
                break;
            }
            current = Self::apply_step(current);
        }
        current
    }

    fn apply_step(payload: RunnerPayload) -> RunnerPayload {
        let RunnerPayload { sim, env, mut update } = payload;
        let next = update.apply_update(&sim, &env);
        env.reporter.flush(&next);
        debug!(
            sim_time = next.sim_time,
            requests = next.request_count(),
            "step complete"
        );
        RunnerPayload { sim: next, env, update }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FleetConfig, SimConfig};
    use crate::reporting::StatsHandler;
    use crate::test_helpers::{mock_bev, mock_ice, mock_sim_with, mock_vehicle_with_soc};
    use crate::update::{ChargingPriceUpdate, StepSimulation};

    fn env(end_time: u64) -> Arc<Environment> {
        let config = FleetConfig {
            sim: SimConfig::default().with_end_time(end_time),
            ..FleetConfig::default()
        };
        Arc::new(
            Environment::new(config)
                .with_mechatronics(mock_bev())
                .with_mechatronics(mock_ice()),
        )
    }

    fn payload(end_time: u64) -> RunnerPayload {
        let sim = mock_sim_with(vec![mock_vehicle_with_soc("v1", 1.0)], vec![], vec![], vec![]);
        let update = Update::new(vec![Box::new(ChargingPriceUpdate::default())], StepSimulation::default());
        RunnerPayload::new(sim, env(end_time), update).expect("payload")
    }

    #[test]
    fn runs_until_the_end_time() {
        let done = LocalSimulationRunner::run(payload(600));
        assert_eq!(done.sim.sim_time, 600);
        assert!(LocalSimulationRunner::step(done).is_none());
    }

    #[test]
    fn run_steps_stops_early() {
        let partial = LocalSimulationRunner::run_steps(payload(600), 3);
        assert_eq!(partial.sim.sim_time, 180);
        let finished = LocalSimulationRunner::run_steps(partial, 100);
        assert_eq!(finished.sim.sim_time, 600);
    }

    #[test]
    fn unknown_energy_models_fail_setup() {
        let mut vehicle = mock_vehicle_with_soc("v1", 1.0);
        vehicle.mechatronics_id = "hovercraft".into();
        let sim = mock_sim_with(vec![vehicle], vec![], vec![], vec![]);
        let result = RunnerPayload::new(sim, env(600), Update::new(vec![], StepSimulation::default()));
        assert!(matches!(result, Err(SetupError::UnknownMechatronics { .. })));
    }

    #[test]
    fn summary_comes_from_the_stats_handler() {
        let p = payload(120);
        p.env.reporter.add_handler(Box::new(StatsHandler::new()));
        let done = LocalSimulationRunner::run(p);
        let stats = done.summary_stats().expect("stats");
        assert_eq!(stats.final_vehicle_count, 1);
        assert!(stats.mean_final_soc > 0.99);
    }
}
