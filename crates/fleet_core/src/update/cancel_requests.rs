//! Cancels requests nobody picked up in time.

use tracing::error;

use crate::environment::Environment;
use crate::reporting::events;
use crate::simulation_state::SimulationState;
use crate::units::RequestId;

use super::SimulationUpdateFunction;

/// Removes requests once `departure_time + request_cancel_time_seconds` has passed.
#[derive(Debug, Clone, Copy, Default)]
pub struct CancelRequests;

impl SimulationUpdateFunction for CancelRequests {
    fn name(&self) -> &str {
        "cancel_requests"
    }

    fn update(&mut self, sim: &SimulationState, env: &Environment) -> SimulationState {
        let window = env.config.sim.request_cancel_time_seconds;
        let expired: Vec<RequestId> = sim
            .requests()
            .filter(|r| r.departure_time + window <= sim.sim_time)
            .map(|r| r.id.clone())
            .collect();

        expired.iter().fold(sim.clone(), |acc, request_id| {
            let Some(request) = acc.request(request_id) else {
                return acc;
            };
            let report = events::cancel_request_event(&acc, request);
            match acc.remove_request(request_id) {
                Ok(updated) => {
                    env.reporter.file_report(report);
                    updated
                }
                Err(e) => {
                    error!(request_id = %request_id, error = %e, "failed to cancel request");
                    acc
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{mock_env, mock_request, mock_sim_with, test_cell, test_cell_offset};

    #[test]
    fn requests_cancel_after_the_window() {
        let env = mock_env();
        let sim = mock_sim_with(
            vec![],
            vec![
                mock_request("r0", test_cell(), test_cell_offset(0.01, 0.0), 0, 1),
                mock_request("r1", test_cell(), test_cell_offset(0.01, 0.0), 300, 1),
            ],
            vec![],
            vec![],
        );
        let mut later = sim.clone();
        for _ in 0..10 {
            later = later.tick();
        }
        assert_eq!(later.sim_time, 600);

        let updated = CancelRequests.update(&later, &env);
        assert!(updated.request("r0").is_none());
        assert!(updated.request("r1").is_some());
        assert_eq!(env.reporter.pending(), 1);

        let untouched = CancelRequests.update(&sim, &env);
        assert_eq!(untouched.request_count(), 2);
    }
}
