//! Injects requests from a pre-loaded stream as the clock reaches their departure times.

use std::collections::VecDeque;

use tracing::{error, warn};

use crate::environment::Environment;
use crate::model::Request;
use crate::reporting::events;
use crate::simulation_state::SimulationState;

use super::SimulationUpdateFunction;

#[derive(Debug, Clone, Default)]
pub struct UpdateRequests {
    pending: VecDeque<Request>,
}

impl UpdateRequests {
    /// Requests are injected in departure time order, ties by id.
    pub fn new(mut requests: Vec<Request>) -> Self {
        requests.sort_by(|a, b| a.departure_time.cmp(&b.departure_time).then_with(|| a.id.cmp(&b.id)));
        Self {
            pending: requests.into(),
        }
    }

    pub fn remaining(&self) -> usize {
        self.pending.len()
    }

    fn admit(sim: SimulationState, request: Request, env: &Environment) -> SimulationState {
        let cancel_time = request.departure_time + env.config.sim.request_cancel_time_seconds;
        if cancel_time <= sim.sim_time {
            warn!(
                request_id = %request.id,
                cancel_time,
                sim_time = sim.sim_time,
                "request would already be cancelled, not added"
            );
            return sim;
        }
        if !env.fleet_ids.is_empty() && request.membership.is_public() {
            warn!(request_id = %request.id, "request is missing a fleet membership, not added");
            return sim;
        }
        if env.fleet_ids.is_empty() && !request.membership.is_public() {
            warn!(request_id = %request.id, "request has a membership but no fleets are configured, not added");
            return sim;
        }

        let priced = request.assign_value(&env.config.sim.rate_structure, sim.road_network.as_ref());
        match sim.add_request(priced) {
            Ok(updated) => {
                if let Some(added) = updated.request(&request.id) {
                    env.reporter.file_report(events::add_request_event(&updated, added));
                }
                updated
            }
            Err(e) => {
                error!(request_id = %request.id, error = %e, "failed to add request");
                sim
            }
        }
    }
}

impl SimulationUpdateFunction for UpdateRequests {
    fn name(&self) -> &str {
        "update_requests"
    }

    fn update(&mut self, sim: &SimulationState, env: &Environment) -> SimulationState {
        let mut updated = sim.clone();
        while self
            .pending
            .front()
            .is_some_and(|r| r.departure_time <= sim.sim_time)
        {
            if let Some(request) = self.pending.pop_front() {
                updated = Self::admit(updated, request, env);
            }
        }
        updated
    }
}
