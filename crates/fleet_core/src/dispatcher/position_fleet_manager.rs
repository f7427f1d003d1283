//! Keeps the number of vehicles in service in line with forecast demand.
//!
//! At every update interval the manager compares the count of active (Idle or Repositioning)
//! vehicles with the demand forecast. A shortfall pulls the fullest vehicles out of bases and
//! repositions them toward waiting requests; a surplus sends the emptiest active vehicles to the
//! nearest base with a free stall.

use std::cmp::Ordering;
use std::sync::Arc;

use tracing::debug;

use crate::dispatcher::InstructionGenerator;
use crate::driver_state::look_for_requests;
use crate::environment::Environment;
use crate::instruction::Instruction;
use crate::model::{Base, Vehicle};
use crate::simulation_state::SimulationState;
use crate::spatial::{distance_km_between_cells, nearest_entity};
use crate::units::{Kilometers, Seconds, SimTime};
use crate::vehicle_state::VehicleStateKind;

/// Demand looked ahead from the current tick.
const DEFAULT_FORECAST_HORIZON_SECONDS: Seconds = 30 * 60;

/// Expected number of new requests from `sim_time` on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForecastRow {
    pub sim_time: SimTime,
    pub requests: usize,
}

impl ForecastRow {
    pub fn new(sim_time: SimTime, requests: usize) -> Self {
        Self { sim_time, requests }
    }
}

/// Forward-only reader over a demand table.
///
/// Each forecast consumes the rows inside the horizon, so a row is counted once.
#[derive(Debug, Clone, PartialEq)]
pub struct DemandForecaster {
    rows: Arc<[ForecastRow]>,
    cursor: usize,
    horizon_seconds: Seconds,
}

impl DemandForecaster {
    pub fn new(mut rows: Vec<ForecastRow>) -> Self {
        rows.sort_by_key(|r| r.sim_time);
        Self {
            rows: rows.into(),
            cursor: 0,
            horizon_seconds: DEFAULT_FORECAST_HORIZON_SECONDS,
        }
    }

    pub fn with_horizon_seconds(mut self, seconds: Seconds) -> Self {
        self.horizon_seconds = seconds;
        self
    }

    /// Requests already waiting plus those expected within the horizon, and the advanced reader.
    pub fn forecast(&self, sim: &SimulationState) -> (Self, usize) {
        let horizon_end = sim.sim_time + self.horizon_seconds;
        let upcoming = self.rows[self.cursor..]
            .iter()
            .take_while(|r| r.sim_time < horizon_end)
            .count();
        let future_demand: usize = self.rows[self.cursor..self.cursor + upcoming]
            .iter()
            .map(|r| r.requests)
            .sum();
        let next = Self {
            cursor: self.cursor + upcoming,
            ..self.clone()
        };
        (next, sim.request_count() + future_demand)
    }

    pub fn remaining(&self) -> usize {
        self.rows.len() - self.cursor
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PositionFleetManager {
    pub forecaster: DemandForecaster,
    pub update_interval_seconds: Seconds,
    pub max_search_radius_km: Kilometers,
}

impl PositionFleetManager {
    pub fn new(forecaster: DemandForecaster, update_interval_seconds: Seconds, max_search_radius_km: Kilometers) -> Self {
        Self {
            forecaster,
            update_interval_seconds,
            max_search_radius_km,
        }
    }

    fn due(&self, sim: &SimulationState) -> bool {
        self.update_interval_seconds > 0 && sim.sim_time % self.update_interval_seconds == 0
    }
}

fn soc(vehicle: &Vehicle, env: &Environment) -> f64 {
    env.mechatronics_for(vehicle)
        .map(|m| m.fuel_source_soc(vehicle))
        .unwrap_or(0.0)
}

/// Vehicles matching `kinds`, by state of charge (ascending unless `fullest_first`), then id.
fn vehicles_by_soc<'a>(
    sim: &'a SimulationState,
    env: &Environment,
    kinds: &[VehicleStateKind],
    fullest_first: bool,
) -> Vec<&'a Vehicle> {
    let mut vehicles: Vec<(&Vehicle, f64)> = sim
        .vehicles()
        .filter(|v| kinds.contains(&v.vehicle_state.kind()))
        .map(|v| (v, soc(v, env)))
        .collect();
    vehicles.sort_by(|(a, a_soc), (b, b_soc)| {
        let by_soc = a_soc.partial_cmp(b_soc).unwrap_or(Ordering::Equal);
        let by_soc = if fullest_first { by_soc.reverse() } else { by_soc };
        by_soc.then_with(|| a.id.cmp(&b.id))
    });
    vehicles.into_iter().map(|(v, _)| v).collect()
}

/// Nearest base with a stall the vehicle may use, within `max_search_radius_km`.
fn return_to_base(vehicle: &Vehicle, sim: &SimulationState, max_search_radius_km: Kilometers) -> Option<Instruction> {
    let origin = vehicle.geoid();
    let base = nearest_entity(
        origin,
        sim.base_search_index(),
        sim.sim_h3_search_resolution,
        max_search_radius_km,
        |id| sim.base(id),
        |b: &&Base| {
            b.has_available_stall(&vehicle.membership)
                .then(|| distance_km_between_cells(origin, b.geoid()))
        },
    )?;
    Some(Instruction::dispatch_base(vehicle.id.clone(), base.id.clone()))
}

impl InstructionGenerator for PositionFleetManager {
    fn name(&self) -> &str {
        "position_fleet_manager"
    }

    fn generate_instructions(
        self: Arc<Self>,
        sim: &SimulationState,
        env: &Environment,
    ) -> (Arc<dyn InstructionGenerator>, Vec<Instruction>) {
        if !self.due(sim) {
            return (self, Vec::new());
        }
        let (forecaster, demand) = self.forecaster.forecast(sim);

        let active = vehicles_by_soc(
            sim,
            env,
            &[VehicleStateKind::Idle, VehicleStateKind::Repositioning],
            false,
        );
        let instructions: Vec<Instruction> = match active.len().cmp(&demand) {
            Ordering::Less => {
                let shortfall = demand - active.len();
                vehicles_by_soc(
                    sim,
                    env,
                    &[VehicleStateKind::ChargingBase, VehicleStateKind::ReserveBase],
                    true,
                )
                .into_iter()
                .filter_map(|v| look_for_requests(v, sim))
                .take(shortfall)
                .collect()
            }
            Ordering::Greater => {
                let surplus = active.len() - demand;
                active
                    .into_iter()
                    .filter_map(|v| return_to_base(v, sim, self.max_search_radius_km))
                    .take(surplus)
                    .collect()
            }
            Ordering::Equal => Vec::new(),
        };
        debug!(
            sim_time = sim.sim_time,
            demand,
            instructions = instructions.len(),
            "fleet positioning"
        );

        let updated = PositionFleetManager {
            forecaster,
            ..(*self).clone()
        };
        (Arc::new(updated), instructions)
    }
}
