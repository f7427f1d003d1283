//! Driver state: who is behind the wheel and whether they are working.
//!
//! Autonomous drivers are always available. Human drivers follow a schedule from the
//! environment; going off shift sends them home (charging on the way if needed), coming back on
//! shift makes them available to the dispatcher again. Each tick a driver may propose one
//! instruction for its vehicle, which overrides whatever the fleet generators proposed.

use serde::Serialize;
use tracing::warn;

use crate::environment::Environment;
use crate::error::{SimError, SimResult};
use crate::instruction::Instruction;
use crate::model::Vehicle;
use crate::reporting::events::driver_schedule_event;
use crate::simulation_state::SimulationState;
use crate::units::{BaseId, Kilometers, ScheduleId, VehicleId};
use crate::vehicle_state::VehicleState;

mod driver_instructions;

pub use driver_instructions::{
    av_charge_base_instruction, av_dispatch_base_instruction, human_charge_at_home, human_go_home,
    idle_if_at_soc_limit, look_for_requests,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HumanDriverAttributes {
    pub vehicle_id: VehicleId,
    pub schedule_id: ScheduleId,
    pub home_base_id: BaseId,
    pub allows_pooling: bool,
}

/// Range an off-shift driver must reach before heading home, if any.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct HumanUnavailableChargeParameters {
    pub remaining_range_target: Option<Kilometers>,
}

impl HumanUnavailableChargeParameters {
    /// Range to get home, plus range to reach a station tomorrow when home has no charger, plus
    /// the charging buffer. Only becomes a target when it exceeds the range left.
    pub fn build(vehicle: &Vehicle, home_base_id: &str, sim: &SimulationState, env: &Environment) -> Self {
        let (Some(base), Some(mechatronics)) = (sim.base(home_base_id), env.mechatronics_for(vehicle)) else {
            return Self::default();
        };
        let remaining_range = mechatronics.range_remaining_km(vehicle);
        let range_to_get_home = sim
            .road_network
            .distance_by_position_km(&vehicle.position, &base.position);
        let range_to_charger_tomorrow = match base.station_id {
            Some(_) => 0.0,
            None => {
                let search = crate::dispatcher::charging_search::ChargingSearch::from_env(
                    env,
                    env.config.dispatcher.ideal_fastcharge_soc_limit,
                );
                crate::dispatcher::charging_search::nearest_valid_station_distance(
                    sim,
                    env,
                    vehicle,
                    base.geoid(),
                    &search,
                )
            }
        };
        let total = range_to_get_home + range_to_charger_tomorrow + env.config.dispatcher.charging_range_km_threshold;
        Self {
            remaining_range_target: (total > remaining_range).then_some(total),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum DriverState {
    AutonomousAvailable {
        vehicle_id: VehicleId,
    },
    HumanAvailable {
        attributes: HumanDriverAttributes,
    },
    HumanUnavailable {
        attributes: HumanDriverAttributes,
        charge_params: HumanUnavailableChargeParameters,
    },
}

impl DriverState {
    pub fn autonomous(vehicle_id: impl Into<VehicleId>) -> Self {
        DriverState::AutonomousAvailable {
            vehicle_id: vehicle_id.into(),
        }
    }

    pub fn human(
        vehicle_id: impl Into<VehicleId>,
        schedule_id: impl Into<ScheduleId>,
        home_base_id: impl Into<BaseId>,
        allows_pooling: bool,
    ) -> Self {
        DriverState::HumanAvailable {
            attributes: HumanDriverAttributes {
                vehicle_id: vehicle_id.into(),
                schedule_id: schedule_id.into(),
                home_base_id: home_base_id.into(),
                allows_pooling,
            },
        }
    }

    /// An off-shift human driver with no charge target, as loaded before the first tick.
    pub fn human_unavailable(
        vehicle_id: impl Into<VehicleId>,
        schedule_id: impl Into<ScheduleId>,
        home_base_id: impl Into<BaseId>,
        allows_pooling: bool,
    ) -> Self {
        DriverState::HumanUnavailable {
            attributes: HumanDriverAttributes {
                vehicle_id: vehicle_id.into(),
                schedule_id: schedule_id.into(),
                home_base_id: home_base_id.into(),
                allows_pooling,
            },
            charge_params: HumanUnavailableChargeParameters::default(),
        }
    }

    pub fn vehicle_id(&self) -> &str {
        match self {
            DriverState::AutonomousAvailable { vehicle_id } => vehicle_id,
            DriverState::HumanAvailable { attributes } | DriverState::HumanUnavailable { attributes, .. } => {
                &attributes.vehicle_id
            }
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            DriverState::AutonomousAvailable { .. } => "AutonomousAvailable",
            DriverState::HumanAvailable { .. } => "HumanAvailable",
            DriverState::HumanUnavailable { .. } => "HumanUnavailable",
        }
    }

    pub fn autonomous_driver(&self) -> bool {
        matches!(self, DriverState::AutonomousAvailable { .. })
    }

    pub fn available(&self) -> bool {
        !matches!(self, DriverState::HumanUnavailable { .. })
    }

    pub fn allows_pooling(&self) -> bool {
        match self {
            DriverState::AutonomousAvailable { .. } => true,
            DriverState::HumanAvailable { attributes } | DriverState::HumanUnavailable { attributes, .. } => {
                attributes.allows_pooling
            }
        }
    }

    pub fn schedule_id(&self) -> Option<&ScheduleId> {
        match self {
            DriverState::AutonomousAvailable { .. } => None,
            DriverState::HumanAvailable { attributes } | DriverState::HumanUnavailable { attributes, .. } => {
                Some(&attributes.schedule_id)
            }
        }
    }

    pub fn home_base_id(&self) -> Option<&BaseId> {
        match self {
            DriverState::AutonomousAvailable { .. } => None,
            DriverState::HumanAvailable { attributes } | DriverState::HumanUnavailable { attributes, .. } => {
                Some(&attributes.home_base_id)
            }
        }
    }

    /// Follow the schedule. `Ok(None)` when nothing changes.
    pub fn update(&self, sim: &SimulationState, env: &Environment) -> SimResult<Option<SimulationState>> {
        match self {
            DriverState::AutonomousAvailable { .. } => Ok(None),
            DriverState::HumanAvailable { attributes } => {
                let on_shift = env
                    .schedule(&attributes.schedule_id)
                    .map_or(true, |s| s.is_on_shift(sim, &attributes.vehicle_id));
                if on_shift {
                    return Ok(None);
                }
                let vehicle = self.my_vehicle(sim)?;
                env.reporter.file_report(driver_schedule_event(sim, vehicle, false));
                let charge_params =
                    HumanUnavailableChargeParameters::build(vehicle, &attributes.home_base_id, sim, env);
                let next = DriverState::HumanUnavailable {
                    attributes: attributes.clone(),
                    charge_params,
                };
                sim.modify_vehicle(vehicle.modify_driver_state(next)).map(Some)
            }
            DriverState::HumanUnavailable { attributes, .. } => {
                let vehicle = self.my_vehicle(sim)?;
                let on_shift = match env.schedule(&attributes.schedule_id) {
                    Some(schedule) => schedule.is_on_shift(sim, &attributes.vehicle_id),
                    None => {
                        warn!(
                            vehicle_id = %attributes.vehicle_id,
                            schedule_id = %attributes.schedule_id,
                            "schedule not found, returning driver to shift"
                        );
                        true
                    }
                };
                if !on_shift {
                    return Ok(None);
                }
                env.reporter.file_report(driver_schedule_event(sim, vehicle, true));
                let next = DriverState::HumanAvailable {
                    attributes: attributes.clone(),
                };
                sim.modify_vehicle(vehicle.modify_driver_state(next)).map(Some)
            }
        }
    }

    fn my_vehicle<'a>(&self, sim: &'a SimulationState) -> SimResult<&'a Vehicle> {
        sim.vehicle(self.vehicle_id()).ok_or_else(|| {
            SimError::state(format!(
                "vehicle {} not found; context: update {} driver state",
                self.vehicle_id(),
                self.name()
            ))
        })
    }

    /// At most one instruction proposed by the driver for this tick.
    pub fn generate_instruction(&self, sim: &SimulationState, env: &Environment) -> Option<Instruction> {
        let Some(vehicle) = sim.vehicle(self.vehicle_id()) else {
            warn!(vehicle_id = %self.vehicle_id(), "vehicle not found for driver");
            return None;
        };
        match self {
            DriverState::AutonomousAvailable { .. } => match &vehicle.vehicle_state {
                VehicleState::ReserveBase(_) => av_charge_base_instruction(vehicle, sim, env),
                VehicleState::Idle(_) => av_dispatch_base_instruction(vehicle, sim, env),
                VehicleState::ChargingStation(_) => idle_if_at_soc_limit(vehicle, env),
                _ => None,
            },
            // available humans cruise toward the densest demand rather than a random cell
            DriverState::HumanAvailable { .. } => match &vehicle.vehicle_state {
                VehicleState::ReserveBase(_) | VehicleState::ChargingBase(_) => look_for_requests(vehicle, sim),
                VehicleState::ChargingStation(_) => idle_if_at_soc_limit(vehicle, env),
                VehicleState::Idle(idle) if idle.idle_duration > env.config.dispatcher.idle_time_out_seconds => {
                    look_for_requests(vehicle, sim)
                }
                _ => None,
            },
            DriverState::HumanUnavailable {
                attributes,
                charge_params,
            } => off_shift_instruction(vehicle, attributes, charge_params, sim, env),
        }
    }
}

fn off_shift_instruction(
    vehicle: &Vehicle,
    attributes: &HumanDriverAttributes,
    charge_params: &HumanUnavailableChargeParameters,
    sim: &SimulationState,
    env: &Environment,
) -> Option<Instruction> {
    let Some(home) = sim.base(&attributes.home_base_id) else {
        warn!(
            vehicle_id = %vehicle.id,
            base_id = %attributes.home_base_id,
            "home base not found for driver"
        );
        return None;
    };
    let Some(mechatronics) = env.mechatronics_for(vehicle) else {
        warn!(vehicle_id = %vehicle.id, mechatronics_id = %vehicle.mechatronics_id, "mechatronics not found");
        return None;
    };
    let state = &vehicle.vehicle_state;
    if matches!(state, VehicleState::OutOfService(_) | VehicleState::ServicingTrip(_)) {
        return None;
    }

    if home.geoid() != vehicle.geoid() {
        return match state {
            VehicleState::DispatchBase(_) => None,
            VehicleState::DispatchStation(_) | VehicleState::ChargingStation(_) => {
                let still_charging = charge_params
                    .remaining_range_target
                    .is_some_and(|target| mechatronics.range_remaining_km(vehicle) < target);
                if still_charging {
                    None
                } else {
                    Some(Instruction::dispatch_base(vehicle.id.clone(), home.id.clone()))
                }
            }
            _ => human_go_home(vehicle, home, sim, env),
        };
    }

    let not_full = mechatronics.fuel_source_soc(vehicle) < env.config.dispatcher.ideal_fastcharge_soc_limit;
    if not_full && home.station_id.is_some() && !matches!(state, VehicleState::ChargingBase(_)) {
        human_charge_at_home(vehicle, home, sim, env)
    } else if matches!(state, VehicleState::Idle(_)) {
        Some(Instruction::reserve_base(vehicle.id.clone(), home.id.clone()))
    } else {
        None
    }
}
