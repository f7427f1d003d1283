//! Instructions: immutable per-vehicle commands produced by the dispatcher, fleet managers and
//! drivers each tick.
//!
//! Applying an instruction only validates it and builds the target state, returning an
//! [`InstructionResult`]. The step engine performs the actual exit/enter transition after all
//! instructions for the tick have been applied.

use h3o::CellIndex;
use serde::Serialize;

use crate::environment::Environment;
use crate::error::{SimError, SimResult};
use crate::model::Vehicle;
use crate::road_network::cell_serde;
use crate::simulation_state::SimulationState;
use crate::units::{BaseId, ChargerId, RequestId, StationId, VehicleId};
use crate::vehicle_state::{
    ChargingBase, ChargingStation, DispatchBase, DispatchPoolingTrip, DispatchStation, DispatchTrip, Idle,
    Repositioning, ReserveBase, TripStop, VehicleState,
};

pub mod pooling;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "instruction", rename_all = "snake_case")]
pub enum Instruction {
    Idle {
        vehicle_id: VehicleId,
    },
    DispatchTrip {
        vehicle_id: VehicleId,
        request_id: RequestId,
    },
    DispatchPoolingTrip {
        vehicle_id: VehicleId,
        trip_plan: Vec<TripStop>,
    },
    DispatchStation {
        vehicle_id: VehicleId,
        station_id: StationId,
        charger_id: ChargerId,
    },
    ChargeStation {
        vehicle_id: VehicleId,
        station_id: StationId,
        charger_id: ChargerId,
    },
    ChargeBase {
        vehicle_id: VehicleId,
        base_id: BaseId,
        charger_id: ChargerId,
    },
    DispatchBase {
        vehicle_id: VehicleId,
        base_id: BaseId,
    },
    Reposition {
        vehicle_id: VehicleId,
        #[serde(with = "cell_serde")]
        destination: CellIndex,
    },
    ReserveBase {
        vehicle_id: VehicleId,
        base_id: BaseId,
    },
}

/// The transition an applied instruction asks for.
#[derive(Debug, Clone, PartialEq)]
pub struct InstructionResult {
    pub prev: VehicleState,
    pub next: VehicleState,
}

impl Instruction {
    pub fn idle(vehicle_id: impl Into<VehicleId>) -> Self {
        Instruction::Idle {
            vehicle_id: vehicle_id.into(),
        }
    }

    pub fn dispatch_trip(vehicle_id: impl Into<VehicleId>, request_id: impl Into<RequestId>) -> Self {
        Instruction::DispatchTrip {
            vehicle_id: vehicle_id.into(),
            request_id: request_id.into(),
        }
    }

    pub fn dispatch_pooling_trip(vehicle_id: impl Into<VehicleId>, trip_plan: Vec<TripStop>) -> Self {
        Instruction::DispatchPoolingTrip {
            vehicle_id: vehicle_id.into(),
            trip_plan,
        }
    }

    pub fn dispatch_station(
        vehicle_id: impl Into<VehicleId>,
        station_id: impl Into<StationId>,
        charger_id: impl Into<ChargerId>,
    ) -> Self {
        Instruction::DispatchStation {
            vehicle_id: vehicle_id.into(),
            station_id: station_id.into(),
            charger_id: charger_id.into(),
        }
    }

    pub fn charge_station(
        vehicle_id: impl Into<VehicleId>,
        station_id: impl Into<StationId>,
        charger_id: impl Into<ChargerId>,
    ) -> Self {
        Instruction::ChargeStation {
            vehicle_id: vehicle_id.into(),
            station_id: station_id.into(),
            charger_id: charger_id.into(),
        }
    }

    pub fn charge_base(
        vehicle_id: impl Into<VehicleId>,
        base_id: impl Into<BaseId>,
        charger_id: impl Into<ChargerId>,
    ) -> Self {
        Instruction::ChargeBase {
            vehicle_id: vehicle_id.into(),
            base_id: base_id.into(),
            charger_id: charger_id.into(),
        }
    }

    pub fn dispatch_base(vehicle_id: impl Into<VehicleId>, base_id: impl Into<BaseId>) -> Self {
        Instruction::DispatchBase {
            vehicle_id: vehicle_id.into(),
            base_id: base_id.into(),
        }
    }

    pub fn reposition(vehicle_id: impl Into<VehicleId>, destination: CellIndex) -> Self {
        Instruction::Reposition {
            vehicle_id: vehicle_id.into(),
            destination,
        }
    }

    pub fn reserve_base(vehicle_id: impl Into<VehicleId>, base_id: impl Into<BaseId>) -> Self {
        Instruction::ReserveBase {
            vehicle_id: vehicle_id.into(),
            base_id: base_id.into(),
        }
    }

    pub fn vehicle_id(&self) -> &str {
        match self {
            Instruction::Idle { vehicle_id }
            | Instruction::DispatchTrip { vehicle_id, .. }
            | Instruction::DispatchPoolingTrip { vehicle_id, .. }
            | Instruction::DispatchStation { vehicle_id, .. }
            | Instruction::ChargeStation { vehicle_id, .. }
            | Instruction::ChargeBase { vehicle_id, .. }
            | Instruction::DispatchBase { vehicle_id, .. }
            | Instruction::Reposition { vehicle_id, .. }
            | Instruction::ReserveBase { vehicle_id, .. } => vehicle_id,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Instruction::Idle { .. } => "IdleInstruction",
            Instruction::DispatchTrip { .. } => "DispatchTripInstruction",
            Instruction::DispatchPoolingTrip { .. } => "DispatchPoolingTripInstruction",
            Instruction::DispatchStation { .. } => "DispatchStationInstruction",
            Instruction::ChargeStation { .. } => "ChargeStationInstruction",
            Instruction::ChargeBase { .. } => "ChargeBaseInstruction",
            Instruction::DispatchBase { .. } => "DispatchBaseInstruction",
            Instruction::Reposition { .. } => "RepositionInstruction",
            Instruction::ReserveBase { .. } => "ReserveBaseInstruction",
        }
    }

    /// Validate against `sim` and build the state this instruction moves its vehicle into.
    pub fn apply(&self, sim: &SimulationState, env: &Environment) -> SimResult<InstructionResult> {
        let vehicle = sim.vehicle(self.vehicle_id()).ok_or_else(|| {
            SimError::state(format!(
                "vehicle {} not found applying {}",
                self.vehicle_id(),
                self.name()
            ))
        })?;
        let next = self.next_state(vehicle, sim, env)?;
        Ok(InstructionResult {
            prev: vehicle.vehicle_state.clone(),
            next,
        })
    }

    fn next_state(&self, vehicle: &Vehicle, sim: &SimulationState, env: &Environment) -> SimResult<VehicleState> {
        let road_network = &sim.road_network;
        let state: VehicleState = match self {
            Instruction::Idle { vehicle_id } => Idle::build(vehicle_id.clone()).into(),
            Instruction::DispatchTrip { vehicle_id, request_id } => {
                let request = sim.request(request_id).ok_or_else(|| {
                    SimError::state(format!("request {request_id} not found for vehicle {vehicle_id}"))
                })?;
                let route = road_network.route(&vehicle.position, &request.origin_position);
                DispatchTrip::build(vehicle_id.clone(), request_id.clone(), route).into()
            }
            Instruction::DispatchPoolingTrip { vehicle_id, trip_plan } => {
                let carried = pooling::validate_trip_plan(sim, vehicle, trip_plan)?;
                let route = pooling::route_to_first_stop(sim, vehicle, trip_plan, &carried.boarded_requests)?;
                DispatchPoolingTrip::build(
                    vehicle_id.clone(),
                    trip_plan.clone(),
                    route,
                    carried.boarded_requests,
                    carried.departure_times,
                    carried.num_passengers,
                )
                .into()
            }
            Instruction::DispatchStation {
                vehicle_id,
                station_id,
                charger_id,
            } => {
                known_charger(env, charger_id)?;
                let station = sim.station(station_id).ok_or_else(|| {
                    SimError::state(format!("station {station_id} not found for vehicle {vehicle_id}"))
                })?;
                let route = road_network.route(&vehicle.position, &station.position);
                DispatchStation::build(vehicle_id.clone(), station_id.clone(), charger_id.clone(), route).into()
            }
            Instruction::ChargeStation {
                vehicle_id,
                station_id,
                charger_id,
            } => {
                known_charger(env, charger_id)?;
                ChargingStation::build(vehicle_id.clone(), station_id.clone(), charger_id.clone()).into()
            }
            Instruction::ChargeBase {
                vehicle_id,
                base_id,
                charger_id,
            } => {
                known_charger(env, charger_id)?;
                ChargingBase::build(vehicle_id.clone(), base_id.clone(), charger_id.clone()).into()
            }
            Instruction::DispatchBase { vehicle_id, base_id } => {
                let base = sim.base(base_id).ok_or_else(|| {
                    SimError::state(format!("base {base_id} not found for vehicle {vehicle_id}"))
                })?;
                let route = road_network.route(&vehicle.position, &base.position);
                DispatchBase::build(vehicle_id.clone(), base_id.clone(), route).into()
            }
            Instruction::Reposition {
                vehicle_id,
                destination,
            } => {
                let position = road_network.position_from_geoid(*destination).ok_or_else(|| {
                    SimError::instruction(format!(
                        "cannot reposition vehicle {vehicle_id} to {destination}, not on the road network"
                    ))
                })?;
                let route = road_network.route(&vehicle.position, &position);
                Repositioning::build(vehicle_id.clone(), route).into()
            }
            Instruction::ReserveBase { vehicle_id, base_id } => {
                ReserveBase::build(vehicle_id.clone(), base_id.clone()).into()
            }
        };
        Ok(state)
    }
}

fn known_charger(env: &Environment, charger_id: &str) -> SimResult<()> {
    match env.charger(charger_id) {
        Some(_) => Ok(()),
        None => Err(SimError::instruction(format!("unknown charger {charger_id}"))),
    }
}
