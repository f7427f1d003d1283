//! Vehicle state machine.
//!
//! Every vehicle is in exactly one [`VehicleState`]. Each state implements the same contract
//! ([`VehicleStateOps`]):
//!
//! - **`enter`**: validate preconditions and install the state on the vehicle. `Ok(None)` means
//!   the transition is not possible right now, which is not an error.
//! - **`exit`**: release anything the state holds (a stall, a plug, a queue slot, a request
//!   assignment). Missing entities are logged, never errors.
//! - **`update`**: once per tick. If the state's task is finished it transitions to its default
//!   next state and runs one `perform_update` of that state, otherwise it runs its own.
//!
//! At most one default transition happens per `update` call.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::environment::Environment;
use crate::error::SimResult;
use crate::simulation_state::SimulationState;
use crate::units::Seconds;

mod charge_queueing;
mod charging_base;
mod charging_station;
mod dispatch_base;
mod dispatch_station;
mod dispatch_trip;
mod idle;
pub mod ops;
mod out_of_service;
pub mod pooling;
mod repositioning;
mod reserve_base;
mod servicing_trip;

pub use charge_queueing::ChargeQueueing;
pub use charging_base::ChargingBase;
pub use charging_station::ChargingStation;
pub use dispatch_base::DispatchBase;
pub use dispatch_station::DispatchStation;
pub use dispatch_trip::DispatchTrip;
pub use idle::Idle;
pub use out_of_service::OutOfService;
pub use pooling::{DispatchPoolingTrip, ServicingPoolingTrip, TripPhase, TripStop};
pub use repositioning::Repositioning;
pub use reserve_base::ReserveBase;
pub use servicing_trip::ServicingTrip;

/// Instance id of a freshly built state. [`SimulationState`] replaces it with the next id from
/// its own counter when the state is installed on a vehicle, so ids depend only on the run.
pub const UNASSIGNED_INSTANCE_ID: u64 = 0;

/// State labels, used in configuration and reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum VehicleStateKind {
    Idle,
    Repositioning,
    DispatchTrip,
    ServicingTrip,
    DispatchPoolingTrip,
    ServicingPoolingTrip,
    DispatchStation,
    ChargingStation,
    ChargeQueueing,
    DispatchBase,
    ChargingBase,
    ReserveBase,
    OutOfService,
}

impl VehicleStateKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            VehicleStateKind::Idle => "Idle",
            VehicleStateKind::Repositioning => "Repositioning",
            VehicleStateKind::DispatchTrip => "DispatchTrip",
            VehicleStateKind::ServicingTrip => "ServicingTrip",
            VehicleStateKind::DispatchPoolingTrip => "DispatchPoolingTrip",
            VehicleStateKind::ServicingPoolingTrip => "ServicingPoolingTrip",
            VehicleStateKind::DispatchStation => "DispatchStation",
            VehicleStateKind::ChargingStation => "ChargingStation",
            VehicleStateKind::ChargeQueueing => "ChargeQueueing",
            VehicleStateKind::DispatchBase => "DispatchBase",
            VehicleStateKind::ChargingBase => "ChargingBase",
            VehicleStateKind::ReserveBase => "ReserveBase",
            VehicleStateKind::OutOfService => "OutOfService",
        }
    }

    /// States that carry passengers.
    pub fn is_servicing(&self) -> bool {
        matches!(
            self,
            VehicleStateKind::ServicingTrip | VehicleStateKind::ServicingPoolingTrip
        )
    }

    /// States that keep drawing on the energy reservoir while the vehicle waits or drives.
    fn drains_energy(&self) -> bool {
        !matches!(
            self,
            VehicleStateKind::OutOfService
                | VehicleStateKind::ChargingStation
                | VehicleStateKind::ChargingBase
        )
    }
}

impl fmt::Display for VehicleStateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The contract every state implements.
pub trait VehicleStateOps {
    const KIND: VehicleStateKind;

    fn vehicle_id(&self) -> &str;

    fn instance_id(&self) -> u64;

    fn enter(&self, sim: &SimulationState, env: &Environment) -> SimResult<Option<SimulationState>>;

    fn exit(
        &self,
        next: &VehicleState,
        sim: &SimulationState,
        env: &Environment,
    ) -> SimResult<Option<SimulationState>>;

    fn has_reached_terminal_state_condition(&self, sim: &SimulationState, env: &Environment) -> bool;

    /// The state to move to once the terminal condition holds. `Ok(None)` means stay.
    fn default_terminal_state(
        &self,
        sim: &SimulationState,
        env: &Environment,
    ) -> SimResult<Option<VehicleState>>;

    fn perform_update(&self, sim: &SimulationState, env: &Environment) -> SimResult<Option<SimulationState>>;
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum VehicleState {
    Idle(Idle),
    Repositioning(Repositioning),
    DispatchTrip(DispatchTrip),
    ServicingTrip(ServicingTrip),
    DispatchPoolingTrip(DispatchPoolingTrip),
    ServicingPoolingTrip(ServicingPoolingTrip),
    DispatchStation(DispatchStation),
    ChargingStation(ChargingStation),
    ChargeQueueing(ChargeQueueing),
    DispatchBase(DispatchBase),
    ChargingBase(ChargingBase),
    ReserveBase(ReserveBase),
    OutOfService(OutOfService),
}

macro_rules! dispatch {
    ($self:expr, $s:ident => $body:expr) => {
        match $self {
            VehicleState::Idle($s) => $body,
            VehicleState::Repositioning($s) => $body,
            VehicleState::DispatchTrip($s) => $body,
            VehicleState::ServicingTrip($s) => $body,
            VehicleState::DispatchPoolingTrip($s) => $body,
            VehicleState::ServicingPoolingTrip($s) => $body,
            VehicleState::DispatchStation($s) => $body,
            VehicleState::ChargingStation($s) => $body,
            VehicleState::ChargeQueueing($s) => $body,
            VehicleState::DispatchBase($s) => $body,
            VehicleState::ChargingBase($s) => $body,
            VehicleState::ReserveBase($s) => $body,
            VehicleState::OutOfService($s) => $body,
        }
    };
}

macro_rules! impl_from_state {
    ($($variant:ident),*) => {
        $(
            impl From<$variant> for VehicleState {
                fn from(state: $variant) -> Self {
                    VehicleState::$variant(state)
                }
            }
        )*
    };
}

impl_from_state!(
    Idle,
    Repositioning,
    DispatchTrip,
    ServicingTrip,
    DispatchPoolingTrip,
    ServicingPoolingTrip,
    DispatchStation,
    ChargingStation,
    ChargeQueueing,
    DispatchBase,
    ChargingBase,
    ReserveBase,
    OutOfService
);

fn kind_of<S: VehicleStateOps>(_: &S) -> VehicleStateKind {
    S::KIND
}

impl VehicleState {
    pub fn kind(&self) -> VehicleStateKind {
        dispatch!(self, s => kind_of(s))
    }

    pub fn vehicle_id(&self) -> &str {
        dispatch!(self, s => s.vehicle_id())
    }

    pub fn instance_id(&self) -> u64 {
        dispatch!(self, s => s.instance_id())
    }

    pub fn with_instance_id(mut self, instance_id: u64) -> Self {
        dispatch!(&mut self, s => s.instance_id = instance_id);
        self
    }

    pub fn enter(&self, sim: &SimulationState, env: &Environment) -> SimResult<Option<SimulationState>> {
        dispatch!(self, s => s.enter(sim, env))
    }

    pub fn exit(
        &self,
        next: &VehicleState,
        sim: &SimulationState,
        env: &Environment,
    ) -> SimResult<Option<SimulationState>> {
        dispatch!(self, s => s.exit(next, sim, env))
    }

    pub fn has_reached_terminal_state_condition(&self, sim: &SimulationState, env: &Environment) -> bool {
        dispatch!(self, s => s.has_reached_terminal_state_condition(sim, env))
    }

    pub fn default_terminal_state(
        &self,
        sim: &SimulationState,
        env: &Environment,
    ) -> SimResult<Option<VehicleState>> {
        dispatch!(self, s => s.default_terminal_state(sim, env))
    }

    pub fn perform_update(&self, sim: &SimulationState, env: &Environment) -> SimResult<Option<SimulationState>> {
        dispatch!(self, s => s.perform_update(sim, env))
    }

    /// Per-tick update. A vehicle that ran dry in a state that draws energy is forced out of
    /// service before anything else happens.
    pub fn update(&self, sim: &SimulationState, env: &Environment) -> SimResult<Option<SimulationState>> {
        if self.kind().drains_energy() && self.vehicle_is_empty(sim, env)? {
            return self.force_out_of_service(sim, env);
        }
        ops::default_update(self, sim, env)
    }

    fn vehicle_is_empty(&self, sim: &SimulationState, env: &Environment) -> SimResult<bool> {
        let vehicle = ops::get_vehicle(sim, self.vehicle_id())?;
        let mechatronics = ops::get_mechatronics(env, vehicle)?;
        Ok(mechatronics.is_empty(vehicle))
    }

    fn force_out_of_service(&self, sim: &SimulationState, env: &Environment) -> SimResult<Option<SimulationState>> {
        let next = VehicleState::OutOfService(OutOfService::build(self.vehicle_id()));
        let exited = match self.exit(&next, sim, env)? {
            Some(exited) => exited,
            None => {
                warn!(
                    vehicle_id = %self.vehicle_id(),
                    state = %self.kind(),
                    "vehicle ran out of energy in a state that refuses to exit, forcing out of service"
                );
                sim.clone()
            }
        };
        next.enter(&exited, env)
    }

    /// Seconds spent idle, for Idle vehicles.
    pub fn idle_duration(&self) -> Option<Seconds> {
        match self {
            VehicleState::Idle(idle) => Some(idle.idle_duration),
            _ => None,
        }
    }
}
