//! Error taxonomy.
//!
//! - [`SimError`]: recoverable, per-entity errors raised while stepping. The step engine logs
//!   them and continues with the rest of the fleet.
//! - [`SetupError`]: fatal errors raised while building a scenario, before the first tick.
//!
//! Operations that may be inapplicable without being wrong return `SimResult<Option<T>>`,
//! where `Ok(None)` means "nothing to do right now".

use thiserror::Error;

use crate::units::{MechatronicsId, VehicleId};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimError {
    /// A referenced entity is missing or inconsistent.
    #[error("simulation state error: {0}")]
    SimulationState(String),

    /// An illegal enter/exit between two vehicle states.
    #[error("state transition error from {prev} to {next}: {message}")]
    StateTransition {
        message: String,
        prev: &'static str,
        next: &'static str,
    },

    /// An instruction's preconditions were violated.
    #[error("instruction error: {0}")]
    Instruction(String),
}

impl SimError {
    pub fn state(msg: impl Into<String>) -> Self {
        SimError::SimulationState(msg.into())
    }

    pub fn instruction(msg: impl Into<String>) -> Self {
        SimError::Instruction(msg.into())
    }

    pub fn transition(msg: impl Into<String>, prev: &'static str, next: &'static str) -> Self {
        SimError::StateTransition {
            message: msg.into(),
            prev,
            next,
        }
    }
}

pub type SimResult<T> = Result<T, SimError>;

#[derive(Debug, Error)]
pub enum SetupError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("vehicle {vehicle_id} references unknown mechatronics {mechatronics_id}")]
    UnknownMechatronics {
        vehicle_id: VehicleId,
        mechatronics_id: MechatronicsId,
    },

    #[error("unknown charger {0}")]
    UnknownCharger(String),

    #[error("invalid location ({lat}, {lng}): {reason}")]
    InvalidLocation { lat: f64, lng: f64, reason: String },

    #[error("failed to add entity during setup: {0}")]
    Entity(#[from] SimError),
}
