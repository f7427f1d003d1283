//! Entity value types. Every mutation returns a new value.

pub mod base;
pub mod charger;
pub mod mechatronics;
pub mod membership;
pub mod request;
pub mod station;
pub mod vehicle;

pub use base::Base;
pub use charger::{Charger, EnergyType};
pub use mechatronics::{Bev, Ice, Mechatronics};
pub use membership::Membership;
pub use request::{Passenger, Request, RequestRateStructure};
pub use station::{ChargerState, Station};
pub use vehicle::Vehicle;
