//! Identifier aliases, unit aliases, and unit conversion constants.
//!
//! Simulation time is whole seconds. Distances are kilometres unless a name says otherwise.

pub type VehicleId = String;
pub type RequestId = String;
pub type StationId = String;
pub type BaseId = String;
pub type ChargerId = String;
pub type MechatronicsId = String;
pub type ScheduleId = String;
pub type MembershipId = String;
pub type PassengerId = String;
pub type LinkId = String;

/// Seconds since the start of the simulated epoch.
pub type SimTime = u64;
pub type Seconds = u64;

pub type Kilometers = f64;
pub type Kmph = f64;
pub type Ratio = f64;
pub type Currency = f64;
pub type KwH = f64;
pub type Kw = f64;

pub const SECONDS_TO_HOURS: f64 = 1.0 / 3600.0;
pub const HOURS_TO_SECONDS: f64 = 3600.0;
pub const KM_TO_MILE: f64 = 0.621371;
pub const MILE_TO_KM: f64 = 1.609344;
pub const WH_TO_KWH: f64 = 0.001;

/// Seconds in one day, used by time-of-day schedules.
pub const SECONDS_IN_DAY: u64 = 86_400;

/// Travel time in whole-or-fractional seconds for a distance at a speed.
pub fn travel_time_seconds(distance_km: Kilometers, speed_kmph: Kmph) -> f64 {
    if speed_kmph <= 0.0 {
        return f64::INFINITY;
    }
    distance_km / speed_kmph * HOURS_TO_SECONDS
}
