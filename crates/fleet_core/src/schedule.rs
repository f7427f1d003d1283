//! Driver shift schedules.

use crate::simulation_state::SimulationState;
use crate::units::{Seconds, SECONDS_IN_DAY};

/// Answers whether a vehicle's driver is on shift at the snapshot's time.
pub trait Schedule: Send + Sync {
    fn is_on_shift(&self, sim: &SimulationState, vehicle_id: &str) -> bool;
}

impl<F> Schedule for F
where
    F: Fn(&SimulationState, &str) -> bool + Send + Sync,
{
    fn is_on_shift(&self, sim: &SimulationState, vehicle_id: &str) -> bool {
        self(sim, vehicle_id)
    }
}

/// On shift between two seconds-of-day. A window whose end precedes its start wraps midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRangeSchedule {
    pub start_seconds_of_day: Seconds,
    pub end_seconds_of_day: Seconds,
}

impl TimeRangeSchedule {
    pub fn new(start_seconds_of_day: Seconds, end_seconds_of_day: Seconds) -> Self {
        Self {
            start_seconds_of_day: start_seconds_of_day % SECONDS_IN_DAY,
            end_seconds_of_day: end_seconds_of_day % SECONDS_IN_DAY,
        }
    }

    /// Parse `"HH:MM:SS"` bounds.
    pub fn from_clock_times(start: &str, end: &str) -> Option<Self> {
        Some(Self::new(parse_clock_time(start)?, parse_clock_time(end)?))
    }

    pub fn contains(&self, seconds_of_day: Seconds) -> bool {
        let t = seconds_of_day % SECONDS_IN_DAY;
        if self.start_seconds_of_day <= self.end_seconds_of_day {
            self.start_seconds_of_day <= t && t < self.end_seconds_of_day
        } else {
            t >= self.start_seconds_of_day || t < self.end_seconds_of_day
        }
    }
}

impl Schedule for TimeRangeSchedule {
    fn is_on_shift(&self, sim: &SimulationState, _vehicle_id: &str) -> bool {
        self.contains(sim.sim_time)
    }
}

fn parse_clock_time(value: &str) -> Option<Seconds> {
    let mut parts = value.trim().split(':');
    let h: Seconds = parts.next()?.parse().ok()?;
    let m: Seconds = parts.next().map_or(Some(0), |p| p.parse().ok())?;
    let s: Seconds = parts.next().map_or(Some(0), |p| p.parse().ok())?;
    if parts.next().is_some() || m >= 60 || s >= 60 || h > 24 {
        return None;
    }
    Some(h * 3600 + m * 60 + s)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn daytime_window() {
        let s = TimeRangeSchedule::from_clock_times("08:00:00", "17:00:00").expect("parse");
        assert!(!s.contains(7 * 3600));
        assert!(s.contains(8 * 3600));
        assert!(s.contains(12 * 3600 + SECONDS_IN_DAY));
        assert!(!s.contains(17 * 3600));
    }

    #[test]
    fn overnight_window_wraps() {
        let s = TimeRangeSchedule::new(22 * 3600, 6 * 3600);
        assert!(s.contains(23 * 3600));
        assert!(s.contains(3600));
        assert!(!s.contains(12 * 3600));
    }

    #[test]
    fn malformed_clock_times_are_rejected() {
        assert!(TimeRangeSchedule::from_clock_times("25:00", "10:00").is_none());
        assert!(TimeRangeSchedule::from_clock_times("10:61", "11:00").is_none());
        assert!(TimeRangeSchedule::from_clock_times("ten", "11:00").is_none());
    }
}
