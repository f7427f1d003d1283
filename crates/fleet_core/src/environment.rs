//! The read-only run environment: configuration, energy models, charger types, driver schedules,
//! fleet ids and the reporter. Built once before the first tick.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use crate::config::FleetConfig;
use crate::error::SetupError;
use crate::model::{Charger, Mechatronics, Vehicle};
use crate::reporting::Reporter;
use crate::schedule::Schedule;
use crate::units::{ChargerId, MechatronicsId, MembershipId, ScheduleId};

pub struct Environment {
    pub config: FleetConfig,
    pub mechatronics: BTreeMap<MechatronicsId, Arc<dyn Mechatronics>>,
    pub chargers: BTreeMap<ChargerId, Charger>,
    pub schedules: BTreeMap<ScheduleId, Arc<dyn Schedule>>,
    pub fleet_ids: BTreeSet<MembershipId>,
    pub reporter: Reporter,
}

impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Environment")
            .field("config", &self.config)
            .field("mechatronics", &self.mechatronics.keys().collect::<Vec<_>>())
            .field("chargers", &self.chargers.keys().collect::<Vec<_>>())
            .field("schedules", &self.schedules.keys().collect::<Vec<_>>())
            .field("fleet_ids", &self.fleet_ids)
            .field("reporter", &self.reporter)
            .finish()
    }
}

impl Environment {
    /// Environment with the standard charger types and no energy models.
    pub fn new(config: FleetConfig) -> Self {
        Self {
            config,
            mechatronics: BTreeMap::new(),
            chargers: Charger::standard_chargers()
                .into_iter()
                .map(|c| (c.id.clone(), c))
                .collect(),
            schedules: BTreeMap::new(),
            fleet_ids: BTreeSet::new(),
            reporter: Reporter::new(),
        }
    }

    pub fn with_mechatronics(mut self, mechatronics: impl Mechatronics + 'static) -> Self {
        self.mechatronics
            .insert(mechatronics.mechatronics_id().clone(), Arc::new(mechatronics));
        self
    }

    pub fn with_charger(mut self, charger: Charger) -> Self {
        self.chargers.insert(charger.id.clone(), charger);
        self
    }

    pub fn with_schedule(mut self, schedule_id: impl Into<ScheduleId>, schedule: impl Schedule + 'static) -> Self {
        self.schedules.insert(schedule_id.into(), Arc::new(schedule));
        self
    }

    pub fn with_fleet_id(mut self, fleet_id: impl Into<MembershipId>) -> Self {
        self.fleet_ids.insert(fleet_id.into());
        self
    }

    pub fn with_reporter(mut self, reporter: Reporter) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn mechatronics_for(&self, vehicle: &Vehicle) -> Option<&dyn Mechatronics> {
        self.mechatronics.get(&vehicle.mechatronics_id).map(|m| m.as_ref())
    }

    pub fn charger(&self, charger_id: &str) -> Option<&Charger> {
        self.chargers.get(charger_id)
    }

    pub fn schedule(&self, schedule_id: &str) -> Option<&dyn Schedule> {
        self.schedules.get(schedule_id).map(|s| s.as_ref())
    }

    /// Setup-time check that a vehicle's energy model exists.
    pub fn validate_vehicle(&self, vehicle: &Vehicle) -> Result<(), SetupError> {
        if self.mechatronics.contains_key(&vehicle.mechatronics_id) {
            Ok(())
        } else {
            Err(SetupError::UnknownMechatronics {
                vehicle_id: vehicle.id.clone(),
                mechatronics_id: vehicle.mechatronics_id.clone(),
            })
        }
    }

    /// Setup-time check that every charger id is known.
    pub fn validate_charger(&self, charger_id: &str) -> Result<&Charger, SetupError> {
        self.chargers
            .get(charger_id)
            .ok_or_else(|| SetupError::UnknownCharger(charger_id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::charger::DCFC;
    use crate::test_helpers::{mock_env, mock_vehicle_with_soc};

    #[test]
    fn unknown_mechatronics_is_a_setup_error() {
        let env = mock_env();
        let known = mock_vehicle_with_soc("v1", 1.0);
        assert!(env.validate_vehicle(&known).is_ok());

        let mut unknown = known.clone();
        unknown.mechatronics_id = "hovercraft".into();
        let err = env.validate_vehicle(&unknown).expect_err("unknown");
        assert!(err.to_string().contains("hovercraft"));
    }

    #[test]
    fn standard_chargers_are_registered() {
        let env = Environment::new(FleetConfig::default());
        assert!(env.validate_charger(DCFC).is_ok());
        assert!(env.validate_charger("warp").is_err());
    }
}
