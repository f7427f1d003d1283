//! Simulation and dispatcher configuration.
//!
//! Plain structs with `Default` impls and `with_*` builders. Both serialize so experiment
//! parameter sets can be written alongside their results.

use h3o::Resolution;
use serde::{Deserialize, Serialize};

use crate::error::SetupError;
use crate::model::RequestRateStructure;
use crate::units::{Kilometers, Ratio, SimTime, Seconds};
use crate::vehicle_state::VehicleStateKind;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimConfig {
    pub timestep_duration_seconds: Seconds,
    pub start_time: SimTime,
    pub end_time: SimTime,
    pub sim_h3_resolution: u8,
    pub sim_h3_search_resolution: u8,
    pub request_cancel_time_seconds: Seconds,
    pub rate_structure: RequestRateStructure,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            timestep_duration_seconds: 60,
            start_time: 0,
            end_time: 86_400,
            sim_h3_resolution: 15,
            sim_h3_search_resolution: 7,
            request_cancel_time_seconds: 600,
            rate_structure: RequestRateStructure::default(),
        }
    }
}

impl SimConfig {
    pub fn with_timestep_duration_seconds(mut self, seconds: Seconds) -> Self {
        self.timestep_duration_seconds = seconds;
        self
    }

    pub fn with_start_time(mut self, start_time: SimTime) -> Self {
        self.start_time = start_time;
        self
    }

    pub fn with_end_time(mut self, end_time: SimTime) -> Self {
        self.end_time = end_time;
        self
    }

    pub fn with_h3_resolutions(mut self, location: u8, search: u8) -> Self {
        self.sim_h3_resolution = location;
        self.sim_h3_search_resolution = search;
        self
    }

    pub fn with_request_cancel_time_seconds(mut self, seconds: Seconds) -> Self {
        self.request_cancel_time_seconds = seconds;
        self
    }

    pub fn with_rate_structure(mut self, rate_structure: RequestRateStructure) -> Self {
        self.rate_structure = rate_structure;
        self
    }

    pub fn validate(&self) -> Result<(), SetupError> {
        if self.timestep_duration_seconds == 0 {
            return Err(SetupError::Config("timestep_duration_seconds must be positive".into()));
        }
        if self.end_time < self.start_time {
            return Err(SetupError::Config(format!(
                "end_time {} is before start_time {}",
                self.end_time, self.start_time
            )));
        }
        if self.sim_h3_resolution > 15 {
            return Err(SetupError::Config(format!(
                "invalid sim_h3_resolution {}",
                self.sim_h3_resolution
            )));
        }
        if self.sim_h3_search_resolution >= self.sim_h3_resolution {
            return Err(SetupError::Config(format!(
                "search resolution {} must be coarser than location resolution {}",
                self.sim_h3_search_resolution, self.sim_h3_resolution
            )));
        }
        Ok(())
    }

    /// Validated `(location, search)` H3 resolutions.
    pub fn resolutions(&self) -> Result<(Resolution, Resolution), SetupError> {
        self.validate()?;
        let parse = |res: u8| {
            Resolution::try_from(res).map_err(|e| SetupError::Config(format!("invalid H3 resolution {res}: {e}")))
        };
        Ok((parse(self.sim_h3_resolution)?, parse(self.sim_h3_search_resolution)?))
    }
}

/// How the charging search ranks candidate chargers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ChargingSearchType {
    /// Grid distance inflated by the queue length per plug.
    #[default]
    NearestShortestQueue,
    /// Drive time, simulated queue wait and charge duration.
    ShortestTimeToCharge,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatcherConfig {
    pub default_update_interval_seconds: Seconds,
    pub matching_range_km_threshold: Kilometers,
    pub charging_range_km_threshold: Kilometers,
    pub charging_range_km_soft_threshold: Kilometers,
    pub base_charging_range_km_threshold: Kilometers,
    pub ideal_fastcharge_soc_limit: Ratio,
    pub max_search_radius_km: Kilometers,
    pub charging_search_type: ChargingSearchType,
    pub human_driver_off_shift_charge_target: Ratio,
    pub idle_time_out_seconds: Seconds,
    pub valid_dispatch_states: Vec<VehicleStateKind>,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            default_update_interval_seconds: 600,
            matching_range_km_threshold: 20.0,
            charging_range_km_threshold: 20.0,
            charging_range_km_soft_threshold: 50.0,
            base_charging_range_km_threshold: 100.0,
            ideal_fastcharge_soc_limit: 0.8,
            max_search_radius_km: 100.0,
            charging_search_type: ChargingSearchType::default(),
            human_driver_off_shift_charge_target: 1.0,
            idle_time_out_seconds: 1800,
            valid_dispatch_states: vec![
                VehicleStateKind::Idle,
                VehicleStateKind::Repositioning,
                VehicleStateKind::DispatchBase,
                VehicleStateKind::ChargingBase,
                VehicleStateKind::ReserveBase,
            ],
        }
    }
}

impl DispatcherConfig {
    pub fn with_default_update_interval_seconds(mut self, seconds: Seconds) -> Self {
        self.default_update_interval_seconds = seconds;
        self
    }

    pub fn with_matching_range_km_threshold(mut self, km: Kilometers) -> Self {
        self.matching_range_km_threshold = km;
        self
    }

    pub fn with_charging_thresholds(mut self, hard_km: Kilometers, soft_km: Kilometers) -> Self {
        self.charging_range_km_threshold = hard_km;
        self.charging_range_km_soft_threshold = soft_km;
        self
    }

    pub fn with_base_charging_range_km_threshold(mut self, km: Kilometers) -> Self {
        self.base_charging_range_km_threshold = km;
        self
    }

    pub fn with_ideal_fastcharge_soc_limit(mut self, soc: Ratio) -> Self {
        self.ideal_fastcharge_soc_limit = soc;
        self
    }

    pub fn with_max_search_radius_km(mut self, km: Kilometers) -> Self {
        self.max_search_radius_km = km;
        self
    }

    pub fn with_charging_search_type(mut self, search_type: ChargingSearchType) -> Self {
        self.charging_search_type = search_type;
        self
    }

    pub fn with_idle_time_out_seconds(mut self, seconds: Seconds) -> Self {
        self.idle_time_out_seconds = seconds;
        self
    }

    pub fn with_valid_dispatch_states(mut self, states: Vec<VehicleStateKind>) -> Self {
        self.valid_dispatch_states = states;
        self
    }

    pub fn is_valid_dispatch_state(&self, kind: VehicleStateKind) -> bool {
        self.valid_dispatch_states.contains(&kind)
    }
}

/// Both configuration sections.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FleetConfig {
    pub sim: SimConfig,
    pub dispatcher: DispatcherConfig,
}

impl FleetConfig {
    pub fn with_sim(mut self, sim: SimConfig) -> Self {
        self.sim = sim;
        self
    }

    pub fn with_dispatcher(mut self, dispatcher: DispatcherConfig) -> Self {
        self.dispatcher = dispatcher;
        self
    }
}
