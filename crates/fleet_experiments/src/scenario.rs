//! Seeded scenario generation.
//!
//! [`ScenarioParams`] describes a fleet, its charging infrastructure and a request stream inside
//! a bounding box. [`build_scenario`] turns it into a ready-to-run [`RunnerPayload`]. The same
//! params always produce the same payload: every random draw comes from one `StdRng` seeded with
//! `seed`, in a fixed order (stations, bases, vehicles, requests).

use std::sync::Arc;

use fleet_core::config::{DispatcherConfig, FleetConfig, SimConfig};
use fleet_core::driver_state::DriverState;
use fleet_core::environment::Environment;
use fleet_core::error::SetupError;
use fleet_core::model::charger::{DCFC, LEVEL_2};
use fleet_core::model::{Base, Bev, Charger, Ice, Mechatronics, Request, Station, Vehicle};
use fleet_core::reporting::StatsHandler;
use fleet_core::road_network::{EntityPosition, HaversineRoadNetwork, RoadNetwork};
use fleet_core::runner::RunnerPayload;
use fleet_core::schedule::TimeRangeSchedule;
use fleet_core::simulation_state::SimulationState;
use fleet_core::units::SimTime;
use fleet_core::update::{ChargingPriceUpdate, PriceRow, PriceTarget, Update};
use h3o::{CellIndex, LatLng, Resolution};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Default bounding box: San Francisco, California (approx).
const DEFAULT_LAT_MIN: f64 = 37.70;
const DEFAULT_LAT_MAX: f64 = 37.81;
const DEFAULT_LNG_MIN: f64 = -122.51;
const DEFAULT_LNG_MAX: f64 = -122.38;

/// Default request window: 2 hours.
const DEFAULT_REQUEST_WINDOW_SECONDS: u64 = 2 * 60 * 60;

pub const BEV_MECHATRONICS_ID: &str = "leaf_50";
pub const ICE_MECHATRONICS_ID: &str = "toyota_camry";

/// Shift windows handed out round-robin to human drivers.
const DAY_SHIFT: &str = "day_shift";
const NIGHT_SHIFT: &str = "night_shift";

/// DCFC price per kWh applied at every station from the start of the run.
const DEFAULT_DCFC_PRICE_KWH: f64 = 0.3;
const DEFAULT_LEVEL_2_PRICE_KWH: f64 = 0.15;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioParams {
    pub seed: u64,
    pub num_vehicles: usize,
    pub num_requests: usize,
    pub num_stations: usize,
    /// Each base gets a private Level 2 station at its location.
    pub num_bases: usize,
    pub dcfc_per_station: usize,
    pub level_2_per_station: usize,
    pub stalls_per_base: usize,
    /// Share of vehicles running on gasoline.
    pub ice_share: f64,
    /// Share of vehicles driven by scheduled human drivers. Needs at least one base.
    pub human_driver_share: f64,
    /// Share of requests willing to share a ride.
    pub pooling_share: f64,
    pub min_initial_soc: f64,
    pub max_initial_soc: f64,
    pub lat_min: f64,
    pub lat_max: f64,
    pub lng_min: f64,
    pub lng_max: f64,
    /// Requests depart uniformly within this many seconds of the start time.
    pub request_window_seconds: u64,
    pub sim: SimConfig,
    pub dispatcher: DispatcherConfig,
}

impl Default for ScenarioParams {
    fn default() -> Self {
        Self {
            seed: 0,
            num_vehicles: 50,
            num_requests: 500,
            num_stations: 10,
            num_bases: 4,
            dcfc_per_station: 4,
            level_2_per_station: 2,
            stalls_per_base: 20,
            ice_share: 0.0,
            human_driver_share: 0.0,
            pooling_share: 0.0,
            min_initial_soc: 0.5,
            max_initial_soc: 1.0,
            lat_min: DEFAULT_LAT_MIN,
            lat_max: DEFAULT_LAT_MAX,
            lng_min: DEFAULT_LNG_MIN,
            lng_max: DEFAULT_LNG_MAX,
            request_window_seconds: DEFAULT_REQUEST_WINDOW_SECONDS,
            sim: SimConfig::default().with_end_time(4 * 60 * 60),
            dispatcher: DispatcherConfig::default(),
        }
    }
}

impl ScenarioParams {
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_num_vehicles(mut self, n: usize) -> Self {
        self.num_vehicles = n;
        self
    }

    pub fn with_num_requests(mut self, n: usize) -> Self {
        self.num_requests = n;
        self
    }

    pub fn with_num_stations(mut self, n: usize) -> Self {
        self.num_stations = n;
        self
    }

    pub fn with_num_bases(mut self, n: usize) -> Self {
        self.num_bases = n;
        self
    }

    pub fn with_ice_share(mut self, share: f64) -> Self {
        self.ice_share = share;
        self
    }

    pub fn with_human_driver_share(mut self, share: f64) -> Self {
        self.human_driver_share = share;
        self
    }

    pub fn with_pooling_share(mut self, share: f64) -> Self {
        self.pooling_share = share;
        self
    }

    pub fn with_initial_soc(mut self, min: f64, max: f64) -> Self {
        self.min_initial_soc = min;
        self.max_initial_soc = max;
        self
    }

    pub fn with_bounds(mut self, lat_min: f64, lat_max: f64, lng_min: f64, lng_max: f64) -> Self {
        self.lat_min = lat_min;
        self.lat_max = lat_max;
        self.lng_min = lng_min;
        self.lng_max = lng_max;
        self
    }

    pub fn with_request_window_seconds(mut self, seconds: u64) -> Self {
        self.request_window_seconds = seconds;
        self
    }

    /// End the run `hours` after the start time.
    pub fn with_duration_hours(mut self, hours: u64) -> Self {
        self.sim.end_time = self.sim.start_time + hours * 60 * 60;
        self
    }

    pub fn with_sim_config(mut self, sim: SimConfig) -> Self {
        self.sim = sim;
        self
    }

    pub fn with_dispatcher_config(mut self, dispatcher: DispatcherConfig) -> Self {
        self.dispatcher = dispatcher;
        self
    }

    pub fn fleet_config(&self) -> FleetConfig {
        FleetConfig::default()
            .with_sim(self.sim.clone())
            .with_dispatcher(self.dispatcher.clone())
    }

    fn validate(&self) -> Result<(), SetupError> {
        let shares = [
            ("ice_share", self.ice_share),
            ("human_driver_share", self.human_driver_share),
            ("pooling_share", self.pooling_share),
            ("min_initial_soc", self.min_initial_soc),
            ("max_initial_soc", self.max_initial_soc),
        ];
        if let Some((name, value)) = shares.iter().find(|(_, v)| !(0.0..=1.0).contains(v)) {
            return Err(SetupError::Config(format!("{name} must be within [0, 1], got {value}")));
        }
        if self.min_initial_soc > self.max_initial_soc {
            return Err(SetupError::Config(format!(
                "min_initial_soc {} exceeds max_initial_soc {}",
                self.min_initial_soc, self.max_initial_soc
            )));
        }
        if self.lat_min >= self.lat_max || self.lng_min >= self.lng_max {
            return Err(SetupError::Config("bounding box is empty".into()));
        }
        if self.human_driver_share > 0.0 && self.num_bases == 0 {
            return Err(SetupError::Config("human drivers need at least one home base".into()));
        }
        Ok(())
    }
}

/// Energy models every generated vehicle may reference.
pub fn scenario_mechatronics() -> (Bev, Ice) {
    (
        Bev::new(BEV_MECHATRONICS_ID, 50.0, 0.8, 250.0, 50.0, 10.0),
        Ice::new(ICE_MECHATRONICS_ID, 15.0, 0.2, 30.0),
    )
}

struct CellSampler {
    rng: StdRng,
    lat_min: f64,
    lat_max: f64,
    lng_min: f64,
    lng_max: f64,
    resolution: Resolution,
}

impl CellSampler {
    fn new(params: &ScenarioParams, resolution: Resolution) -> Self {
        Self {
            rng: StdRng::seed_from_u64(params.seed),
            lat_min: params.lat_min,
            lat_max: params.lat_max,
            lng_min: params.lng_min,
            lng_max: params.lng_max,
            resolution,
        }
    }

    fn cell(&mut self) -> Result<CellIndex, SetupError> {
        let lat = self.rng.gen_range(self.lat_min..self.lat_max);
        let lng = self.rng.gen_range(self.lng_min..self.lng_max);
        LatLng::new(lat, lng)
            .map(|ll| ll.to_cell(self.resolution))
            .map_err(|e| SetupError::InvalidLocation {
                lat,
                lng,
                reason: e.to_string(),
            })
    }

    fn position(&mut self) -> Result<EntityPosition, SetupError> {
        let cell = self.cell()?;
        Ok(EntityPosition::new(cell.to_string(), cell))
    }
}

fn generate_stations(params: &ScenarioParams, sampler: &mut CellSampler) -> Result<Vec<Station>, SetupError> {
    (0..params.num_stations)
        .map(|i| {
            let mut station = Station::new(format!("s{i}"), sampler.position()?);
            if params.dcfc_per_station > 0 {
                station = station.with_chargers(Charger::electric(DCFC, 50.0), params.dcfc_per_station, true);
            }
            if params.level_2_per_station > 0 {
                station = station.with_chargers(Charger::electric(LEVEL_2, 7.2), params.level_2_per_station, true);
            }
            Ok(station)
        })
        .collect()
}

/// Bases with a private Level 2 station each, closed to on-shift drivers.
fn generate_bases(
    params: &ScenarioParams,
    sampler: &mut CellSampler,
) -> Result<(Vec<Base>, Vec<Station>), SetupError> {
    let mut bases = Vec::with_capacity(params.num_bases);
    let mut stations = Vec::with_capacity(params.num_bases);
    for i in 0..params.num_bases {
        let position = sampler.position()?;
        let station_id = format!("base_station_{i}");
        stations.push(
            Station::new(station_id.clone(), position.clone()).with_chargers(
                Charger::electric(LEVEL_2, 7.2),
                params.stalls_per_base.max(1),
                false,
            ),
        );
        bases.push(Base::new(format!("b{i}"), position, params.stalls_per_base).with_station(station_id));
    }
    Ok((bases, stations))
}

fn generate_vehicles(
    params: &ScenarioParams,
    sampler: &mut CellSampler,
    bev: &Bev,
    ice: &Ice,
) -> Result<Vec<Vehicle>, SetupError> {
    (0..params.num_vehicles)
        .map(|i| {
            let id = format!("v{i}");
            let position = sampler.position()?;
            let mechatronics: &dyn Mechatronics = if sampler.rng.gen_bool(params.ice_share) {
                ice
            } else {
                bev
            };
            let soc = if params.max_initial_soc > params.min_initial_soc {
                sampler.rng.gen_range(params.min_initial_soc..=params.max_initial_soc)
            } else {
                params.max_initial_soc
            };
            let vehicle = Vehicle::new(
                id.clone(),
                position,
                mechatronics.mechatronics_id().clone(),
                mechatronics.initial_energy(soc),
                4,
            );
            if sampler.rng.gen_bool(params.human_driver_share) {
                let shift = if i % 2 == 0 { DAY_SHIFT } else { NIGHT_SHIFT };
                let home = format!("b{}", i % params.num_bases);
                let allows_pooling = sampler.rng.gen_bool(params.pooling_share);
                Ok(vehicle.with_driver_state(DriverState::human(id, shift, home, allows_pooling)))
            } else {
                Ok(vehicle)
            }
        })
        .collect()
}

fn generate_requests(
    params: &ScenarioParams,
    sampler: &mut CellSampler,
    network: &dyn RoadNetwork,
) -> Result<Vec<Request>, SetupError> {
    let start = params.sim.start_time;
    (0..params.num_requests)
        .map(|i| {
            let origin = sampler.position()?;
            let destination = sampler.position()?;
            let departure: SimTime = start + sampler.rng.gen_range(0..params.request_window_seconds.max(1));
            let passengers = sampler.rng.gen_range(1..=2);
            let allows_pooling = sampler.rng.gen_bool(params.pooling_share);
            Ok(
                Request::new(format!("r{i}"), origin, destination, departure, passengers, allows_pooling)
                    .assign_value(&params.sim.rate_structure, network),
            )
        })
        .collect()
}

fn build_environment(params: &ScenarioParams, bev: Bev, ice: Ice) -> Environment {
    let env = Environment::new(params.fleet_config())
        .with_mechatronics(bev)
        .with_mechatronics(ice)
        .with_schedule(DAY_SHIFT, TimeRangeSchedule::new(6 * 3600, 18 * 3600))
        .with_schedule(NIGHT_SHIFT, TimeRangeSchedule::new(18 * 3600, 6 * 3600));
    env.reporter.add_handler(Box::new(StatsHandler::new()));
    env
}

fn default_prices() -> ChargingPriceUpdate {
    ChargingPriceUpdate::new(vec![
        PriceRow::new(0, PriceTarget::AllStations, DCFC, DEFAULT_DCFC_PRICE_KWH),
        PriceRow::new(0, PriceTarget::AllStations, LEVEL_2, DEFAULT_LEVEL_2_PRICE_KWH),
    ])
}

/// Generate the scenario described by `params`.
///
/// # Errors
///
/// Fails on invalid params, an invalid bounding box or entities the simulation refuses.
pub fn build_scenario(params: &ScenarioParams) -> Result<RunnerPayload, SetupError> {
    params.validate()?;
    let (location_res, search_res) = params.sim.resolutions()?;
    let network: Arc<dyn RoadNetwork> = Arc::new(HaversineRoadNetwork::new(location_res));
    let mut sampler = CellSampler::new(params, location_res);
    let (bev, ice) = scenario_mechatronics();

    let stations = generate_stations(params, &mut sampler)?;
    let (bases, base_stations) = generate_bases(params, &mut sampler)?;
    let vehicles = generate_vehicles(params, &mut sampler, &bev, &ice)?;
    let mut requests = generate_requests(params, &mut sampler, network.as_ref())?;
    requests.sort_by(|a, b| a.departure_time.cmp(&b.departure_time).then_with(|| a.id.cmp(&b.id)));

    let mut sim = SimulationState::new(
        Arc::clone(&network),
        params.sim.start_time,
        params.sim.timestep_duration_seconds,
        search_res,
    )?;
    for station in stations.into_iter().chain(base_stations) {
        sim = sim.add_station(station)?;
    }
    for base in bases {
        sim = sim.add_base(base)?;
    }
    for vehicle in vehicles {
        sim = sim.add_vehicle(vehicle)?;
    }
    debug!(
        seed = params.seed,
        vehicles = sim.vehicle_count(),
        requests = requests.len(),
        "scenario generated"
    );

    let env = Arc::new(build_environment(params, bev, ice));
    let update = Update::with_default_generators(&env.config, requests, default_prices());
    RunnerPayload::new(sim, env, update)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small() -> ScenarioParams {
        ScenarioParams::default()
            .with_num_vehicles(10)
            .with_num_requests(30)
            .with_num_stations(3)
            .with_num_bases(2)
    }

    #[test]
    fn same_seed_same_scenario() {
        let a = build_scenario(&small().with_seed(7)).expect("scenario");
        let b = build_scenario(&small().with_seed(7)).expect("scenario");
        let positions = |p: &RunnerPayload| p.sim.vehicles().map(|v| v.position.clone()).collect::<Vec<_>>();
        assert_eq!(positions(&a), positions(&b));

        let c = build_scenario(&small().with_seed(8)).expect("scenario");
        assert_ne!(positions(&a), positions(&c));
    }

    #[test]
    fn bases_bring_their_own_stations() {
        let payload = build_scenario(&small()).expect("scenario");
        assert_eq!(payload.sim.vehicle_count(), 10);
        assert_eq!(payload.sim.stations().count(), 5);
        let base = payload.sim.base("b0").expect("base");
        let station = base.station_id.as_deref().and_then(|id| payload.sim.station(id)).expect("station");
        assert!(!station.has_on_shift_access_charging());
    }

    #[test]
    fn human_drivers_need_bases() {
        let params = small().with_num_bases(0).with_human_driver_share(0.5);
        assert!(matches!(build_scenario(&params), Err(SetupError::Config(_))));
    }

    #[test]
    fn shares_are_bounded() {
        assert!(build_scenario(&small().with_ice_share(1.5)).is_err());
        assert!(build_scenario(&small().with_initial_soc(0.9, 0.2)).is_err());
    }
}
