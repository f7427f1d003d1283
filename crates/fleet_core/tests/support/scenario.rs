#![allow(dead_code)]

use std::sync::Arc;

use fleet_core::config::FleetConfig;
use fleet_core::dispatcher::InstructionGenerator;
use fleet_core::environment::Environment;
use fleet_core::model::{Base, Request, Station, Vehicle};
use fleet_core::reporting::{MemoryHandler, ReportType, StatsHandler};
use fleet_core::runner::RunnerPayload;
use fleet_core::schedule::TimeRangeSchedule;
use fleet_core::simulation_state::SimulationState;
use fleet_core::test_helpers::{mock_bev, mock_ice, mock_sim};
use fleet_core::update::{default_instruction_generators, ChargingPriceUpdate, Update};

/// Builder for end-to-end runs on the straight-line network with the mock energy models.
pub struct ScenarioBuilder {
    config: FleetConfig,
    vehicles: Vec<Vehicle>,
    stations: Vec<Station>,
    bases: Vec<Base>,
    initial_requests: Vec<Request>,
    request_stream: Vec<Request>,
    schedules: Vec<(String, TimeRangeSchedule)>,
    generators: Option<Vec<Arc<dyn InstructionGenerator>>>,
    report_types: Vec<ReportType>,
}

impl Default for ScenarioBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ScenarioBuilder {
    pub fn new() -> Self {
        Self {
            config: FleetConfig::default(),
            vehicles: Vec::new(),
            stations: Vec::new(),
            bases: Vec::new(),
            initial_requests: Vec::new(),
            request_stream: Vec::new(),
            schedules: Vec::new(),
            generators: None,
            report_types: Vec::new(),
        }
    }

    pub fn with_config(mut self, config: FleetConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_end_time(mut self, end_time: u64) -> Self {
        self.config.sim = self.config.sim.clone().with_end_time(end_time);
        self
    }

    pub fn with_vehicle(mut self, vehicle: Vehicle) -> Self {
        self.vehicles.push(vehicle);
        self
    }

    pub fn with_station(mut self, station: Station) -> Self {
        self.stations.push(station);
        self
    }

    pub fn with_base(mut self, base: Base) -> Self {
        self.bases.push(base);
        self
    }

    /// A request already waiting when the run starts.
    pub fn with_request(mut self, request: Request) -> Self {
        self.initial_requests.push(request);
        self
    }

    /// A request injected when the clock reaches its departure time.
    pub fn with_streamed_request(mut self, request: Request) -> Self {
        self.request_stream.push(request);
        self
    }

    pub fn with_schedule(mut self, id: &str, schedule: TimeRangeSchedule) -> Self {
        self.schedules.push((id.to_string(), schedule));
        self
    }

    pub fn with_generators(mut self, generators: Vec<Arc<dyn InstructionGenerator>>) -> Self {
        self.generators = Some(generators);
        self
    }

    pub fn with_reports(mut self, report_types: impl IntoIterator<Item = ReportType>) -> Self {
        self.report_types.extend(report_types);
        self
    }

    pub fn build_env(&self) -> Arc<Environment> {
        let mut env = Environment::new(self.config.clone())
            .with_mechatronics(mock_bev())
            .with_mechatronics(mock_ice());
        for (id, schedule) in &self.schedules {
            env = env.with_schedule(id.clone(), *schedule);
        }
        env.reporter.add_handler(Box::new(StatsHandler::new()));
        if !self.report_types.is_empty() {
            env.reporter
                .add_handler(Box::new(MemoryHandler::new(self.report_types.clone())));
        }
        Arc::new(env)
    }

    pub fn build_sim(&self) -> SimulationState {
        let mut sim = mock_sim();
        for station in &self.stations {
            sim = sim.add_station(station.clone()).expect("station");
        }
        for base in &self.bases {
            sim = sim.add_base(base.clone()).expect("base");
        }
        for vehicle in &self.vehicles {
            sim = sim.add_vehicle(vehicle.clone()).expect("vehicle");
        }
        for request in &self.initial_requests {
            sim = sim.add_request(request.clone()).expect("request");
        }
        sim
    }

    pub fn build(self) -> RunnerPayload {
        let env = self.build_env();
        let sim = self.build_sim();
        let generators = self
            .generators
            .clone()
            .unwrap_or_else(|| default_instruction_generators(&self.config));
        let update = Update::build(self.request_stream, ChargingPriceUpdate::default(), generators);
        RunnerPayload::new(sim, env, update).expect("scenario setup")
    }
}
