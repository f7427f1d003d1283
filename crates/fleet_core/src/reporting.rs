//! Event reporting.
//!
//! State machine code files typed [`Report`]s with the environment's [`Reporter`] as things
//! happen. The step engine calls [`Reporter::flush`] once per tick, which hands the buffered
//! reports (plus the post-step snapshot) to every registered [`ReportHandler`].
//!
//! - **`StatsHandler`**: accumulates run summary statistics
//! - **`MemoryHandler`**: keeps a filtered copy of the reports for export

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tracing::{trace, warn};

use crate::environment::Environment;
use crate::simulation_state::SimulationState;
use crate::units::{
    ChargerId, Currency, Kilometers, RequestId, ScheduleId, Seconds, SimTime, StationId, VehicleId,
};
use crate::vehicle_state::VehicleStateKind;

pub mod events;
pub mod stats;

pub use stats::{StatsHandler, SummaryStats, VehicleStateSummary};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportType {
    StationState,
    VehicleState,
    DriverState,
    AddRequestEvent,
    PickupRequestEvent,
    DropoffRequestEvent,
    CancelRequestEvent,
    Instruction,
    VehicleChargeEvent,
    VehicleMoveEvent,
    StationLoadEvent,
    RefuelSearchEvent,
    DriverScheduleEvent,
}

impl ReportType {
    pub const ALL: [ReportType; 13] = [
        ReportType::StationState,
        ReportType::VehicleState,
        ReportType::DriverState,
        ReportType::AddRequestEvent,
        ReportType::PickupRequestEvent,
        ReportType::DropoffRequestEvent,
        ReportType::CancelRequestEvent,
        ReportType::Instruction,
        ReportType::VehicleChargeEvent,
        ReportType::VehicleMoveEvent,
        ReportType::StationLoadEvent,
        ReportType::RefuelSearchEvent,
        ReportType::DriverScheduleEvent,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ReportType::StationState => "station_state",
            ReportType::VehicleState => "vehicle_state",
            ReportType::DriverState => "driver_state",
            ReportType::AddRequestEvent => "add_request_event",
            ReportType::PickupRequestEvent => "pickup_request_event",
            ReportType::DropoffRequestEvent => "dropoff_request_event",
            ReportType::CancelRequestEvent => "cancel_request_event",
            ReportType::Instruction => "instruction",
            ReportType::VehicleChargeEvent => "vehicle_charge_event",
            ReportType::VehicleMoveEvent => "vehicle_move_event",
            ReportType::StationLoadEvent => "station_load_event",
            ReportType::RefuelSearchEvent => "refuel_search_event",
            ReportType::DriverScheduleEvent => "driver_schedule_event",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == name.trim().to_ascii_lowercase())
    }
}

impl fmt::Display for ReportType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One reported observation. Cells are written as H3 strings.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "report_type", rename_all = "snake_case")]
pub enum Report {
    StationState {
        sim_time: SimTime,
        station_id: StationId,
        geoid: String,
        balance: Currency,
        total_chargers: usize,
        available_chargers: usize,
        enqueued_vehicles: usize,
    },
    VehicleState {
        sim_time: SimTime,
        vehicle_id: VehicleId,
        vehicle_state: VehicleStateKind,
        geoid: String,
        energy: f64,
        balance: Currency,
        distance_traveled_km: Kilometers,
    },
    DriverState {
        sim_time: SimTime,
        vehicle_id: VehicleId,
        driver_state: &'static str,
        available: bool,
    },
    AddRequestEvent {
        sim_time: SimTime,
        request_id: RequestId,
        departure_time: SimTime,
        passengers: usize,
        fleet_id: String,
        value: Currency,
    },
    PickupRequestEvent {
        pickup_time: SimTime,
        request_time: SimTime,
        wait_time_seconds: Seconds,
        vehicle_id: VehicleId,
        request_id: RequestId,
        fleet_id: String,
        price: Currency,
        geoid: String,
    },
    DropoffRequestEvent {
        dropoff_time: SimTime,
        travel_time_seconds: Seconds,
        vehicle_id: VehicleId,
        request_id: RequestId,
        fleet_id: String,
        geoid: String,
    },
    CancelRequestEvent {
        sim_time: SimTime,
        request_id: RequestId,
        departure_time: SimTime,
        fleet_id: String,
    },
    Instruction {
        sim_time: SimTime,
        vehicle_id: VehicleId,
        instruction_type: &'static str,
        detail: String,
    },
    VehicleChargeEvent {
        session_id: u64,
        sim_time_start: SimTime,
        sim_time_end: SimTime,
        vehicle_id: VehicleId,
        station_id: StationId,
        charger_id: ChargerId,
        vehicle_state: VehicleStateKind,
        energy: f64,
        energy_units: &'static str,
        vehicle_start_soc: f64,
        vehicle_end_soc: f64,
        price: Currency,
        geoid: String,
    },
    VehicleMoveEvent {
        sim_time_start: SimTime,
        sim_time_end: SimTime,
        vehicle_id: VehicleId,
        vehicle_state: VehicleStateKind,
        distance_km: Kilometers,
        energy: f64,
        energy_units: &'static str,
        geoid: String,
    },
    StationLoadEvent {
        sim_time_start: SimTime,
        sim_time_end: SimTime,
        station_id: StationId,
        energy: f64,
        energy_units: &'static str,
    },
    RefuelSearchEvent {
        sim_time_start: SimTime,
        sim_time_end: SimTime,
        vehicle_id: VehicleId,
        vehicle_state: VehicleStateKind,
        geoid: String,
    },
    DriverScheduleEvent {
        sim_time: SimTime,
        vehicle_id: VehicleId,
        schedule_id: Option<ScheduleId>,
        on_shift: bool,
    },
}

impl Report {
    pub fn report_type(&self) -> ReportType {
        match self {
            Report::StationState { .. } => ReportType::StationState,
            Report::VehicleState { .. } => ReportType::VehicleState,
            Report::DriverState { .. } => ReportType::DriverState,
            Report::AddRequestEvent { .. } => ReportType::AddRequestEvent,
            Report::PickupRequestEvent { .. } => ReportType::PickupRequestEvent,
            Report::DropoffRequestEvent { .. } => ReportType::DropoffRequestEvent,
            Report::CancelRequestEvent { .. } => ReportType::CancelRequestEvent,
            Report::Instruction { .. } => ReportType::Instruction,
            Report::VehicleChargeEvent { .. } => ReportType::VehicleChargeEvent,
            Report::VehicleMoveEvent { .. } => ReportType::VehicleMoveEvent,
            Report::StationLoadEvent { .. } => ReportType::StationLoadEvent,
            Report::RefuelSearchEvent { .. } => ReportType::RefuelSearchEvent,
            Report::DriverScheduleEvent { .. } => ReportType::DriverScheduleEvent,
        }
    }
}

/// Receives each tick's reports.
pub trait ReportHandler: Send {
    fn handle(&mut self, reports: &[Report], sim: &SimulationState);

    /// Final run summary, for handlers that compile one.
    fn summary_stats(&self, _sim: &SimulationState, _env: &Environment) -> Option<SummaryStats> {
        None
    }

    /// Reports kept by this handler, for handlers that keep them.
    fn collected(&self) -> Option<&[Report]> {
        None
    }
}

/// Buffers reports between flushes. Filing takes `&self` so state machine code only needs a
/// shared borrow of the environment.
#[derive(Default)]
pub struct Reporter {
    buffer: Mutex<Vec<Report>>,
    handlers: Mutex<Vec<Box<dyn ReportHandler>>>,
}

impl fmt::Debug for Reporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let buffered = self.buffer.lock().map(|b| b.len()).unwrap_or(0);
        let handlers = self.handlers.lock().map(|h| h.len()).unwrap_or(0);
        write!(f, "Reporter(buffered={buffered}, handlers={handlers})")
    }
}

impl Reporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_handler(self, handler: Box<dyn ReportHandler>) -> Self {
        self.add_handler(handler);
        self
    }

    pub fn add_handler(&self, handler: Box<dyn ReportHandler>) {
        match self.handlers.lock() {
            Ok(mut handlers) => handlers.push(handler),
            Err(_) => warn!("reporter handler list poisoned, handler dropped"),
        }
    }

    pub fn file_report(&self, report: Report) {
        trace!(report_type = %report.report_type(), "filed report");
        match self.buffer.lock() {
            Ok(mut buffer) => buffer.push(report),
            Err(_) => warn!("reporter buffer poisoned, report dropped"),
        }
    }

    /// Number of reports waiting for the next flush.
    pub fn pending(&self) -> usize {
        self.buffer.lock().map(|b| b.len()).unwrap_or(0)
    }

    /// Deliver buffered reports to every handler and clear the buffer.
    pub fn flush(&self, sim: &SimulationState) {
        let reports = match self.buffer.lock() {
            Ok(mut buffer) => std::mem::take(&mut *buffer),
            Err(_) => return,
        };
        if let Ok(mut handlers) = self.handlers.lock() {
            for handler in handlers.iter_mut() {
                handler.handle(&reports, sim);
            }
        }
    }

    /// Summary from the first handler that compiles one.
    pub fn get_summary_stats(&self, sim: &SimulationState, env: &Environment) -> Option<SummaryStats> {
        let handlers = self.handlers.lock().ok()?;
        handlers.iter().find_map(|h| h.summary_stats(sim, env))
    }

    /// Reports kept by every collecting handler, in registration order.
    pub fn collected_reports(&self) -> Vec<Report> {
        let Ok(handlers) = self.handlers.lock() else {
            return Vec::new();
        };
        handlers
            .iter()
            .filter_map(|h| h.collected())
            .flat_map(|r| r.iter().cloned())
            .collect()
    }
}

/// Keeps every report of the selected types, plus per-tick state snapshots when
/// [`ReportType::VehicleState`], [`ReportType::StationState`] or [`ReportType::DriverState`] are
/// selected, and per-station load totals when [`ReportType::StationLoadEvent`] is.
#[derive(Debug, Clone, Default)]
pub struct MemoryHandler {
    report_types: BTreeSet<ReportType>,
    reports: Vec<Report>,
}

impl MemoryHandler {
    pub fn new(report_types: impl IntoIterator<Item = ReportType>) -> Self {
        Self {
            report_types: report_types.into_iter().collect(),
            reports: Vec::new(),
        }
    }

    pub fn reports(&self) -> &[Report] {
        &self.reports
    }
}

impl ReportHandler for MemoryHandler {
    fn handle(&mut self, reports: &[Report], sim: &SimulationState) {
        let wanted = |t: ReportType| self.report_types.contains(&t);
        let mut kept: Vec<Report> = reports
            .iter()
            .filter(|r| wanted(r.report_type()))
            .cloned()
            .collect();
        if wanted(ReportType::StationLoadEvent) {
            kept.extend(events::station_load_events(reports, sim));
        }
        if wanted(ReportType::VehicleState) {
            kept.extend(events::vehicle_state_reports(sim));
        }
        if wanted(ReportType::StationState) {
            kept.extend(events::station_state_reports(sim));
        }
        if wanted(ReportType::DriverState) {
            kept.extend(events::driver_state_reports(sim));
        }
        self.reports.extend(kept);
    }

    fn collected(&self) -> Option<&[Report]> {
        Some(&self.reports)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{mock_env, mock_sim};

    fn cancel(id: &str) -> Report {
        Report::CancelRequestEvent {
            sim_time: 0,
            request_id: id.to_string(),
            departure_time: 0,
            fleet_id: String::new(),
        }
    }

    #[test]
    fn report_type_names_round_trip() {
        for t in ReportType::ALL {
            assert_eq!(ReportType::from_name(t.as_str()), Some(t));
        }
        assert_eq!(ReportType::from_name("nope"), None);
    }

    #[test]
    fn flush_hands_reports_to_handlers_and_clears_buffer() {
        let env = mock_env();
        let sim = mock_sim();
        let reporter = Reporter::new()
            .with_handler(Box::new(MemoryHandler::new([ReportType::CancelRequestEvent])));
        reporter.file_report(cancel("r1"));
        reporter.file_report(cancel("r2"));
        assert_eq!(reporter.pending(), 2);
        reporter.flush(&sim);
        assert_eq!(reporter.pending(), 0);
        assert_eq!(reporter.collected_reports().len(), 2);
        assert!(reporter.get_summary_stats(&sim, &env).is_none());
    }

    #[test]
    fn memory_handler_filters_by_type() {
        let sim = mock_sim();
        let mut handler = MemoryHandler::new([ReportType::AddRequestEvent]);
        handler.handle(&[cancel("r1")], &sim);
        assert!(handler.reports().is_empty());
    }
}
