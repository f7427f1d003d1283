//! Report constructors.
//!
//! Events raised while a vehicle updates cover the interval `[sim_time, sim_time + timestep)`.

use std::collections::BTreeMap;

use crate::instruction::Instruction;
use crate::model::{Charger, Mechatronics, Request, Station, Vehicle};
use crate::reporting::Report;
use crate::simulation_state::SimulationState;
use crate::units::StationId;

fn total_energy(vehicle: &Vehicle) -> f64 {
    vehicle.energy.values().sum()
}

fn energy_units(vehicle: &Vehicle) -> &'static str {
    vehicle.energy.keys().next().map_or("", |t| t.units())
}

pub fn vehicle_move_event(sim: &SimulationState, prev: &Vehicle, next: &Vehicle) -> Report {
    Report::VehicleMoveEvent {
        sim_time_start: sim.sim_time,
        sim_time_end: sim.sim_time + sim.sim_timestep_duration_seconds,
        vehicle_id: next.id.clone(),
        vehicle_state: prev.vehicle_state.kind(),
        distance_km: next.distance_traveled_km - prev.distance_traveled_km,
        energy: total_energy(next) - total_energy(prev),
        energy_units: energy_units(next),
        geoid: next.geoid().to_string(),
    }
}

pub fn vehicle_charge_event(
    sim: &SimulationState,
    prev: &Vehicle,
    next: &Vehicle,
    station: &Station,
    charger: &Charger,
    mechatronics: &dyn Mechatronics,
) -> Report {
    let energy = next.energy_of(charger.energy_type) - prev.energy_of(charger.energy_type);
    let price = station.get_price(&charger.id).map_or(0.0, |p| p * energy);
    Report::VehicleChargeEvent {
        session_id: prev.vehicle_state.instance_id(),
        sim_time_start: sim.sim_time,
        sim_time_end: sim.sim_time + sim.sim_timestep_duration_seconds,
        vehicle_id: next.id.clone(),
        station_id: station.id.clone(),
        charger_id: charger.id.clone(),
        vehicle_state: prev.vehicle_state.kind(),
        energy,
        energy_units: charger.energy_type.units(),
        vehicle_start_soc: mechatronics.fuel_source_soc(prev),
        vehicle_end_soc: mechatronics.fuel_source_soc(next),
        price,
        geoid: next.geoid().to_string(),
    }
}

pub fn add_request_event(sim: &SimulationState, request: &Request) -> Report {
    Report::AddRequestEvent {
        sim_time: sim.sim_time,
        request_id: request.id.clone(),
        departure_time: request.departure_time,
        passengers: request.passengers.len(),
        fleet_id: request.membership.to_string(),
        value: request.value,
    }
}

pub fn cancel_request_event(sim: &SimulationState, request: &Request) -> Report {
    Report::CancelRequestEvent {
        sim_time: sim.sim_time,
        request_id: request.id.clone(),
        departure_time: request.departure_time,
        fleet_id: request.membership.to_string(),
    }
}

pub fn pickup_request_event(sim: &SimulationState, vehicle: &Vehicle, request: &Request) -> Report {
    Report::PickupRequestEvent {
        pickup_time: sim.sim_time,
        request_time: request.departure_time,
        wait_time_seconds: sim.sim_time.saturating_sub(request.departure_time),
        vehicle_id: vehicle.id.clone(),
        request_id: request.id.clone(),
        fleet_id: request.membership.to_string(),
        price: request.value,
        geoid: vehicle.geoid().to_string(),
    }
}

pub fn dropoff_request_event(sim: &SimulationState, vehicle: &Vehicle, request: &Request) -> Report {
    Report::DropoffRequestEvent {
        dropoff_time: sim.sim_time,
        travel_time_seconds: sim.sim_time.saturating_sub(request.departure_time),
        vehicle_id: vehicle.id.clone(),
        request_id: request.id.clone(),
        fleet_id: request.membership.to_string(),
        geoid: vehicle.geoid().to_string(),
    }
}

pub fn instruction_report(sim: &SimulationState, instruction: &Instruction) -> Report {
    Report::Instruction {
        sim_time: sim.sim_time,
        vehicle_id: instruction.vehicle_id().to_string(),
        instruction_type: instruction.name(),
        detail: format!("{instruction:?}"),
    }
}

pub fn refuel_search_event(sim: &SimulationState, vehicle: &Vehicle) -> Report {
    Report::RefuelSearchEvent {
        sim_time_start: sim.sim_time,
        sim_time_end: sim.sim_time + sim.sim_timestep_duration_seconds,
        vehicle_id: vehicle.id.clone(),
        vehicle_state: vehicle.vehicle_state.kind(),
        geoid: vehicle.geoid().to_string(),
    }
}

pub fn driver_schedule_event(sim: &SimulationState, vehicle: &Vehicle, on_shift: bool) -> Report {
    Report::DriverScheduleEvent {
        sim_time: sim.sim_time,
        vehicle_id: vehicle.id.clone(),
        schedule_id: vehicle.driver_state.schedule_id().cloned(),
        on_shift,
    }
}

/// One load report per station: the energy its chargers delivered this tick, zero for stations
/// that delivered none.
pub fn station_load_events(reports: &[Report], sim: &SimulationState) -> Vec<Report> {
    let mut load: BTreeMap<StationId, (f64, &'static str)> = sim
        .stations()
        .map(|s| (s.id.clone(), (0.0, "")))
        .collect();
    for report in reports {
        if let Report::VehicleChargeEvent {
            station_id,
            energy,
            energy_units,
            ..
        } = report
        {
            let entry = load.entry(station_id.clone()).or_insert((0.0, ""));
            entry.0 += *energy;
            entry.1 = *energy_units;
        }
    }
    // charge events were filed during the tick that just ended
    let end = sim.sim_time;
    let start = end.saturating_sub(sim.sim_timestep_duration_seconds);
    load.into_iter()
        .map(|(station_id, (energy, energy_units))| Report::StationLoadEvent {
            sim_time_start: start,
            sim_time_end: end,
            station_id,
            energy,
            energy_units,
        })
        .collect()
}

pub fn vehicle_state_reports(sim: &SimulationState) -> Vec<Report> {
    sim.vehicles()
        .map(|v| Report::VehicleState {
            sim_time: sim.sim_time,
            vehicle_id: v.id.clone(),
            vehicle_state: v.vehicle_state.kind(),
            geoid: v.geoid().to_string(),
            energy: total_energy(v),
            balance: v.balance,
            distance_traveled_km: v.distance_traveled_km,
        })
        .collect()
}

pub fn station_state_reports(sim: &SimulationState) -> Vec<Report> {
    sim.stations()
        .map(|s| Report::StationState {
            sim_time: sim.sim_time,
            station_id: s.id.clone(),
            geoid: s.geoid().to_string(),
            balance: s.balance,
            total_chargers: s.state.values().map(|cs| cs.total_chargers).sum(),
            available_chargers: s.state.values().map(|cs| cs.available_chargers).sum(),
            enqueued_vehicles: s.state.values().map(|cs| cs.enqueued_vehicles.len()).sum(),
        })
        .collect()
}

pub fn driver_state_reports(sim: &SimulationState) -> Vec<Report> {
    sim.vehicles()
        .map(|v| Report::DriverState {
            sim_time: sim.sim_time,
            vehicle_id: v.id.clone(),
            driver_state: v.driver_state.name(),
            available: v.driver_state.available(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reporting::ReportType;
    use crate::test_helpers::{mock_sim, mock_station, test_cell};

    #[test]
    fn station_load_covers_idle_stations() {
        let sim = mock_sim()
            .add_station(mock_station("s1", test_cell(), 1))
            .expect("station");
        let charge = Report::VehicleChargeEvent {
            session_id: 1,
            sim_time_start: 0,
            sim_time_end: 60,
            vehicle_id: "v1".into(),
            station_id: "s2".into(),
            charger_id: "DCFC".into(),
            vehicle_state: crate::vehicle_state::VehicleStateKind::ChargingStation,
            energy: 0.5,
            energy_units: "kilowatthour",
            vehicle_start_soc: 0.1,
            vehicle_end_soc: 0.11,
            price: 0.0,
            geoid: String::new(),
        };
        let loads = station_load_events(&[charge], &sim);
        assert_eq!(loads.len(), 2);
        assert!(loads.iter().all(|r| r.report_type() == ReportType::StationLoadEvent));
        assert!(matches!(&loads[1], Report::StationLoadEvent { station_id, energy, .. } if station_id == "s2" && *energy == 0.5));
    }
}
