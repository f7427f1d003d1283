//! Instructions drivers propose for their own vehicles.

use tracing::warn;

use crate::dispatcher::charging_search::{instruct_vehicles_to_dispatch_to_station, ChargingSearch};
use crate::environment::Environment;
use crate::instruction::Instruction;
use crate::model::{Base, Charger, EnergyType, Mechatronics, Station, Vehicle};
use crate::simulation_state::SimulationState;
use crate::spatial::{distance_km_between_cells, nearest_entity};
use crate::vehicle_state::VehicleState;

/// The slowest charger at `station` the vehicle can use. Ties go to the first charger id.
fn lowest_power_charger<'a>(station: &'a Station, mechatronics: &dyn Mechatronics) -> Option<&'a Charger> {
    station
        .state
        .values()
        .map(|cs| &cs.charger)
        .filter(|c| mechatronics.valid_charger(c))
        .fold(None, |best: Option<&Charger>, c| match best {
            Some(b) if b.rate <= c.rate => Some(b),
            _ => Some(c),
        })
}

/// Plug in at the home base's station with its slowest usable charger.
pub fn human_charge_at_home(
    vehicle: &Vehicle,
    home: &Base,
    sim: &SimulationState,
    env: &Environment,
) -> Option<Instruction> {
    let station_id = home.station_id.as_ref()?;
    let mechatronics = env.mechatronics_for(vehicle)?;
    let Some(station) = sim.station(station_id) else {
        warn!(station_id = %station_id, base_id = %home.id, "home station not found");
        return None;
    };
    if mechatronics.is_full(vehicle) {
        return None;
    }
    let charger = lowest_power_charger(station, mechatronics)?;
    Some(Instruction::charge_base(vehicle.id.clone(), home.id.clone(), charger.id.clone()))
}

/// Head home at the end of a shift. Vehicles that cannot make it home, or electric vehicles
/// whose home has no charger, go charge first.
pub fn human_go_home(vehicle: &Vehicle, home: &Base, sim: &SimulationState, env: &Environment) -> Option<Instruction> {
    let mechatronics = env.mechatronics_for(vehicle)?;
    let remaining_range = mechatronics.range_remaining_km(vehicle);
    if remaining_range <= 0.0 {
        return None;
    }
    let required_range = sim
        .road_network
        .distance_by_position_km(&vehicle.position, &home.position);
    let cant_make_it_home = required_range >= remaining_range;
    let no_home_charging = home.station_id.is_none() && vehicle.energy.contains_key(&EnergyType::Electric);

    if cant_make_it_home || no_home_charging {
        let search = ChargingSearch::from_env(env, env.config.dispatcher.human_driver_off_shift_charge_target);
        instruct_vehicles_to_dispatch_to_station(1, [vehicle], sim, env, &search)
            .into_iter()
            .next()
    } else {
        Some(Instruction::dispatch_base(vehicle.id.clone(), home.id.clone()))
    }
}

/// Reposition toward the search cell holding the most waiting requests. Ties go to the first
/// cell in index order.
pub fn look_for_requests(vehicle: &Vehicle, sim: &SimulationState) -> Option<Instruction> {
    // No randomness here: the same state always yields the same destination.
    let (best_cell, _) = sim
        .request_search_index()
        .iter()
        .map(|(cell, ids)| (*cell, ids.len()))
        .fold(None, |best: Option<(h3o::CellIndex, usize)>, (cell, n)| match best {
            Some((_, best_n)) if best_n >= n => best,
            _ => Some((cell, n)),
        })?;
    let destination = best_cell.center_child(sim.sim_h3_location_resolution)?;
    Some(Instruction::reposition(vehicle.id.clone(), destination))
}

/// Unplug once the vehicle reaches the ideal fast-charge limit.
pub fn idle_if_at_soc_limit(vehicle: &Vehicle, env: &Environment) -> Option<Instruction> {
    let Some(mechatronics) = env.mechatronics_for(vehicle) else {
        warn!(vehicle_id = %vehicle.id, mechatronics_id = %vehicle.mechatronics_id, "mechatronics not found");
        return None;
    };
    (mechatronics.fuel_source_soc(vehicle) >= env.config.dispatcher.ideal_fastcharge_soc_limit)
        .then(|| Instruction::idle(vehicle.id.clone()))
}

/// Reserved or charging at a base with a station: charge with the slowest usable charger until
/// full.
pub fn av_charge_base_instruction(vehicle: &Vehicle, sim: &SimulationState, env: &Environment) -> Option<Instruction> {
    let base_id = match &vehicle.vehicle_state {
        VehicleState::ReserveBase(s) => &s.base_id,
        VehicleState::ChargingBase(s) => &s.base_id,
        _ => return None,
    };
    let base = sim.base(base_id)?;
    let station_id = base.station_id.as_ref()?;
    let mechatronics = env.mechatronics_for(vehicle)?;
    if mechatronics.is_full(vehicle) {
        return None;
    }
    let Some(station) = sim.station(station_id) else {
        warn!(station_id = %station_id, base_id = %base.id, "base station not found");
        return None;
    };
    let charger = lowest_power_charger(station, mechatronics)?;
    Some(Instruction::charge_base(vehicle.id.clone(), base.id.clone(), charger.id.clone()))
}

/// After idling past the time out, return to the nearest base the vehicle may use.
pub fn av_dispatch_base_instruction(vehicle: &Vehicle, sim: &SimulationState, env: &Environment) -> Option<Instruction> {
    let VehicleState::Idle(idle) = &vehicle.vehicle_state else {
        return None;
    };
    if idle.idle_duration <= env.config.dispatcher.idle_time_out_seconds {
        return None;
    }
    let origin = vehicle.geoid();
    let base = nearest_entity(
        origin,
        sim.base_search_index(),
        sim.sim_h3_search_resolution,
        env.config.dispatcher.max_search_radius_km,
        |id| sim.base(id),
        |b: &&Base| {
            b.membership
                .grant_access_to_membership(&vehicle.membership)
                .then(|| distance_km_between_cells(origin, b.geoid()))
        },
    )?;
    Some(Instruction::dispatch_base(vehicle.id.clone(), base.id.clone()))
}
