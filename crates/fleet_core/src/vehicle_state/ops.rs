//! Operations shared by the vehicle states: lookups, transitions, movement, charging, and
//! passenger pickup and dropoff.

use tracing::{debug, warn};

use crate::environment::Environment;
use crate::error::{SimError, SimResult};
use crate::model::{Base, Mechatronics, Request, Station, Vehicle};
use crate::reporting::events;
use crate::road_network::route::traverse;
use crate::road_network::{EntityPosition, Link, Route};
use crate::simulation_state::SimulationState;
use crate::vehicle_state::VehicleState;

// ---------------------------------------------------------------------------
// Lookups
// ---------------------------------------------------------------------------

pub fn get_vehicle<'a>(sim: &'a SimulationState, vehicle_id: &str) -> SimResult<&'a Vehicle> {
    sim.vehicle(vehicle_id)
        .ok_or_else(|| SimError::state(format!("vehicle {vehicle_id} not found")))
}

pub fn get_station<'a>(sim: &'a SimulationState, station_id: &str) -> SimResult<&'a Station> {
    sim.station(station_id)
        .ok_or_else(|| SimError::state(format!("station {station_id} not found")))
}

pub fn get_base<'a>(sim: &'a SimulationState, base_id: &str) -> SimResult<&'a Base> {
    sim.base(base_id)
        .ok_or_else(|| SimError::state(format!("base {base_id} not found")))
}

pub fn get_mechatronics<'a>(env: &'a Environment, vehicle: &Vehicle) -> SimResult<&'a dyn Mechatronics> {
    env.mechatronics_for(vehicle).ok_or_else(|| {
        SimError::state(format!(
            "mechatronics {} for vehicle {} not found",
            vehicle.mechatronics_id, vehicle.id
        ))
    })
}

// ---------------------------------------------------------------------------
// Transitions
// ---------------------------------------------------------------------------

/// Install `state` on its vehicle.
pub fn apply_new_vehicle_state(sim: &SimulationState, state: VehicleState) -> SimResult<SimulationState> {
    let vehicle = sim.vehicle(state.vehicle_id()).ok_or_else(|| {
        SimError::transition(
            format!("vehicle {} not found", state.vehicle_id()),
            "apply",
            state.kind().as_str(),
        )
    })?;
    sim.modify_vehicle(vehicle.modify_vehicle_state(state))
}

/// Exit `prev` then enter `next`. `Ok(None)` when either side declines.
pub fn transition_previous_to_next(
    sim: &SimulationState,
    env: &Environment,
    prev: &VehicleState,
    next: &VehicleState,
) -> SimResult<Option<SimulationState>> {
    let wrap = |e: SimError| SimError::transition(e.to_string(), prev.kind().as_str(), next.kind().as_str());
    let Some(exited) = prev.exit(next, sim, env).map_err(wrap)? else {
        debug!(
            vehicle_id = %prev.vehicle_id(),
            "{} declined to exit into {}",
            prev.kind(),
            next.kind()
        );
        return Ok(None);
    };
    let entered = next.enter(&exited, env).map_err(wrap)?;
    if entered.is_none() {
        debug!(
            vehicle_id = %prev.vehicle_id(),
            "{} declined entry from {}",
            next.kind(),
            prev.kind()
        );
    }
    Ok(entered)
}

/// The generic per-tick update: one default transition at most, then one `perform_update`.
pub fn default_update(
    state: &VehicleState,
    sim: &SimulationState,
    env: &Environment,
) -> SimResult<Option<SimulationState>> {
    if !state.has_reached_terminal_state_condition(sim, env) {
        return state.perform_update(sim, env);
    }
    let Some(next) = state.default_terminal_state(sim, env)? else {
        return Ok(None);
    };
    let Some(transitioned) = transition_previous_to_next(sim, env, state, &next)? else {
        return Ok(None);
    };
    let entered = get_vehicle(&transitioned, state.vehicle_id())?
        .vehicle_state
        .clone();
    Ok(Some(
        entered
            .perform_update(&transitioned, env)?
            .unwrap_or(transitioned),
    ))
}

// ---------------------------------------------------------------------------
// Movement and energy
// ---------------------------------------------------------------------------

/// Drive along `route` for one timestep.
///
/// Energy is consumed for the distance covered and the vehicle is left at the end of the
/// experienced part of the route. `with_route` builds the vehicle's next state from the
/// remaining route. `Ok(None)` when there is nothing to traverse.
pub fn move_vehicle(
    sim: &SimulationState,
    env: &Environment,
    vehicle_id: &str,
    route: &[Link],
    with_route: impl FnOnce(Route) -> VehicleState,
) -> SimResult<Option<SimulationState>> {
    let vehicle = get_vehicle(sim, vehicle_id)?;
    let mechatronics = get_mechatronics(env, vehicle)?;
    let Some(traversal) = traverse(route, sim.sim_timestep_duration_seconds as f64)? else {
        return Ok(None);
    };
    let Some(last) = traversal.experienced_route.last() else {
        // only zero-length links remained
        let stopped = vehicle.modify_vehicle_state(with_route(Route::new()));
        return sim.modify_vehicle(stopped).map(Some);
    };

    let moved = mechatronics
        .consume_energy(vehicle, &traversal.experienced_route)
        .modify_position(EntityPosition::new(last.link_id.clone(), last.end))
        .tick_distance_traveled_km(traversal.traversal_distance_km)
        .modify_vehicle_state(with_route(traversal.remaining_route.clone()));

    env.reporter
        .file_report(events::vehicle_move_event(sim, vehicle, &moved));
    sim.modify_vehicle(moved).map(Some)
}

/// Idle energy draw for one timestep.
pub fn idle_vehicle(vehicle: &Vehicle, env: &Environment, sim: &SimulationState) -> SimResult<Vehicle> {
    let mechatronics = get_mechatronics(env, vehicle)?;
    Ok(mechatronics.idle(vehicle, sim.sim_timestep_duration_seconds))
}

/// Charge for one timestep at `station`'s `charger_id`, paying the station for the energy.
pub fn charge(
    sim: &SimulationState,
    env: &Environment,
    vehicle_id: &str,
    station_id: &str,
    charger_id: &str,
) -> SimResult<Option<SimulationState>> {
    let vehicle = get_vehicle(sim, vehicle_id)?;
    let mechatronics = get_mechatronics(env, vehicle)?;
    let station = get_station(sim, station_id)?;
    let charger = station.get_charger_instance(charger_id)?;

    if mechatronics.is_full(vehicle) {
        return Err(SimError::state(format!(
            "vehicle {vehicle_id} is full, cannot charge at station {station_id}"
        )));
    }

    let (charged, _) = mechatronics.add_energy(vehicle, charger, sim.sim_timestep_duration_seconds);
    let energy = charged.energy_of(charger.energy_type) - vehicle.energy_of(charger.energy_type);
    let cost = energy * station.get_price(charger_id).unwrap_or(0.0);
    let charged = charged.send_payment(cost);
    let paid_station = station.receive_payment(cost);

    env.reporter.file_report(events::vehicle_charge_event(
        sim,
        vehicle,
        &charged,
        station,
        charger,
        mechatronics,
    ));
    sim.modify_vehicle(charged)
        .and_then(|s| s.modify_station(paid_station))
        .map(Some)
}

// ---------------------------------------------------------------------------
// Passengers
// ---------------------------------------------------------------------------

/// Collect fare and passengers for `request_id`, removing the request from the simulation.
pub fn pick_up_trip(
    sim: &SimulationState,
    env: &Environment,
    vehicle_id: &str,
    request_id: &str,
) -> SimResult<SimulationState> {
    let vehicle = get_vehicle(sim, vehicle_id)?;
    let request = sim
        .request(request_id)
        .ok_or_else(|| SimError::state(format!("request {request_id} not found for pickup")))?;
    env.reporter
        .file_report(events::pickup_request_event(sim, vehicle, request));
    sim.modify_vehicle(vehicle.receive_payment(request.value))?
        .remove_request(request_id)
}

/// Deliver `request`'s passengers. The vehicle must be at every passenger's destination.
pub fn drop_off_trip(
    sim: &SimulationState,
    env: &Environment,
    vehicle_id: &str,
    request: &Request,
) -> SimResult<SimulationState> {
    let vehicle = get_vehicle(sim, vehicle_id)?;
    if let Some(p) = request.passengers.iter().find(|p| p.destination != vehicle.geoid()) {
        return Err(SimError::state(format!(
            "vehicle {vehicle_id} at {} cannot drop off passenger {} bound for {}",
            vehicle.geoid(),
            p.id,
            p.destination
        )));
    }
    env.reporter
        .file_report(events::dropoff_request_event(sim, vehicle, request));
    Ok(sim.clone())
}

/// Board every passenger of `request` onto `vehicle_id`.
pub fn board_passengers(request: &Request, vehicle_id: &str) -> Request {
    Request {
        passengers: request.passengers.iter().map(|p| p.board(vehicle_id)).collect(),
        ..request.clone()
    }
}

/// Log and fall back to `sim` when an exit finds its target entity gone.
pub(crate) fn missing_on_exit(sim: &SimulationState, vehicle_id: &str, what: &str) -> SimResult<Option<SimulationState>> {
    warn!(vehicle_id = %vehicle_id, "{what} no longer exists on exit, continuing");
    Ok(Some(sim.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::EnergyType;
    use crate::test_helpers::{
        mock_env, mock_request, mock_sim_with, mock_station, mock_vehicle_with_soc, test_cell, test_cell_offset,
    };
    use crate::vehicle_state::{Idle, Repositioning, VehicleStateKind};

    #[test]
    fn moving_consumes_energy_and_advances_position() {
        let env = mock_env();
        let sim = mock_sim_with(vec![mock_vehicle_with_soc("v1", 1.0)], vec![], vec![], vec![]);
        let v = sim.vehicle("v1").expect("vehicle");
        let dest = sim
            .road_network
            .position_from_geoid(test_cell_offset(0.05, 0.0))
            .expect("position");
        let route = sim.road_network.route(&v.position, &dest);
        let state_route = route.clone();

        let moved = move_vehicle(&sim, &env, "v1", &route, |remaining| {
            Repositioning::build("v1", remaining).into()
        })
        .expect("move")
        .expect("moved");
        let after = moved.vehicle("v1").expect("vehicle");
        assert!(after.energy_of(EnergyType::Electric) < v.energy_of(EnergyType::Electric));
        assert!(after.distance_traveled_km > 0.0);
        assert_ne!(after.geoid(), v.geoid());
        assert_eq!(after.vehicle_state.kind(), VehicleStateKind::Repositioning);
        assert!(!state_route.is_empty());
    }

    #[test]
    fn nothing_to_traverse_is_a_no_op() {
        let env = mock_env();
        let sim = mock_sim_with(vec![mock_vehicle_with_soc("v1", 1.0)], vec![], vec![], vec![]);
        let result = move_vehicle(&sim, &env, "v1", &[], |r| Repositioning::build("v1", r).into()).expect("ok");
        assert!(result.is_none());
    }

    #[test]
    fn charging_pays_the_station() {
        let env = mock_env();
        let station = mock_station("s1", test_cell(), 1)
            .update_prices([(&"DCFC".to_string(), &0.5)])
            .expect("price");
        let sim = mock_sim_with(vec![mock_vehicle_with_soc("v1", 0.2)], vec![], vec![station], vec![]);
        let charged = charge(&sim, &env, "v1", "s1", "DCFC").expect("charge").expect("charged");
        let v = charged.vehicle("v1").expect("vehicle");
        let s = charged.station("s1").expect("station");
        assert!(v.balance < 0.0);
        assert!((s.balance + v.balance).abs() < 1e-9);
    }

    #[test]
    fn full_vehicles_cannot_charge() {
        let env = mock_env();
        let station = mock_station("s1", test_cell(), 1);
        let sim = mock_sim_with(vec![mock_vehicle_with_soc("v1", 1.0)], vec![], vec![station], vec![]);
        assert!(charge(&sim, &env, "v1", "s1", "DCFC").is_err());
    }

    #[test]
    fn dropoff_requires_vehicle_at_destination() {
        let env = mock_env();
        let request = mock_request("r1", test_cell(), test_cell_offset(0.01, 0.0), 0, 1);
        let sim = mock_sim_with(vec![mock_vehicle_with_soc("v1", 1.0)], vec![request.clone()], vec![], vec![]);
        assert!(drop_off_trip(&sim, &env, "v1", &request).is_err());

        let picked_up = pick_up_trip(&sim, &env, "v1", "r1").expect("pickup");
        assert!(picked_up.request("r1").is_none());
        assert_eq!(picked_up.vehicle("v1").expect("vehicle").balance, request.value);
    }

    #[test]
    fn transition_reports_wrapped_errors() {
        let env = mock_env();
        let sim = mock_sim_with(vec![], vec![], vec![], vec![]);
        let prev: VehicleState = Idle::build("ghost").into();
        let next: VehicleState = Idle::build("ghost").into();
        let err = transition_previous_to_next(&sim, &env, &prev, &next).expect_err("no vehicle");
        assert!(matches!(err, SimError::StateTransition { .. }));
    }
}
