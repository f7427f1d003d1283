//! Station and charger selection for vehicles that need to refuel.
//!
//! Two rankings are available (see [`ChargingSearchType`]):
//!
//! - **Nearest shortest queue**: hex-grid distance to the station, inflated by the number of
//!   vehicles queued per plug of the charger type.
//! - **Shortest time to charge**: drive time, plus the wait for a plug estimated by releasing the
//!   vehicles already charging and queued in order, plus the vehicle's own charge duration.
//!
//! Both pick, among the chargers a vehicle can use, the one with the lowest rank. Ties go to the
//! charger id that sorts first.

use std::collections::VecDeque;

use h3o::CellIndex;
use tracing::{debug, warn};

use crate::config::ChargingSearchType;
use crate::environment::Environment;
use crate::instruction::Instruction;
use crate::model::mechatronics::time_to_full;
use crate::model::{Station, Vehicle};
use crate::road_network::route::{route_distance_km, route_travel_time_seconds};
use crate::simulation_state::SimulationState;
use crate::spatial::{grid_distance, nearest_entity, NO_DISTANCE_KM};
use crate::units::{ChargerId, Kilometers, Ratio, Seconds};
use crate::vehicle_state::VehicleState;

/// The charger picked at a station and its rank (lower is better).
#[derive(Debug, Clone, PartialEq)]
pub struct ChargerRanking {
    pub charger_id: ChargerId,
    pub rank: f64,
}

/// Parameters shared by every charging search issued in one call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChargingSearch {
    pub search_type: ChargingSearchType,
    pub max_search_radius_km: Kilometers,
    pub target_soc: Ratio,
}

impl ChargingSearch {
    pub fn new(search_type: ChargingSearchType, max_search_radius_km: Kilometers, target_soc: Ratio) -> Self {
        Self {
            search_type,
            max_search_radius_km,
            target_soc,
        }
    }

    /// Search with the dispatcher's configured strategy and radius.
    pub fn from_env(env: &Environment, target_soc: Ratio) -> Self {
        let dispatcher = &env.config.dispatcher;
        Self::new(dispatcher.charging_search_type, dispatcher.max_search_radius_km, target_soc)
    }

    pub fn rank_station(
        &self,
        sim: &SimulationState,
        env: &Environment,
        vehicle: &Vehicle,
        origin: CellIndex,
        station: &Station,
    ) -> Option<ChargerRanking> {
        if !valid_station_for_vehicle(vehicle, station, env) {
            return None;
        }
        match self.search_type {
            ChargingSearchType::NearestShortestQueue => {
                nearest_shortest_queue_ranking(vehicle, origin, station, env)
            }
            ChargingSearchType::ShortestTimeToCharge => {
                shortest_time_to_charge_ranking(sim, env, vehicle, station, self.target_soc)
            }
        }
    }

    /// Best station reachable from `origin` for `vehicle`, with its best charger.
    pub fn best_station<'a>(
        &self,
        sim: &'a SimulationState,
        env: &Environment,
        vehicle: &Vehicle,
        origin: CellIndex,
    ) -> Option<(&'a Station, ChargerRanking)> {
        nearest_entity(
            origin,
            sim.station_search_index(),
            sim.sim_h3_search_resolution,
            self.max_search_radius_km,
            |id| {
                let station = sim.station(id)?;
                let ranking = self.rank_station(sim, env, vehicle, origin, station)?;
                Some((station, ranking))
            },
            |(_, ranking)| Some(ranking.rank),
        )
    }
}

/// The vehicle may use the station and the station has a charger the vehicle can use.
pub fn valid_station_for_vehicle(vehicle: &Vehicle, station: &Station, env: &Environment) -> bool {
    let Some(mechatronics) = env.mechatronics_for(vehicle) else {
        warn!(vehicle_id = %vehicle.id, mechatronics_id = %vehicle.mechatronics_id, "mechatronics not found");
        return false;
    };
    station.membership.grant_access_to_membership(&vehicle.membership)
        && station.state.values().any(|cs| mechatronics.valid_charger(&cs.charger))
}

pub fn nearest_shortest_queue_ranking(
    vehicle: &Vehicle,
    origin: CellIndex,
    station: &Station,
    env: &Environment,
) -> Option<ChargerRanking> {
    let mechatronics = env.mechatronics_for(vehicle)?;
    let distance = f64::from(grid_distance(origin, station.geoid())?);

    let mut best: Option<ChargerRanking> = None;
    for charger_id in &station.on_shift_access_chargers {
        let Some(charger_state) = station.state.get(charger_id) else {
            continue;
        };
        if charger_state.total_chargers == 0 || !mechatronics.valid_charger(&charger_state.charger) {
            continue;
        }
        let queue_factor = charger_state.enqueued_vehicles.len() as f64 / charger_state.total_chargers as f64;
        let rank = distance + distance * queue_factor;
        if best.as_ref().map_or(true, |b| rank < b.rank) {
            best = Some(ChargerRanking {
                charger_id: charger_id.clone(),
                rank,
            });
        }
    }
    best
}

/// Seconds until a plug frees up for a newcomer, given the remaining charge times of the
/// vehicles plugged in and of those queued (in queue order).
pub fn estimate_queue_wait_seconds(
    charging: impl IntoIterator<Item = Seconds>,
    enqueued: impl IntoIterator<Item = Seconds>,
    total_chargers: usize,
) -> Seconds {
    let mut charging: Vec<Seconds> = charging.into_iter().collect();
    let mut enqueued: VecDeque<Seconds> = enqueued.into_iter().collect();
    charging.sort_unstable();
    let mut time_passed: Seconds = 0;
    loop {
        if charging.is_empty() && enqueued.is_empty() {
            return time_passed;
        }
        if charging.len() < total_chargers {
            return time_passed;
        }
        let Some(&next_release) = charging.first() else {
            // no plugs at all, nothing will ever free up
            return Seconds::MAX;
        };
        time_passed = time_passed.saturating_add(next_release);
        charging = charging
            .into_iter()
            .map(|t| t - next_release)
            .filter(|t| *t > 0)
            .collect();
        let vacancies = total_chargers.saturating_sub(charging.len());
        for _ in 0..vacancies {
            match enqueued.pop_front() {
                Some(t) => charging.push(t),
                None => break,
            }
        }
        charging.sort_unstable();
    }
}

pub fn shortest_time_to_charge_ranking(
    sim: &SimulationState,
    env: &Environment,
    vehicle: &Vehicle,
    station: &Station,
    target_soc: Ratio,
) -> Option<ChargerRanking> {
    let mechatronics = env.mechatronics_for(vehicle)?;
    let route = sim.road_network.route(&vehicle.position, &station.position);
    if mechatronics.range_remaining_km(vehicle) < route_distance_km(&route) {
        return None;
    }
    let step = sim.sim_timestep_duration_seconds;

    let mut queued: Vec<(&Vehicle, u64)> = sim
        .vehicles()
        .filter_map(|v| match &v.vehicle_state {
            VehicleState::ChargeQueueing(q) if q.station_id == station.id => Some((v, q.enqueue_time)),
            _ => None,
        })
        .collect();
    queued.sort_by(|(a, ta), (b, tb)| ta.cmp(tb).then_with(|| a.id.cmp(&b.id)));

    let mut best: Option<ChargerRanking> = None;
    for (charger_id, charger_state) in station.state.iter() {
        let charger = &charger_state.charger;
        if charger_state.total_chargers == 0 || !mechatronics.valid_charger(charger) {
            continue;
        }
        let remaining_for = |v: &Vehicle| -> Seconds {
            env.mechatronics_for(v)
                .map_or(0, |m| time_to_full(v, m, charger, target_soc, step))
        };
        let charging = sim.vehicles().filter_map(|v| match &v.vehicle_state {
            VehicleState::ChargingStation(c) if c.station_id == station.id && &c.charger_id == charger_id => {
                Some(remaining_for(v))
            }
            _ => None,
        });
        let enqueued = queued.iter().filter_map(|(v, _)| match &v.vehicle_state {
            VehicleState::ChargeQueueing(q) if &q.charger_id == charger_id => Some(remaining_for(v)),
            _ => None,
        });
        let wait = estimate_queue_wait_seconds(charging, enqueued, charger_state.total_chargers);
        let own = time_to_full(vehicle, mechatronics, charger, target_soc, step);
        let rank = own as f64 + wait as f64;
        if best.as_ref().map_or(true, |b| rank < b.rank) {
            best = Some(ChargerRanking {
                charger_id: charger_id.clone(),
                rank,
            });
        }
    }
    best.map(|b| ChargerRanking {
        rank: b.rank + route_travel_time_seconds(&route),
        ..b
    })
}

/// Road distance from `origin` to the best station for `vehicle`, or [`NO_DISTANCE_KM`] when
/// none is in range.
pub fn nearest_valid_station_distance(
    sim: &SimulationState,
    env: &Environment,
    vehicle: &Vehicle,
    origin: CellIndex,
    search: &ChargingSearch,
) -> Kilometers {
    search
        .best_station(sim, env, vehicle, origin)
        .and_then(|(station, _)| sim.distance_km_between(origin, station.geoid()))
        .unwrap_or(NO_DISTANCE_KM)
}

/// Send up to `n` of `vehicles` to their best station. Vehicles with no station in range are
/// skipped.
pub fn instruct_vehicles_to_dispatch_to_station<'a>(
    n: usize,
    vehicles: impl IntoIterator<Item = &'a Vehicle>,
    sim: &SimulationState,
    env: &Environment,
    search: &ChargingSearch,
) -> Vec<Instruction> {
    let mut instructions = Vec::new();
    for vehicle in vehicles {
        if instructions.len() >= n {
            break;
        }
        match search.best_station(sim, env, vehicle, vehicle.geoid()) {
            Some((station, ranking)) => instructions.push(Instruction::dispatch_station(
                vehicle.id.clone(),
                station.id.clone(),
                ranking.charger_id,
            )),
            None => debug!(vehicle_id = %vehicle.id, "no station in range"),
        }
    }
    instructions
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{mock_env, mock_sim_with, mock_station, mock_vehicle_with_soc, test_cell, test_cell_offset};

    #[test]
    fn queue_wait_releases_in_order() {
        assert_eq!(estimate_queue_wait_seconds([], [], 1), 0);
        // a free plug means no wait
        assert_eq!(estimate_queue_wait_seconds([600], [], 2), 0);
        assert_eq!(estimate_queue_wait_seconds([600], [], 1), 600);
        // one plug, one charging for 600s and one queued for 300s
        assert_eq!(estimate_queue_wait_seconds([600], [300], 1), 900);
        // two plugs: the first release at 100 takes the queued vehicle, then the next at 200
        assert_eq!(estimate_queue_wait_seconds([100, 200], [500], 2), 200);
        assert_eq!(estimate_queue_wait_seconds([], [100], 0), Seconds::MAX);
    }

    #[test]
    fn shortest_queue_inflates_distance_by_queue_share() {
        let env = mock_env();
        let vehicle = mock_vehicle_with_soc("v1", 0.1);
        let station = mock_station("s1", test_cell_offset(0.01, 0.0), 2);
        let empty = nearest_shortest_queue_ranking(&vehicle, vehicle.geoid(), &station, &env).expect("rank");

        let busy = station
            .enqueue_for_vehicle("DCFC", "x")
            .and_then(|s| s.enqueue_for_vehicle("LEVEL_2", "y"))
            .and_then(|s| s.enqueue_for_vehicle("LEVEL_2", "z"))
            .expect("enqueue");
        let ranked = nearest_shortest_queue_ranking(&vehicle, vehicle.geoid(), &busy, &env).expect("rank");
        assert_eq!(ranked.charger_id, "DCFC");
        assert!((ranked.rank - empty.rank * 1.5).abs() < 1e-9);
    }

    #[test]
    fn best_station_is_none_without_stations() {
        let env = mock_env();
        let sim = mock_sim_with(vec![mock_vehicle_with_soc("v1", 0.1)], vec![], vec![], vec![]);
        let vehicle = sim.vehicle("v1").expect("vehicle");
        let search = ChargingSearch::from_env(&env, 0.8);
        assert!(search.best_station(&sim, &env, vehicle, test_cell()).is_none());
        assert_eq!(nearest_valid_station_distance(&sim, &env, vehicle, test_cell(), &search), NO_DISTANCE_KM);
    }

    #[test]
    fn shortest_time_ranks_the_fastest_charger() {
        let env = mock_env();
        let station = mock_station("s1", test_cell_offset(0.01, 0.0), 1);
        let sim = mock_sim_with(vec![mock_vehicle_with_soc("v1", 0.2)], vec![], vec![station], vec![]);
        let vehicle = sim.vehicle("v1").expect("vehicle");
        let station = sim.station("s1").expect("station");
        let ranked = shortest_time_to_charge_ranking(&sim, &env, vehicle, station, 0.8).expect("rank");
        assert_eq!(ranked.charger_id, "DCFC");
        assert!(ranked.rank > 0.0);
    }
}
