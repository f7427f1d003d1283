//! Time-stamped charging price changes.

use std::collections::{BTreeMap, VecDeque};

use h3o::CellIndex;
use tracing::{error, warn};

use crate::environment::Environment;
use crate::simulation_state::SimulationState;
use crate::units::{ChargerId, Currency, SimTime, StationId};

use super::SimulationUpdateFunction;

/// Which stations a price row applies to.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum PriceTarget {
    /// Every station offering the charger.
    AllStations,
    Station(StationId),
    /// Every station located in this cell.
    Geoid(CellIndex),
}

impl PriceTarget {
    /// Parses the station column of a price table, where `default` means every station.
    pub fn from_station_column(value: &str) -> Self {
        if value == "default" {
            PriceTarget::AllStations
        } else {
            PriceTarget::Station(value.to_string())
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PriceRow {
    pub time: SimTime,
    pub target: PriceTarget,
    pub charger_id: ChargerId,
    pub price_kwh: Currency,
}

impl PriceRow {
    pub fn new(time: SimTime, target: PriceTarget, charger_id: impl Into<ChargerId>, price_kwh: Currency) -> Self {
        Self {
            time,
            target,
            charger_id: charger_id.into(),
            price_kwh,
        }
    }
}

/// Applies price rows once the clock reaches their time. When several rows name the same
/// station and charger, the latest one wins.
#[derive(Debug, Clone, Default)]
pub struct ChargingPriceUpdate {
    pending: VecDeque<PriceRow>,
}

impl ChargingPriceUpdate {
    pub fn new(mut rows: Vec<PriceRow>) -> Self {
        rows.sort_by_key(|r| r.time);
        Self { pending: rows.into() }
    }

    /// Free charging everywhere from time zero for every known charger type.
    pub fn zero_prices<'a>(charger_ids: impl IntoIterator<Item = &'a ChargerId>) -> Self {
        Self::new(
            charger_ids
                .into_iter()
                .map(|id| PriceRow::new(0, PriceTarget::AllStations, id.clone(), 0.0))
                .collect(),
        )
    }

    pub fn remaining(&self) -> usize {
        self.pending.len()
    }

    fn due_rows(&mut self, sim_time: SimTime) -> Vec<PriceRow> {
        let due = self.pending.iter().take_while(|r| r.time <= sim_time).count();
        self.pending.drain(..due).collect()
    }
}

/// Resolve rows to per-station price tables.
fn prices_by_station(rows: &[PriceRow], sim: &SimulationState) -> BTreeMap<StationId, BTreeMap<ChargerId, Currency>> {
    let mut by_station: BTreeMap<StationId, BTreeMap<ChargerId, Currency>> = BTreeMap::new();
    for row in rows {
        let station_ids: Vec<StationId> = match &row.target {
            PriceTarget::AllStations => sim
                .stations()
                .filter(|s| s.state.contains_key(&row.charger_id))
                .map(|s| s.id.clone())
                .collect(),
            PriceTarget::Station(id) => vec![id.clone()],
            PriceTarget::Geoid(cell) => sim.at_geoid(*cell).stations.iter().map(|s| s.to_string()).collect(),
        };
        for station_id in station_ids {
            by_station
                .entry(station_id)
                .or_default()
                .insert(row.charger_id.clone(), row.price_kwh);
        }
    }
    by_station
}

impl SimulationUpdateFunction for ChargingPriceUpdate {
    fn name(&self) -> &str {
        "charging_price_update"
    }

    fn update(&mut self, sim: &SimulationState, _env: &Environment) -> SimulationState {
        let rows = self.due_rows(sim.sim_time);
        if rows.is_empty() {
            return sim.clone();
        }
        prices_by_station(&rows, sim)
            .into_iter()
            .fold(sim.clone(), |acc, (station_id, prices)| {
                let Some(station) = acc.station(&station_id) else {
                    warn!(station_id = %station_id, "price update for unknown station");
                    return acc;
                };
                match station
                    .update_prices(&prices)
                    .and_then(|updated| acc.modify_station(updated))
                {
                    Ok(updated) => updated,
                    Err(e) => {
                        error!(station_id = %station_id, error = %e, "price update failed");
                        acc
                    }
                }
            })
    }
}
