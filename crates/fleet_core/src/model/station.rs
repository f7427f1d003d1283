//! Charging stations and their per-charger occupancy.
//!
//! A [`Station`] owns one [`ChargerState`] per charger type. Each tracks plug availability,
//! price, and a FIFO of vehicles waiting for a plug. A vehicle waits in at most one queue at a
//! station.

use serde::{Deserialize, Serialize};

use crate::error::{SimError, SimResult};
use crate::model::charger::Charger;
use crate::model::membership::Membership;
use crate::road_network::EntityPosition;
use crate::units::{ChargerId, Currency, MembershipId, StationId, VehicleId};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChargerState {
    pub charger: Charger,
    pub total_chargers: usize,
    pub available_chargers: usize,
    pub price_per_kwh: Currency,
    pub enqueued_vehicles: im::Vector<VehicleId>,
}

impl ChargerState {
    pub fn new(charger: Charger, count: usize) -> Self {
        Self {
            charger,
            total_chargers: count,
            available_chargers: count,
            price_per_kwh: 0.0,
            enqueued_vehicles: im::Vector::new(),
        }
    }

    pub fn has_available_charger(&self) -> bool {
        self.available_chargers > 0
    }

    /// Plugs currently in use.
    pub fn in_use(&self) -> usize {
        self.total_chargers.saturating_sub(self.available_chargers)
    }

    fn add_chargers(&self, count: usize) -> Self {
        Self {
            total_chargers: self.total_chargers + count,
            available_chargers: self.available_chargers + count,
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Station {
    pub id: StationId,
    pub position: EntityPosition,
    pub membership: Membership,
    pub state: im::OrdMap<ChargerId, ChargerState>,
    pub on_shift_access_chargers: im::OrdSet<ChargerId>,
    pub balance: Currency,
}

impl Station {
    pub fn new(id: impl Into<StationId>, position: EntityPosition) -> Self {
        Self {
            id: id.into(),
            position,
            membership: Membership::public(),
            state: im::OrdMap::new(),
            on_shift_access_chargers: im::OrdSet::new(),
            balance: 0.0,
        }
    }

    pub fn geoid(&self) -> h3o::CellIndex {
        self.position.geoid
    }

    /// Add `count` plugs of `charger`. Adding a type the station already has appends plugs.
    pub fn with_chargers(mut self, charger: Charger, count: usize, on_shift_access: bool) -> Self {
        let id = charger.id.clone();
        let updated = match self.state.get(&id) {
            Some(cs) => cs.add_chargers(count),
            None => ChargerState::new(charger, count),
        };
        self.state.insert(id.clone(), updated);
        if on_shift_access {
            self.on_shift_access_chargers.insert(id);
        }
        self
    }

    pub fn with_membership(mut self, membership: Membership) -> Self {
        self.membership = membership;
        self
    }

    pub fn add_membership(&self, membership_id: impl Into<MembershipId>) -> SimResult<Self> {
        Ok(Self {
            membership: self.membership.add_membership(membership_id)?,
            ..self.clone()
        })
    }

    fn charger_state(&self, charger_id: &str) -> SimResult<&ChargerState> {
        self.state.get(charger_id).ok_or_else(|| {
            SimError::state(format!(
                "station {} does not have charger {charger_id}",
                self.id
            ))
        })
    }

    fn with_charger_state(&self, charger_id: &str, cs: ChargerState) -> Self {
        Self {
            state: self.state.update(charger_id.to_string(), cs),
            ..self.clone()
        }
    }

    pub fn get_price(&self, charger_id: &str) -> Option<Currency> {
        self.state.get(charger_id).map(|cs| cs.price_per_kwh)
    }

    /// The station-local charger instance, whose rate may differ from the charger table.
    pub fn get_charger_instance(&self, charger_id: &str) -> SimResult<&Charger> {
        self.charger_state(charger_id).map(|cs| &cs.charger)
    }

    pub fn available_chargers(&self, charger_id: &str) -> usize {
        self.state.get(charger_id).map_or(0, |cs| cs.available_chargers)
    }

    pub fn total_chargers(&self, charger_id: &str) -> Option<usize> {
        self.state.get(charger_id).map(|cs| cs.total_chargers)
    }

    pub fn has_available_charger(&self, charger_id: &str) -> bool {
        self.state
            .get(charger_id)
            .is_some_and(ChargerState::has_available_charger)
    }

    pub fn has_on_shift_access_charging(&self) -> bool {
        !self.on_shift_access_chargers.is_empty()
    }

    pub fn enqueued_vehicle_count(&self, charger_id: &str) -> Option<usize> {
        self.state.get(charger_id).map(|cs| cs.enqueued_vehicles.len())
    }

    /// Charger queue holding `vehicle_id`, if any.
    pub fn queue_of(&self, vehicle_id: &str) -> Option<&ChargerId> {
        self.state
            .iter()
            .find(|(_, cs)| cs.enqueued_vehicles.iter().any(|v| v == vehicle_id))
            .map(|(id, _)| id)
    }

    /// Take a plug. `Ok(None)` when all plugs of that type are busy.
    pub fn checkout_charger(&self, charger_id: &str) -> SimResult<Option<Station>> {
        let cs = self.charger_state(charger_id)?;
        if !cs.has_available_charger() {
            return Ok(None);
        }
        let updated = ChargerState {
            available_chargers: cs.available_chargers - 1,
            ..cs.clone()
        };
        Ok(Some(self.with_charger_state(charger_id, updated)))
    }

    pub fn return_charger(&self, charger_id: &str) -> SimResult<Station> {
        let cs = self.charger_state(charger_id)?;
        if cs.available_chargers >= cs.total_chargers {
            return Err(SimError::state(format!(
                "returning charger {charger_id} to station {} would exceed its {} plugs",
                self.id, cs.total_chargers
            )));
        }
        let updated = ChargerState {
            available_chargers: cs.available_chargers + 1,
            ..cs.clone()
        };
        Ok(self.with_charger_state(charger_id, updated))
    }

    /// Append `vehicle_id` to the queue for `charger_id`. Enqueueing twice for the same charger
    /// is a no-op; waiting for a different charger is an error.
    pub fn enqueue_for_vehicle(&self, charger_id: &str, vehicle_id: &str) -> SimResult<Station> {
        let cs = self.charger_state(charger_id)?;
        match self.queue_of(vehicle_id) {
            Some(existing) if existing == charger_id => Ok(self.clone()),
            Some(existing) => Err(SimError::state(format!(
                "vehicle {vehicle_id} is already enqueued for charger {existing} at station {}",
                self.id
            ))),
            None => {
                let mut updated = cs.clone();
                updated.enqueued_vehicles.push_back(vehicle_id.to_string());
                Ok(self.with_charger_state(charger_id, updated))
            }
        }
    }

    pub fn dequeue_for_vehicle(&self, charger_id: &str, vehicle_id: &str) -> SimResult<Station> {
        let cs = self.charger_state(charger_id)?;
        let Some(idx) = cs.enqueued_vehicles.index_of(&vehicle_id.to_string()) else {
            return Err(SimError::state(format!(
                "vehicle {vehicle_id} is not enqueued for charger {charger_id} at station {}",
                self.id
            )));
        };
        let mut updated = cs.clone();
        updated.enqueued_vehicles.remove(idx);
        Ok(self.with_charger_state(charger_id, updated))
    }

    pub fn receive_payment(&self, amount: Currency) -> Station {
        Self {
            balance: self.balance + amount,
            ..self.clone()
        }
    }

    /// Set prices for the listed chargers. Unknown charger ids are an error.
    pub fn update_prices<'a>(
        &self,
        prices: impl IntoIterator<Item = (&'a ChargerId, &'a Currency)>,
    ) -> SimResult<Station> {
        let mut station = self.clone();
        for (charger_id, price) in prices {
            let cs = station.charger_state(charger_id)?;
            let updated = ChargerState {
                price_per_kwh: *price,
                ..cs.clone()
            };
            station = station.with_charger_state(charger_id, updated);
        }
        Ok(station)
    }

    pub fn set_charger_rate(&self, charger_id: &str, rate: f64) -> SimResult<Station> {
        let cs = self.charger_state(charger_id)?;
        if rate < 0.0 || rate > cs.charger.rate {
            return Err(SimError::state(format!(
                "charge rate {rate} for {charger_id} must be in [0, {}]",
                cs.charger.rate
            )));
        }
        let updated = ChargerState {
            charger: cs.charger.with_rate(rate),
            ..cs.clone()
        };
        Ok(self.with_charger_state(charger_id, updated))
    }

    /// Scale the station-local charge rate by `factor` in `[0, 1]`.
    pub fn scale_charger_rate(&self, charger_id: &str, factor: f64) -> SimResult<Station> {
        if !(0.0..=1.0).contains(&factor) {
            return Err(SimError::state(format!(
                "charge rate factor must be in [0, 1], found {factor}"
            )));
        }
        let rate = self.charger_state(charger_id)?.charger.rate * factor;
        self.set_charger_rate(charger_id, rate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::charger::DCFC;
    use crate::test_helpers::{mock_station, test_cell};

    fn station() -> Station {
        mock_station("s1", test_cell(), 2)
    }

    #[test]
    fn checkout_and_return_respect_capacity() {
        let s = station();
        let one = s.checkout_charger(DCFC).expect("ok").expect("available");
        let two = one.checkout_charger(DCFC).expect("ok").expect("available");
        assert!(two.checkout_charger(DCFC).expect("ok").is_none());
        assert_eq!(two.available_chargers(DCFC), 0);

        let back = two.return_charger(DCFC).expect("return");
        assert_eq!(back.available_chargers(DCFC), 1);
        assert!(s.return_charger(DCFC).is_err());
        assert!(s.checkout_charger("missing").is_err());
    }

    #[test]
    fn queue_is_fifo_and_single_membership() {
        let s = station()
            .enqueue_for_vehicle(DCFC, "v2")
            .and_then(|s| s.enqueue_for_vehicle(DCFC, "v1"))
            .expect("enqueue");
        assert_eq!(s.enqueued_vehicle_count(DCFC), Some(2));
        let front: Vec<&String> = s.state[DCFC].enqueued_vehicles.iter().collect();
        assert_eq!(front, vec!["v2", "v1"]);

        let again = s.enqueue_for_vehicle(DCFC, "v1").expect("idempotent");
        assert_eq!(again.enqueued_vehicle_count(DCFC), Some(2));

        let s = s.dequeue_for_vehicle(DCFC, "v2").expect("dequeue");
        assert_eq!(s.enqueued_vehicle_count(DCFC), Some(1));
        assert!(s.dequeue_for_vehicle(DCFC, "v2").is_err());
    }

    #[test]
    fn scale_rate_bounds() {
        let s = station();
        let halved = s.scale_charger_rate(DCFC, 0.5).expect("scale");
        let rate = halved.get_charger_instance(DCFC).expect("charger").rate;
        assert!((rate - 25.0).abs() < 1e-9);
        assert!(s.scale_charger_rate(DCFC, 1.5).is_err());
    }

    #[test]
    fn prices_and_payments() {
        let s = station();
        let prices: im::OrdMap<ChargerId, Currency> = [(DCFC.to_string(), 0.3)].into_iter().collect();
        let s = s.update_prices(prices.iter()).expect("prices");
        assert_eq!(s.get_price(DCFC), Some(0.3));
        assert_eq!(s.receive_payment(2.5).balance, 2.5);
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn prop_available_never_exceeds_total(ops in proptest::collection::vec(any::<bool>(), 1..40)) {
                let mut s = mock_station("s1", test_cell(), 3);
                for checkout in ops {
                    s = if checkout {
                        s.checkout_charger(DCFC).expect("known charger").unwrap_or(s)
                    } else {
                        s.return_charger(DCFC).unwrap_or(s)
                    };
                    let total = s.total_chargers(DCFC).expect("total");
                    prop_assert!(s.available_chargers(DCFC) <= total);
                }
            }
        }
    }
}
