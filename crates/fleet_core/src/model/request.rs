use h3o::CellIndex;
use serde::{Deserialize, Serialize};

use crate::model::membership::Membership;
use crate::road_network::{cell_serde, EntityPosition, RoadNetwork};
use crate::units::{Currency, PassengerId, RequestId, SimTime, VehicleId, KM_TO_MILE};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Passenger {
    pub id: PassengerId,
    #[serde(with = "cell_serde")]
    pub origin: CellIndex,
    #[serde(with = "cell_serde")]
    pub destination: CellIndex,
    pub departure_time: SimTime,
    pub vehicle_id: Option<VehicleId>,
}

impl Passenger {
    pub fn board(&self, vehicle_id: &str) -> Passenger {
        Self {
            vehicle_id: Some(vehicle_id.to_string()),
            ..self.clone()
        }
    }
}

/// Trip pricing: `max(minimum_price, base_price + price_per_mile * miles)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RequestRateStructure {
    pub base_price: Currency,
    pub price_per_mile: Currency,
    pub minimum_price: Currency,
}

impl Default for RequestRateStructure {
    fn default() -> Self {
        Self {
            base_price: 2.2,
            price_per_mile: 1.6,
            minimum_price: 5.0,
        }
    }
}

/// A trip request, alive from its departure time until pickup or cancellation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub id: RequestId,
    pub origin_position: EntityPosition,
    pub destination_position: EntityPosition,
    pub departure_time: SimTime,
    pub passengers: Vec<Passenger>,
    pub allows_pooling: bool,
    pub membership: Membership,
    pub value: Currency,
    pub dispatched_vehicle: Option<VehicleId>,
    pub dispatched_vehicle_time: Option<SimTime>,
}

impl Request {
    pub fn new(
        id: impl Into<RequestId>,
        origin_position: EntityPosition,
        destination_position: EntityPosition,
        departure_time: SimTime,
        passenger_count: usize,
        allows_pooling: bool,
    ) -> Self {
        let id = id.into();
        let passengers = (0..passenger_count.max(1))
            .map(|idx| Passenger {
                id: format!("{id}-{idx}"),
                origin: origin_position.geoid,
                destination: destination_position.geoid,
                departure_time,
                vehicle_id: None,
            })
            .collect();
        Self {
            id,
            origin_position,
            destination_position,
            departure_time,
            passengers,
            allows_pooling,
            membership: Membership::public(),
            value: 0.0,
            dispatched_vehicle: None,
            dispatched_vehicle_time: None,
        }
    }

    pub fn with_membership(mut self, membership: Membership) -> Self {
        self.membership = membership;
        self
    }

    pub fn origin(&self) -> CellIndex {
        self.origin_position.geoid
    }

    pub fn destination(&self) -> CellIndex {
        self.destination_position.geoid
    }

    /// Requests are indexed at their origin.
    pub fn geoid(&self) -> CellIndex {
        self.origin()
    }

    pub fn assign_dispatched_vehicle(&self, vehicle_id: &str, sim_time: SimTime) -> Request {
        Self {
            dispatched_vehicle: Some(vehicle_id.to_string()),
            dispatched_vehicle_time: Some(sim_time),
            ..self.clone()
        }
    }

    pub fn unassign_dispatched_vehicle(&self) -> Request {
        Self {
            dispatched_vehicle: None,
            dispatched_vehicle_time: None,
            ..self.clone()
        }
    }

    pub fn assign_value(&self, rate: &RequestRateStructure, road_network: &dyn RoadNetwork) -> Request {
        let km = road_network.distance_by_position_km(&self.origin_position, &self.destination_position);
        let price = rate.base_price + rate.price_per_mile * km * KM_TO_MILE;
        Self {
            value: price.max(rate.minimum_price),
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::road_network::HaversineRoadNetwork;
    use crate::test_helpers::{mock_request, test_cell, test_cell_offset};

    #[test]
    fn passengers_are_numbered_by_request() {
        let r = mock_request("r1", test_cell(), test_cell_offset(0.01, 0.0), 0, 3);
        let ids: Vec<&str> = r.passengers.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["r1-0", "r1-1", "r1-2"]);
    }

    #[test]
    fn value_has_a_floor() {
        let rn = HaversineRoadNetwork::default();
        let rate = RequestRateStructure::default();
        let short = mock_request("r1", test_cell(), test_cell_offset(0.001, 0.0), 0, 1);
        assert_eq!(short.assign_value(&rate, &rn).value, 5.0);

        // ~11.1 km is ~6.9 miles
        let long = mock_request("r2", test_cell(), test_cell_offset(0.1, 0.0), 0, 1);
        let v = long.assign_value(&rate, &rn).value;
        assert!((v - (2.2 + 1.6 * 6.9)).abs() < 0.1, "got {v}");
    }

    #[test]
    fn dispatch_assignment_round_trip() {
        let r = mock_request("r1", test_cell(), test_cell_offset(0.01, 0.0), 0, 1);
        let assigned = r.assign_dispatched_vehicle("v1", 60);
        assert_eq!(assigned.dispatched_vehicle.as_deref(), Some("v1"));
        assert_eq!(assigned.dispatched_vehicle_time, Some(60));
        assert_eq!(assigned.unassign_dispatched_vehicle(), r);
    }
}
