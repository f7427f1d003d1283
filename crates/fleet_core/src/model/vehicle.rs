use h3o::CellIndex;
use serde::Serialize;

use crate::driver_state::DriverState;
use crate::model::charger::EnergyType;
use crate::model::mechatronics::EnergyLevels;
use crate::model::membership::Membership;
use crate::road_network::EntityPosition;
use crate::units::{Currency, Kilometers, MechatronicsId, MembershipId, VehicleId};
use crate::error::SimResult;
use crate::vehicle_state::{Idle, VehicleState};

/// A fleet vehicle. Immutable; every `modify_*` returns an updated copy.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Vehicle {
    pub id: VehicleId,
    pub position: EntityPosition,
    pub membership: Membership,
    pub mechatronics_id: MechatronicsId,
    pub energy: EnergyLevels,
    pub energy_gained: EnergyLevels,
    pub energy_expended: EnergyLevels,
    pub vehicle_state: VehicleState,
    pub driver_state: DriverState,
    pub total_seats: usize,
    pub balance: Currency,
    pub distance_traveled_km: Kilometers,
}

impl Vehicle {
    /// A new vehicle starts Idle with an autonomous driver.
    pub fn new(
        id: impl Into<VehicleId>,
        position: EntityPosition,
        mechatronics_id: impl Into<MechatronicsId>,
        energy: EnergyLevels,
        total_seats: usize,
    ) -> Self {
        let id = id.into();
        Self {
            vehicle_state: VehicleState::Idle(Idle::build(id.clone())),
            driver_state: DriverState::autonomous(id.clone()),
            id,
            position,
            membership: Membership::public(),
            mechatronics_id: mechatronics_id.into(),
            energy,
            energy_gained: EnergyLevels::new(),
            energy_expended: EnergyLevels::new(),
            total_seats,
            balance: 0.0,
            distance_traveled_km: 0.0,
        }
    }

    pub fn with_membership(mut self, membership: Membership) -> Self {
        self.membership = membership;
        self
    }

    pub fn with_driver_state(mut self, driver_state: DriverState) -> Self {
        self.driver_state = driver_state;
        self
    }

    pub fn geoid(&self) -> CellIndex {
        self.position.geoid
    }

    /// Level of one reservoir, zero when the vehicle has none of that type.
    pub fn energy_of(&self, energy_type: EnergyType) -> f64 {
        self.energy.get(&energy_type).copied().unwrap_or(0.0)
    }

    /// Set a reservoir level, booking the difference as gained or expended energy.
    pub fn modify_energy(&self, energy_type: EnergyType, level: f64) -> Vehicle {
        let level = level.max(0.0);
        let delta = level - self.energy_of(energy_type);
        let mut updated = self.clone();
        updated.energy.insert(energy_type, level);
        if delta > 0.0 {
            let gained = updated.energy_gained.get(&energy_type).copied().unwrap_or(0.0);
            updated.energy_gained.insert(energy_type, gained + delta);
        } else if delta < 0.0 {
            let expended = updated.energy_expended.get(&energy_type).copied().unwrap_or(0.0);
            updated.energy_expended.insert(energy_type, expended - delta);
        }
        updated
    }

    pub fn modify_vehicle_state(&self, vehicle_state: VehicleState) -> Vehicle {
        Self {
            vehicle_state,
            ..self.clone()
        }
    }

    pub fn modify_driver_state(&self, driver_state: DriverState) -> Vehicle {
        Self {
            driver_state,
            ..self.clone()
        }
    }

    pub fn modify_position(&self, position: EntityPosition) -> Vehicle {
        Self {
            position,
            ..self.clone()
        }
    }

    pub fn send_payment(&self, amount: Currency) -> Vehicle {
        Self {
            balance: self.balance - amount,
            ..self.clone()
        }
    }

    pub fn receive_payment(&self, amount: Currency) -> Vehicle {
        Self {
            balance: self.balance + amount,
            ..self.clone()
        }
    }

    pub fn tick_distance_traveled_km(&self, km: Kilometers) -> Vehicle {
        Self {
            distance_traveled_km: self.distance_traveled_km + km,
            ..self.clone()
        }
    }

    pub fn add_membership(&self, membership_id: impl Into<MembershipId>) -> SimResult<Vehicle> {
        Ok(Self {
            membership: self.membership.add_membership(membership_id)?,
            ..self.clone()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::mock_vehicle_with_soc;

    #[test]
    fn energy_changes_are_booked() {
        let v = mock_vehicle_with_soc("v1", 0.5);
        let start = v.energy_of(EnergyType::Electric);
        let drained = v.modify_energy(EnergyType::Electric, start - 5.0);
        let charged = drained.modify_energy(EnergyType::Electric, start + 2.0);
        assert_eq!(charged.energy_expended.get(&EnergyType::Electric), Some(&5.0));
        assert_eq!(charged.energy_gained.get(&EnergyType::Electric), Some(&7.0));
        assert_eq!(v.energy_of(EnergyType::Gasoline), 0.0);
    }

    #[test]
    fn energy_is_never_negative() {
        let v = mock_vehicle_with_soc("v1", 0.1);
        let drained = v.modify_energy(EnergyType::Electric, -3.0);
        assert_eq!(drained.energy_of(EnergyType::Electric), 0.0);
    }

    #[test]
    fn payments_move_balance() {
        let v = mock_vehicle_with_soc("v1", 0.5)
            .receive_payment(12.5)
            .send_payment(2.5)
            .tick_distance_traveled_km(1.5);
        assert_eq!(v.balance, 10.0);
        assert_eq!(v.distance_traveled_km, 1.5);
    }

    #[test]
    fn new_vehicles_start_idle_and_autonomous() {
        let v = mock_vehicle_with_soc("v1", 0.5);
        assert!(matches!(v.vehicle_state, VehicleState::Idle(_)));
        assert!(v.driver_state.available());
        assert_eq!(v.vehicle_state.vehicle_id(), "v1");
    }
}
