use serde::{Deserialize, Serialize};
use tracing::warn;

use super::powertrain::{TabularPowertrain, NORMALIZED_POWERTRAIN};
use super::{EnergyLevels, Mechatronics};
use crate::model::charger::{Charger, EnergyType};
use crate::model::vehicle::Vehicle;
use crate::road_network::Link;
use crate::units::{Kilometers, MechatronicsId, Ratio, Seconds, MILE_TO_KM, SECONDS_TO_HOURS};

/// Internal combustion vehicle. Pump rates are gallons per second.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ice {
    pub mechatronics_id: MechatronicsId,
    pub tank_capacity_gallons: f64,
    pub idle_gallons_per_hour: f64,
    pub nominal_miles_per_gallon: f64,
    powertrain: TabularPowertrain,
}

impl Ice {
    pub fn new(
        mechatronics_id: impl Into<MechatronicsId>,
        tank_capacity_gallons: f64,
        idle_gallons_per_hour: f64,
        nominal_miles_per_gallon: f64,
    ) -> Self {
        Self {
            mechatronics_id: mechatronics_id.into(),
            tank_capacity_gallons,
            idle_gallons_per_hour,
            nominal_miles_per_gallon,
            powertrain: TabularPowertrain::from_normalized(
                &NORMALIZED_POWERTRAIN,
                1.0 / nominal_miles_per_gallon,
            ),
        }
    }

    fn gallons(&self, vehicle: &Vehicle) -> f64 {
        vehicle.energy_of(EnergyType::Gasoline)
    }

    fn with_gallons(&self, vehicle: &Vehicle, gallons: f64) -> Vehicle {
        vehicle.modify_energy(EnergyType::Gasoline, gallons.max(0.0))
    }
}

impl Mechatronics for Ice {
    fn mechatronics_id(&self) -> &MechatronicsId {
        &self.mechatronics_id
    }

    fn energy_type(&self) -> EnergyType {
        EnergyType::Gasoline
    }

    fn initial_energy(&self, soc: Ratio) -> EnergyLevels {
        EnergyLevels::unit(EnergyType::Gasoline, self.tank_capacity_gallons * soc)
    }

    fn range_remaining_km(&self, vehicle: &Vehicle) -> Kilometers {
        self.gallons(vehicle) * self.nominal_miles_per_gallon * MILE_TO_KM
    }

    fn calc_required_soc(&self, required_range_km: Kilometers) -> Ratio {
        let gallons = required_range_km / MILE_TO_KM / self.nominal_miles_per_gallon;
        gallons / self.tank_capacity_gallons
    }

    fn fuel_source_soc(&self, vehicle: &Vehicle) -> Ratio {
        self.gallons(vehicle) / self.tank_capacity_gallons
    }

    fn is_empty(&self, vehicle: &Vehicle) -> bool {
        self.gallons(vehicle) <= 0.0
    }

    fn is_full(&self, vehicle: &Vehicle) -> bool {
        self.gallons(vehicle) >= self.tank_capacity_gallons
    }

    fn consume_energy(&self, vehicle: &Vehicle, route: &[Link]) -> Vehicle {
        let used = self.powertrain.energy_cost(route);
        self.with_gallons(vehicle, self.gallons(vehicle) - used)
    }

    fn idle(&self, vehicle: &Vehicle, seconds: Seconds) -> Vehicle {
        let used = self.idle_gallons_per_hour * seconds as f64 * SECONDS_TO_HOURS;
        self.with_gallons(vehicle, self.gallons(vehicle) - used)
    }

    fn add_energy(&self, vehicle: &Vehicle, charger: &Charger, seconds: Seconds) -> (Vehicle, Seconds) {
        if !self.valid_charger(charger) {
            warn!(
                vehicle_id = %vehicle.id,
                charger_id = %charger.id,
                "ICE cannot use {} charger, not refueling", charger.energy_type
            );
            return (vehicle.clone(), 0);
        }
        let pumped = self.gallons(vehicle) + charger.rate * seconds as f64;
        (self.with_gallons(vehicle, pumped.min(self.tank_capacity_gallons)), seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{mock_ice, mock_vehicle_with_mechatronics};

    #[test]
    fn tank_range_follows_mpg() {
        let ice = mock_ice();
        let v = mock_vehicle_with_mechatronics("v1", &ice, 1.0);
        let km = ice.range_remaining_km(&v);
        assert!((km - 450.0 * MILE_TO_KM).abs() < 1e-6);
        assert!(ice.is_full(&v));
    }

    #[test]
    fn pump_fills_to_capacity() {
        let ice = mock_ice();
        let v = mock_vehicle_with_mechatronics("v1", &ice, 0.5);
        let pump = Charger::new("pump", EnergyType::Gasoline, 0.1, "gallons/second");
        let (filled, t) = ice.add_energy(&v, &pump, 600);
        assert_eq!(t, 600);
        assert!(ice.is_full(&filled));
        assert_eq!(filled.energy_of(EnergyType::Gasoline), 15.0);
    }
}
