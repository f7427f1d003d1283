use serde::{Deserialize, Serialize};
use tracing::warn;

use super::powercurve::{TabularPowercurve, NORMALIZED_POWERCURVE};
use super::powertrain::{TabularPowertrain, NORMALIZED_POWERTRAIN};
use super::{EnergyLevels, Mechatronics};
use crate::model::charger::{Charger, EnergyType};
use crate::model::vehicle::Vehicle;
use crate::road_network::Link;
use crate::units::{Kilometers, Kw, KwH, MechatronicsId, Ratio, Seconds, MILE_TO_KM, SECONDS_TO_HOURS, WH_TO_KWH};

/// Battery electric vehicle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bev {
    pub mechatronics_id: MechatronicsId,
    pub battery_capacity_kwh: KwH,
    pub idle_kwh_per_hour: KwH,
    pub nominal_watt_hour_per_mile: f64,
    /// Chargers slower than this charge linearly, faster ones follow the powercurve.
    pub charge_taper_cutoff_kw: Kw,
    pub battery_full_threshold_kwh: KwH,
    powertrain: TabularPowertrain,
    powercurve: TabularPowercurve,
}

impl Bev {
    pub fn new(
        mechatronics_id: impl Into<MechatronicsId>,
        battery_capacity_kwh: KwH,
        idle_kwh_per_hour: KwH,
        nominal_watt_hour_per_mile: f64,
        nominal_max_charge_kw: Kw,
        charge_taper_cutoff_kw: Kw,
    ) -> Self {
        Self {
            mechatronics_id: mechatronics_id.into(),
            battery_capacity_kwh,
            idle_kwh_per_hour,
            nominal_watt_hour_per_mile,
            charge_taper_cutoff_kw,
            battery_full_threshold_kwh: 0.1,
            powertrain: TabularPowertrain::from_normalized(&NORMALIZED_POWERTRAIN, nominal_watt_hour_per_mile),
            powercurve: TabularPowercurve::from_normalized(
                &NORMALIZED_POWERCURVE,
                battery_capacity_kwh,
                nominal_max_charge_kw,
            ),
        }
    }

    pub fn with_powercurve(mut self, powercurve: TabularPowercurve) -> Self {
        self.powercurve = powercurve;
        self
    }

    pub fn with_powertrain(mut self, powertrain: TabularPowertrain) -> Self {
        self.powertrain = powertrain;
        self
    }

    fn energy_kwh(&self, vehicle: &Vehicle) -> KwH {
        vehicle.energy_of(EnergyType::Electric)
    }

    fn with_energy(&self, vehicle: &Vehicle, kwh: KwH) -> Vehicle {
        vehicle.modify_energy(EnergyType::Electric, kwh.max(0.0))
    }
}

impl Mechatronics for Bev {
    fn mechatronics_id(&self) -> &MechatronicsId {
        &self.mechatronics_id
    }

    fn energy_type(&self) -> EnergyType {
        EnergyType::Electric
    }

    fn initial_energy(&self, soc: Ratio) -> EnergyLevels {
        EnergyLevels::unit(EnergyType::Electric, self.battery_capacity_kwh * soc)
    }

    fn range_remaining_km(&self, vehicle: &Vehicle) -> Kilometers {
        self.energy_kwh(vehicle) / (self.nominal_watt_hour_per_mile * WH_TO_KWH) * MILE_TO_KM
    }

    fn calc_required_soc(&self, required_range_km: Kilometers) -> Ratio {
        let kwh = required_range_km / MILE_TO_KM * self.nominal_watt_hour_per_mile * WH_TO_KWH;
        kwh / self.battery_capacity_kwh
    }

    fn fuel_source_soc(&self, vehicle: &Vehicle) -> Ratio {
        self.energy_kwh(vehicle) / self.battery_capacity_kwh
    }

    fn is_empty(&self, vehicle: &Vehicle) -> bool {
        self.energy_kwh(vehicle) <= 0.0
    }

    fn is_full(&self, vehicle: &Vehicle) -> bool {
        self.energy_kwh(vehicle) >= self.battery_capacity_kwh - self.battery_full_threshold_kwh
    }

    fn consume_energy(&self, vehicle: &Vehicle, route: &[Link]) -> Vehicle {
        let used_kwh = self.powertrain.energy_cost(route) * WH_TO_KWH;
        self.with_energy(vehicle, self.energy_kwh(vehicle) - used_kwh)
    }

    fn idle(&self, vehicle: &Vehicle, seconds: Seconds) -> Vehicle {
        let used_kwh = self.idle_kwh_per_hour * seconds as f64 * SECONDS_TO_HOURS;
        self.with_energy(vehicle, self.energy_kwh(vehicle) - used_kwh)
    }

    fn add_energy(&self, vehicle: &Vehicle, charger: &Charger, seconds: Seconds) -> (Vehicle, Seconds) {
        if !self.valid_charger(charger) {
            warn!(
                vehicle_id = %vehicle.id,
                charger_id = %charger.id,
                "BEV cannot use {} charger, not charging", charger.energy_type
            );
            return (vehicle.clone(), 0);
        }
        let start = self.energy_kwh(vehicle);
        let (energy, elapsed) = if charger.rate < self.charge_taper_cutoff_kw {
            (start + charger.rate * seconds as f64 * SECONDS_TO_HOURS, seconds)
        } else {
            let limit = self.battery_capacity_kwh - self.battery_full_threshold_kwh;
            self.powercurve.charge(start, limit, charger.rate, seconds)
        };
        (self.with_energy(vehicle, energy.min(self.battery_capacity_kwh)), elapsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::charger::{DCFC, LEVEL_2};
    use crate::road_network::Link;
    use crate::test_helpers::{mock_bev, mock_vehicle_with_soc, test_cell, test_cell_offset};

    #[test]
    fn range_and_required_soc_agree() {
        let bev = mock_bev();
        let v = mock_vehicle_with_soc("v1", 1.0);
        let range = bev.range_remaining_km(&v);
        // 50 kWh at 225 Wh/mile is ~222 miles
        assert!((range - 222.2 * MILE_TO_KM).abs() < 1.0, "got {range}");
        assert!((bev.calc_required_soc(range) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn driving_costs_energy_and_never_goes_negative() {
        let bev = mock_bev();
        let v = mock_vehicle_with_soc("v1", 0.5);
        let link = Link::new("l", test_cell(), test_cell_offset(0.05, 0.0), 40.0);
        let driven = bev.consume_energy(&v, &[link.clone()]);
        assert!(driven.energy_of(EnergyType::Electric) < v.energy_of(EnergyType::Electric));

        let nearly_empty = mock_vehicle_with_soc("v2", 0.0001);
        let drained = bev.consume_energy(&nearly_empty, &[link]);
        assert_eq!(drained.energy_of(EnergyType::Electric), 0.0);
        assert!(bev.is_empty(&drained));
    }

    #[test]
    fn idle_draws_hourly_rate() {
        let bev = mock_bev();
        let v = mock_vehicle_with_soc("v1", 0.5);
        let idled = bev.idle(&v, 3600);
        let delta = v.energy_of(EnergyType::Electric) - idled.energy_of(EnergyType::Electric);
        assert!((delta - 0.8).abs() < 1e-9);
    }

    #[test]
    fn slow_chargers_are_linear_and_fast_chargers_taper() {
        let bev = mock_bev();
        let v = mock_vehicle_with_soc("v1", 0.5);
        let (l2, t) = bev.add_energy(&v, &Charger::electric(LEVEL_2, 7.2), 3600);
        assert_eq!(t, 3600);
        assert!((l2.energy_of(EnergyType::Electric) - 32.2).abs() < 1e-9);

        let (fast, _) = bev.add_energy(&v, &Charger::electric(DCFC, 50.0), 60);
        assert!(fast.energy_of(EnergyType::Electric) > v.energy_of(EnergyType::Electric));
        assert!(!bev.is_full(&fast));
    }

    #[test]
    fn gasoline_pumps_are_rejected() {
        let bev = mock_bev();
        let v = mock_vehicle_with_soc("v1", 0.5);
        let pump = Charger::new("pump", EnergyType::Gasoline, 0.1, "gallons/second");
        let (same, t) = bev.add_energy(&v, &pump, 60);
        assert_eq!(t, 0);
        assert_eq!(same, v);
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn prop_driving_never_drains_below_zero(
                soc in 0.0..1.0f64,
                hops in proptest::collection::vec((-0.05..0.05f64, -0.05..0.05f64), 1..10)
            ) {
                let bev = mock_bev();
                let mut vehicle = mock_vehicle_with_soc("v1", soc);
                let mut from = test_cell();
                for (dlat, dlng) in hops {
                    let to = test_cell_offset(dlat, dlng);
                    let route = vec![Link::new(to.to_string(), from, to, 40.0)];
                    vehicle = bev.consume_energy(&vehicle, &route);
                    prop_assert!(vehicle.energy_of(EnergyType::Electric) >= 0.0);
                    prop_assert!(bev.fuel_source_soc(&vehicle) <= 1.0);
                    from = to;
                }
            }
        }
    }
}
