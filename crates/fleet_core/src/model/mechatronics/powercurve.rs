//! Tabular charge curve: maximum accepted power as a function of battery energy.

use serde::{Deserialize, Serialize};

use super::interp;
use crate::units::{Kw, KwH, Seconds, SECONDS_TO_HOURS};

/// Normalized curve as `(state of charge, fraction of nominal max power)`.
pub const NORMALIZED_POWERCURVE: [(f64, f64); 8] = [
    (0.0, 0.6),
    (0.1, 0.9),
    (0.2, 1.0),
    (0.5, 1.0),
    (0.7, 0.8),
    (0.8, 0.6),
    (0.9, 0.35),
    (1.0, 0.1),
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TabularPowercurve {
    energy_kwh: Vec<KwH>,
    rate_kw: Vec<Kw>,
    step_size_seconds: Seconds,
}

impl TabularPowercurve {
    /// Scale a normalized `(soc, power fraction)` table to a battery.
    pub fn from_normalized(
        table: &[(f64, f64)],
        battery_capacity_kwh: KwH,
        nominal_max_charge_kw: Kw,
    ) -> Self {
        let mut rows = table.to_vec();
        rows.sort_by(|a, b| a.0.total_cmp(&b.0));
        Self {
            energy_kwh: rows.iter().map(|(soc, _)| soc * battery_capacity_kwh).collect(),
            rate_kw: rows.iter().map(|(_, p)| p * nominal_max_charge_kw).collect(),
            step_size_seconds: 1,
        }
    }

    pub fn with_step_size_seconds(mut self, step: Seconds) -> Self {
        self.step_size_seconds = step.max(1);
        self
    }

    /// Accepted power at an energy level.
    pub fn rate_at(&self, energy_kwh: KwH) -> Kw {
        interp(energy_kwh, &self.energy_kwh, &self.rate_kw)
    }

    /// Charge from `start_kwh` toward `full_kwh` for up to `duration_seconds` from a charger
    /// delivering at most `power_kw`. Returns the final energy and the seconds spent.
    pub fn charge(&self, start_kwh: KwH, full_kwh: KwH, power_kw: Kw, duration_seconds: Seconds) -> (KwH, Seconds) {
        let step_hours = self.step_size_seconds as f64 * SECONDS_TO_HOURS;
        let mut t: Seconds = 0;
        let mut energy = start_kwh;
        while t < duration_seconds && energy < full_kwh {
            let kw = self.rate_at(energy).min(power_kw);
            energy += kw * step_hours;
            t += self.step_size_seconds;
        }
        (energy, t)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn charger_power_caps_curve() {
        let pc = TabularPowercurve::from_normalized(&NORMALIZED_POWERCURVE, 50.0, 50.0);
        assert!((pc.rate_at(15.0) - 50.0).abs() < 1e-9);
        let (energy, t) = pc.charge(15.0, 49.9, 7.2, 3600);
        assert_eq!(t, 3600);
        assert!((energy - 22.2).abs() < 1e-6, "got {energy}");
    }

    #[test]
    fn charge_stops_at_full() {
        let pc = TabularPowercurve::from_normalized(&NORMALIZED_POWERCURVE, 50.0, 50.0);
        let (energy, t) = pc.charge(49.85, 49.9, 50.0, 600);
        assert!(energy >= 49.9);
        assert!(t < 600);
    }
}
