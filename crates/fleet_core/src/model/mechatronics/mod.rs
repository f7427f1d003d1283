//! Vehicle energy physics.
//!
//! A [`Mechatronics`] model owns everything energy related about a vehicle type: how much energy a
//! route costs, how fast it idles, how it charges, and how far it can go on what is left. Vehicles
//! only carry their reservoir levels and a `mechatronics_id` pointing into the environment's
//! table of models.
//!
//! - **[`Bev`]**: battery electric, tabular powertrain and tabular charge curve
//! - **[`Ice`]**: internal combustion, tabular powertrain scaled by mpg

use std::fmt;

use crate::model::charger::{Charger, EnergyType};
use crate::model::vehicle::Vehicle;
use crate::road_network::Link;
use crate::units::{Kilometers, MechatronicsId, Ratio, Seconds};

mod bev;
mod ice;
pub mod powercurve;
pub mod powertrain;

pub use bev::Bev;
pub use ice::Ice;
pub use powercurve::TabularPowercurve;
pub use powertrain::TabularPowertrain;

/// Reservoir level per energy type.
pub type EnergyLevels = im::OrdMap<EnergyType, f64>;

pub trait Mechatronics: Send + Sync + fmt::Debug {
    fn mechatronics_id(&self) -> &MechatronicsId;

    /// The reservoir this model draws from.
    fn energy_type(&self) -> EnergyType;

    fn valid_charger(&self, charger: &Charger) -> bool {
        charger.energy_type == self.energy_type()
    }

    /// Reservoir levels for a vehicle starting at `soc`.
    fn initial_energy(&self, soc: Ratio) -> EnergyLevels;

    fn range_remaining_km(&self, vehicle: &Vehicle) -> Kilometers;

    /// State of charge needed to cover `required_range_km`.
    fn calc_required_soc(&self, required_range_km: Kilometers) -> Ratio;

    fn fuel_source_soc(&self, vehicle: &Vehicle) -> Ratio;

    fn is_empty(&self, vehicle: &Vehicle) -> bool;

    fn is_full(&self, vehicle: &Vehicle) -> bool;

    /// Energy spent driving `route`. Never drains below zero.
    fn consume_energy(&self, vehicle: &Vehicle, route: &[Link]) -> Vehicle;

    fn idle(&self, vehicle: &Vehicle, seconds: Seconds) -> Vehicle;

    /// Charge for up to `seconds`. Returns the charged vehicle and the seconds actually spent.
    fn add_energy(&self, vehicle: &Vehicle, charger: &Charger, seconds: Seconds) -> (Vehicle, Seconds);
}

/// Upper bound on simulated charge steps when estimating time to full.
const MAX_FILL_STEPS: usize = 10_000;

/// Estimate how long `charger` takes to bring `vehicle` to `target_soc` by charging an imaginary
/// copy in `step_seconds` increments. Stops early when charging makes no more progress.
pub fn time_to_full(
    vehicle: &Vehicle,
    mechatronics: &dyn Mechatronics,
    charger: &Charger,
    target_soc: Ratio,
    step_seconds: Seconds,
) -> Seconds {
    let mut charging = vehicle.clone();
    let mut elapsed: Seconds = 0;
    for _ in 0..MAX_FILL_STEPS {
        if mechatronics.fuel_source_soc(&charging) >= target_soc {
            break;
        }
        let before = mechatronics.fuel_source_soc(&charging);
        let (updated, delta) = mechatronics.add_energy(&charging, charger, step_seconds);
        elapsed += delta;
        if delta == 0 || mechatronics.fuel_source_soc(&updated) <= before {
            break;
        }
        charging = updated;
    }
    elapsed
}

/// Piecewise linear interpolation over sorted `xs`, clamped to the end values.
pub(crate) fn interp(x: f64, xs: &[f64], ys: &[f64]) -> f64 {
    let (Some(&x0), Some(&xn)) = (xs.first(), xs.last()) else {
        return 0.0;
    };
    if x <= x0 {
        return ys.first().copied().unwrap_or(0.0);
    }
    if x >= xn {
        return ys.last().copied().unwrap_or(0.0);
    }
    let idx = xs.partition_point(|v| *v <= x);
    let (xa, xb) = (xs[idx - 1], xs[idx]);
    let (ya, yb) = (ys[idx - 1], ys[idx]);
    if xb == xa {
        return ya;
    }
    ya + (yb - ya) * (x - xa) / (xb - xa)
}
