//! Tabular powertrain: energy per mile as a function of link speed.

use serde::{Deserialize, Serialize};

use super::interp;
use crate::road_network::Link;
use crate::units::KM_TO_MILE;

/// Normalized consumption as `(speed mph, fraction of nominal energy per mile)`.
pub const NORMALIZED_POWERTRAIN: [(f64, f64); 8] = [
    (5.0, 1.45),
    (15.0, 1.1),
    (25.0, 0.98),
    (35.0, 0.95),
    (45.0, 1.0),
    (55.0, 1.08),
    (65.0, 1.2),
    (75.0, 1.35),
];

/// Energy is reported in whatever unit `scale` is expressed in (watt-hours per mile for a
/// battery, gallons per mile for a tank).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TabularPowertrain {
    speed_mph: Vec<f64>,
    energy_per_mile: Vec<f64>,
}

impl TabularPowertrain {
    pub fn from_normalized(table: &[(f64, f64)], scale: f64) -> Self {
        let mut rows = table.to_vec();
        rows.sort_by(|a, b| a.0.total_cmp(&b.0));
        Self {
            speed_mph: rows.iter().map(|(s, _)| *s).collect(),
            energy_per_mile: rows.iter().map(|(_, e)| e * scale).collect(),
        }
    }

    pub fn link_cost(&self, link: &Link) -> f64 {
        let mph = link.speed_kmph * KM_TO_MILE;
        interp(mph, &self.speed_mph, &self.energy_per_mile) * link.distance_km * KM_TO_MILE
    }

    pub fn energy_cost(&self, route: &[Link]) -> f64 {
        route.iter().map(|l| self.link_cost(l)).sum()
    }
}
