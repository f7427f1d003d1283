use std::fmt;

use serde::{Deserialize, Serialize};

use crate::units::ChargerId;

/// Energy reservoir kinds a vehicle may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EnergyType {
    Electric,
    Gasoline,
}

impl EnergyType {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "electric" => Some(EnergyType::Electric),
            "gasoline" => Some(EnergyType::Gasoline),
            _ => None,
        }
    }

    /// Unit name of the reservoir.
    pub fn units(&self) -> &'static str {
        match self {
            EnergyType::Electric => "kilowatthour",
            EnergyType::Gasoline => "gallon_gasoline",
        }
    }
}

impl fmt::Display for EnergyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EnergyType::Electric => write!(f, "electric"),
            EnergyType::Gasoline => write!(f, "gasoline"),
        }
    }
}

/// A charger (or pump) type. `rate` is kW for electric chargers and gallons/hour for pumps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Charger {
    pub id: ChargerId,
    pub energy_type: EnergyType,
    pub rate: f64,
    pub units: String,
}

pub const LEVEL_1: &str = "LEVEL_1";
pub const LEVEL_2: &str = "LEVEL_2";
pub const DCFC: &str = "DCFC";

impl Charger {
    pub fn new(id: impl Into<ChargerId>, energy_type: EnergyType, rate: f64, units: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            energy_type,
            rate,
            units: units.into(),
        }
    }

    pub fn electric(id: impl Into<ChargerId>, rate_kw: f64) -> Self {
        Self::new(id, EnergyType::Electric, rate_kw, "kilowatt")
    }

    pub fn with_rate(&self, rate: f64) -> Self {
        Self {
            rate,
            ..self.clone()
        }
    }

    /// The three standard electric chargers.
    pub fn standard_chargers() -> Vec<Charger> {
        vec![
            Charger::electric(LEVEL_1, 3.3),
            Charger::electric(LEVEL_2, 7.2),
            Charger::electric(DCFC, 50.0),
        ]
    }
}
