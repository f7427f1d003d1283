//! Pre-defined parameter space configurations for experimentation.
//!
//! Ready-made spaces selectable by name from the sweep example and the xtask runner.

use fleet_core::config::ChargingSearchType;

use crate::parameters::ParameterSpace;

const BOTH_SEARCH_TYPES: [ChargingSearchType; 2] = [
    ChargingSearchType::NearestShortestQueue,
    ChargingSearchType::ShortestTimeToCharge,
];

/// Everything at once. Large; prefer `sample_random` over `generate`.
pub fn comprehensive_space() -> ParameterSpace {
    ParameterSpace::grid()
        .num_vehicles(vec![25, 50, 100, 200])
        .num_requests(vec![250, 500, 1000, 2000])
        .num_stations(vec![5, 10, 20])
        .charging_search_type(BOTH_SEARCH_TYPES.to_vec())
        .fastcharge_soc_limit(vec![0.6, 0.7, 0.8, 0.9])
        .human_driver_share(vec![0.0, 0.25, 0.5])
        .duration_hours(vec![4, 8, 12])
}

/// Compares the two charging search strategies across station densities.
pub fn charging_search_space() -> ParameterSpace {
    ParameterSpace::grid()
        .num_stations(vec![3, 6, 12])
        .charging_search_type(BOTH_SEARCH_TYPES.to_vec())
        .fastcharge_soc_limit(vec![0.7, 0.8])
        .replications(3)
}

/// Fleet size against demand.
pub fn supply_demand_space() -> ParameterSpace {
    ParameterSpace::grid()
        .num_vehicles(vec![25, 50, 100, 150])
        .num_requests(vec![250, 500, 1000])
        .replications(2)
}

/// Share of scheduled human drivers in an otherwise autonomous fleet.
pub fn driver_mix_space() -> ParameterSpace {
    ParameterSpace::grid()
        .human_driver_share(vec![0.0, 0.25, 0.5, 0.75, 1.0])
        .duration_hours(vec![8, 24])
}

/// A handful of small runs for smoke tests.
pub fn minimal_space() -> ParameterSpace {
    ParameterSpace::grid()
        .num_vehicles(vec![5, 10])
        .num_requests(vec![20])
        .num_stations(vec![2])
        .duration_hours(vec![1])
}

/// Look up a space by the name used on the command line.
pub fn space_by_name(name: &str) -> Option<ParameterSpace> {
    match name {
        "comprehensive" => Some(comprehensive_space()),
        "charging_search" => Some(charging_search_space()),
        "supply_demand" => Some(supply_demand_space()),
        "driver_mix" => Some(driver_mix_space()),
        "minimal" => Some(minimal_space()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn named_spaces_resolve() {
        for name in ["comprehensive", "charging_search", "supply_demand", "driver_mix", "minimal"] {
            assert!(space_by_name(name).is_some(), "{name}");
        }
        assert!(space_by_name("surge").is_none());
    }

    #[test]
    fn charging_search_space_replicates_each_combination() {
        let space = charging_search_space();
        assert_eq!(space.combination_count(), 12);
        assert_eq!(space.generate().len(), 36);
    }
}
