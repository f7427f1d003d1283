use serde::{Deserialize, Serialize};

use crate::error::{SimError, SimResult};
use crate::model::membership::Membership;
use crate::road_network::EntityPosition;
use crate::units::{BaseId, MembershipId, StationId};

/// A parking depot, optionally co-located with a station.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Base {
    pub id: BaseId,
    pub position: EntityPosition,
    pub membership: Membership,
    pub total_stalls: usize,
    pub available_stalls: usize,
    pub station_id: Option<StationId>,
}

impl Base {
    pub fn new(id: impl Into<BaseId>, position: EntityPosition, stalls: usize) -> Self {
        Self {
            id: id.into(),
            position,
            membership: Membership::public(),
            total_stalls: stalls,
            available_stalls: stalls,
            station_id: None,
        }
    }

    pub fn with_station(mut self, station_id: impl Into<StationId>) -> Self {
        self.station_id = Some(station_id.into());
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

    pub fn geoid(&self) -> h3o::CellIndex {
        self.position.geoid
    }

    pub fn has_available_stall(&self, membership: &Membership) -> bool {
        self.available_stalls > 0 && self.membership.grant_access_to_membership(membership)
    }

    /// Take a stall, `None` when the base is full.
    pub fn checkout_stall(&self) -> Option<Base> {
        if self.available_stalls == 0 {
            return None;
        }
        Some(Self {
            available_stalls: self.available_stalls - 1,
            ..self.clone()
        })
    }

    pub fn return_stall(&self) -> SimResult<Base> {
        if self.available_stalls + 1 > self.total_stalls {
            return Err(SimError::state(format!(
                "base {} already has all {} stalls available",
                self.id, self.total_stalls
            )));
        }
        Ok(Self {
            available_stalls: self.available_stalls + 1,
            ..self.clone()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{mock_base, test_cell};

    #[test]
    fn stalls_stay_within_bounds() {
        let b = mock_base("b1", test_cell(), 1);
        let taken = b.checkout_stall().expect("stall");
        assert!(taken.checkout_stall().is_none());
        assert!(!taken.has_available_stall(&Membership::public()));
        let returned = taken.return_stall().expect("return");
        assert_eq!(returned.available_stalls, 1);
        assert!(returned.return_stall().is_err());
    }

    #[test]
    fn stall_access_follows_membership() {
        let fleet = Membership::single("fleet").expect("membership");
        let b = mock_base("b1", test_cell(), 2).with_membership(fleet.clone());
        assert!(b.has_available_stall(&fleet));
        assert!(!b.has_available_stall(&Membership::single("other").expect("membership")));
    }
}
