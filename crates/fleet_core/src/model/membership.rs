use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{SimError, SimResult};
use crate::units::MembershipId;

/// Reserved id meaning "no membership restrictions".
pub const PUBLIC_MEMBERSHIP_ID: &str = "public";

/// The fleets an entity belongs to. An empty membership is public.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Membership {
    memberships: im::OrdSet<MembershipId>,
}

impl Membership {
    pub fn public() -> Self {
        Self::default()
    }

    pub fn single(membership_id: impl Into<MembershipId>) -> SimResult<Self> {
        Self::from_ids([membership_id.into()])
    }

    pub fn from_ids(ids: impl IntoIterator<Item = MembershipId>) -> SimResult<Self> {
        let mut memberships = im::OrdSet::new();
        for id in ids {
            if id == PUBLIC_MEMBERSHIP_ID {
                return Err(SimError::state(format!(
                    "{PUBLIC_MEMBERSHIP_ID} is reserved, please use another membership id"
                )));
            }
            memberships.insert(id);
        }
        Ok(Self { memberships })
    }

    pub fn is_public(&self) -> bool {
        self.memberships.is_empty()
    }

    pub fn add_membership(&self, membership_id: impl Into<MembershipId>) -> SimResult<Self> {
        let id = membership_id.into();
        if id == PUBLIC_MEMBERSHIP_ID {
            return Err(SimError::state(format!(
                "{PUBLIC_MEMBERSHIP_ID} is reserved, please use another membership id"
            )));
        }
        Ok(Self {
            memberships: self.memberships.update(id),
        })
    }

    pub fn ids(&self) -> impl Iterator<Item = &MembershipId> {
        self.memberships.iter()
    }

    pub fn memberships_in_common(&self, other: &Membership) -> im::OrdSet<MembershipId> {
        self.memberships.clone().intersection(other.memberships.clone())
    }

    /// True if `other` may access an entity with this membership.
    pub fn grant_access_to_membership(&self, other: &Membership) -> bool {
        self.is_public() || !self.memberships_in_common(other).is_empty()
    }

    pub fn grant_access_to_membership_id(&self, membership_id: &str) -> bool {
        self.is_public() || self.memberships.contains(membership_id)
    }
}

impl fmt::Display for Membership {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ids: Vec<&str> = self.memberships.iter().map(String::as_str).collect();
        write!(f, "{}", ids.join(","))
    }
}
