use mongodb::bson::{to_bson, Bson};
use serde::{Deserialize, Serialize};

use crate::model::mongodb::Id;

/// A member's role within an organization.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrgRole {
    Owner,
    Admin,
    Member,
}

impl OrgRole {
    /// Owners and admins may manage elections, races, and voter approvals.
    pub fn is_election_admin(self) -> bool {
        matches!(self, OrgRole::Owner | OrgRole::Admin)
    }
}

impl From<OrgRole> for Bson {
    fn from(role: OrgRole) -> Self {
        to_bson(&role).expect("Serialisation is infallible")
    }
}

/// A user's membership of an organization.
///
/// Inactive memberships confer no rights at all; the store's role lookup
/// treats them as absent.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub struct OrgMembership {
    pub organization_id: Id,
    pub user_id: Id,
    pub role: OrgRole,
    pub is_active: bool,
}
