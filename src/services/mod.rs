//! The core engines: election lifecycle and vote casting. Both sit in front
//! of the Ballot Store, performing role checks and state-machine validation
//! before delegating; the store independently re-checks whatever it can
//! enforce atomically.

mod election;
mod vote;

pub use election::{ElectionDetail, ElectionEngine, RaceDetail};
pub use vote::VoteService;

use crate::error::{Error, Result};
use crate::model::{mongodb::Id, org::OrgRole};
use crate::store::BallotStore;

/// The actor's active role in the organization, or `Unauthorized`.
pub(crate) async fn require_member(
    store: &dyn BallotStore,
    organization_id: Id,
    user_id: Id,
) -> Result<OrgRole> {
    store
        .member_role(organization_id, user_id)
        .await?
        .ok_or_else(|| Error::Unauthorized("not a member of this organization".to_string()))
}

/// Like [`require_member`], but the role must carry election-admin rights.
pub(crate) async fn require_admin(
    store: &dyn BallotStore,
    organization_id: Id,
    user_id: Id,
) -> Result<OrgRole> {
    let role = require_member(store, organization_id, user_id).await?;
    if !role.is_election_admin() {
        return Err(Error::Unauthorized(
            "requires OWNER or ADMIN role".to_string(),
        ));
    }
    Ok(role)
}
