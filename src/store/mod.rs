//! The Ballot Store boundary: every piece of durable state lives behind the
//! [`BallotStore`] trait. The store owns the authoritative constraint checks
//! (uniqueness, status guards, capacity counting inside a transaction); the
//! services in front of it only pre-check for friendlier error messages.

use std::collections::HashMap;
use std::fmt::{self, Display, Formatter};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::model::{
    candidate::{Candidate, CandidateSpec, NewCandidate},
    election::{Election, ElectionUpdate, NewElection},
    mongodb::Id,
    org::OrgRole,
    race::{NewRace, Race, RaceUpdate},
    vote::{NewVote, Vote},
    voter::Voter,
};

pub mod mongo;

#[cfg(test)]
pub mod memory;

/// Who is performing a mutation, and under which request.
///
/// Propagated into every mutating store call so the audit trail can be
/// written inside the same transaction as the change itself. Each call
/// carries its own context; nothing is shared across concurrent requests.
#[derive(Debug, Clone)]
pub struct ActorContext {
    pub user_id: Id,
    pub request_id: String,
}

/// An automatic transition applied by `process_due_elections`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionTransition {
    pub election_id: Id,
    pub name: String,
    pub action: TransitionAction,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransitionAction {
    Opened,
    Closed,
}

impl Display for TransitionAction {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Opened => write!(f, "opened"),
            Self::Closed => write!(f, "closed"),
        }
    }
}

/// Atomic, constrained operations over elections, races, candidates, voters
/// and votes.
///
/// Mutating operations run inside one transaction each: on any error the
/// store is left exactly as it was. Status-guarded operations re-check the
/// election state atomically, so callers' pre-checks can race without ever
/// producing an illegal transition.
#[rocket::async_trait]
pub trait BallotStore: Send + Sync {
    /// The active role the user holds in the organization, if any.
    async fn member_role(&self, organization_id: Id, user_id: Id) -> Result<Option<OrgRole>>;

    async fn election(&self, id: Id) -> Result<Option<Election>>;
    async fn elections_by_org(&self, organization_id: Id) -> Result<Vec<Election>>;
    async fn create_election(&self, ctx: &ActorContext, election: NewElection) -> Result<Election>;
    /// Apply field edits; fails `InvalidState` unless the election is `Draft`.
    async fn update_election(
        &self,
        ctx: &ActorContext,
        id: Id,
        update: ElectionUpdate,
    ) -> Result<Election>;
    /// Set timestamps and move `Draft` -> `Scheduled`.
    async fn schedule_election(
        &self,
        ctx: &ActorContext,
        id: Id,
        start_at: DateTime<Utc>,
        end_at: DateTime<Utc>,
    ) -> Result<Election>;
    /// Move `Draft`/`Scheduled` -> `Open`, recording the actual open time.
    async fn open_election(&self, ctx: &ActorContext, id: Id) -> Result<Election>;
    /// Move `Open` -> `Closed`, recording the actual close time.
    async fn close_election(&self, ctx: &ActorContext, id: Id) -> Result<Election>;
    /// Remove the election and cascade to its races and candidates.
    /// Fails `InvalidState` if the election is `Open`.
    async fn delete_election(&self, ctx: &ActorContext, id: Id) -> Result<()>;
    /// Open every `Scheduled` election whose start time has passed and close
    /// every `Open` election whose end time has passed. Each flip is an
    /// atomic status-guarded update, so running this twice in a row without
    /// newly-due elections returns an empty list the second time.
    async fn process_due_elections(&self) -> Result<Vec<ElectionTransition>>;

    async fn race(&self, id: Id) -> Result<Option<Race>>;
    async fn races_by_election(&self, election_id: Id) -> Result<Vec<Race>>;
    async fn create_race(&self, ctx: &ActorContext, race: NewRace) -> Result<Race>;
    async fn update_race(&self, ctx: &ActorContext, id: Id, update: RaceUpdate) -> Result<Race>;
    /// Remove the race and cascade to its candidates.
    async fn delete_race(&self, ctx: &ActorContext, id: Id) -> Result<()>;

    async fn candidate(&self, id: Id) -> Result<Option<Candidate>>;
    async fn candidates_by_race(&self, race_id: Id) -> Result<Vec<Candidate>>;
    async fn add_candidate(
        &self,
        ctx: &ActorContext,
        candidate: NewCandidate,
    ) -> Result<Candidate>;
    async fn update_candidate(
        &self,
        ctx: &ActorContext,
        id: Id,
        spec: CandidateSpec,
    ) -> Result<Candidate>;
    /// Set whether the candidate is cleared to appear and receive votes.
    async fn set_candidate_approval(
        &self,
        ctx: &ActorContext,
        id: Id,
        approved: bool,
    ) -> Result<Candidate>;
    async fn remove_candidate(&self, ctx: &ActorContext, id: Id) -> Result<()>;

    async fn voter_status(&self, organization_id: Id, user_id: Id) -> Result<Option<Voter>>;
    /// Create a not-yet-approved voter record; fails `Conflict` if one
    /// already exists for this (organization, user).
    async fn register_voter(
        &self,
        ctx: &ActorContext,
        organization_id: Id,
        user_id: Id,
    ) -> Result<Voter>;
    /// Approve a pending registration; fails `NotFound` if none exists.
    async fn approve_voter(
        &self,
        ctx: &ActorContext,
        organization_id: Id,
        user_id: Id,
    ) -> Result<Voter>;
    async fn pending_voters(&self, organization_id: Id) -> Result<Vec<Voter>>;

    /// Insert one vote, enforcing the per-(voter, race) capacity and the
    /// no-duplicate-candidate invariant atomically. This is the source of
    /// truth for both: concurrent casts cannot jointly overshoot
    /// `max_votes_per_voter` or double-record a candidate.
    async fn cast_vote(
        &self,
        ctx: &ActorContext,
        vote: NewVote,
        max_votes_per_voter: u32,
    ) -> Result<Id>;
    async fn votes_by_voter_in_race(&self, voter_user_id: Id, race_id: Id) -> Result<Vec<Vote>>;
    /// Vote counts per candidate for one race; candidates nobody has voted
    /// for are absent from the map.
    async fn vote_counts_by_race(&self, race_id: Id) -> Result<HashMap<Id, u64>>;
    /// Total votes recorded across all races of the election.
    async fn votes_in_election(&self, election_id: Id) -> Result<u64>;
}
