use std::sync::Arc;

use serde::Serialize;

use crate::error::{Error, Result};
use crate::model::{
    candidate::{Candidate, CandidateCore, CandidateSpec},
    election::{Election, ElectionCore, ElectionSpec, ElectionState, ElectionUpdate, ScheduleSpec},
    mongodb::Id,
    race::{Race, RaceCore, RaceSpec, RaceUpdate},
};
use crate::store::{ActorContext, BallotStore};

use super::{require_admin, require_member};

/// The election lifecycle engine.
///
/// Owns the state machine: every operation checks the actor's role, the
/// static validity of its arguments, and the legality of the requested
/// transition before delegating to the store, which re-checks the state
/// atomically as the second line of defense.
pub struct ElectionEngine {
    store: Arc<dyn BallotStore>,
}

/// An election with its full ballot, as returned by the detail read.
#[derive(Debug, Serialize)]
pub struct ElectionDetail {
    #[serde(flatten)]
    pub election: Election,
    pub races: Vec<RaceDetail>,
}

/// A race with its candidates.
#[derive(Debug, Serialize)]
pub struct RaceDetail {
    #[serde(flatten)]
    pub race: Race,
    pub candidates: Vec<Candidate>,
}

impl ElectionEngine {
    pub fn new(store: Arc<dyn BallotStore>) -> Self {
        Self { store }
    }

    /// Create a new election in `Draft`.
    pub async fn create(&self, ctx: &ActorContext, spec: ElectionSpec) -> Result<Election> {
        require_admin(&*self.store, spec.organization_id, ctx.user_id).await?;
        if spec.name.trim().is_empty() {
            return Err(Error::InvalidArgument(
                "election name must not be empty".to_string(),
            ));
        }
        let election =
            ElectionCore::new(spec.organization_id, spec.name, spec.description, ctx.user_id);
        self.store.create_election(ctx, election).await
    }

    /// Edit a draft election's fields.
    pub async fn update(
        &self,
        ctx: &ActorContext,
        id: Id,
        update: ElectionUpdate,
    ) -> Result<Election> {
        let election = self.admin_election(ctx, id).await?;
        if update.name.trim().is_empty() {
            return Err(Error::InvalidArgument(
                "election name must not be empty".to_string(),
            ));
        }
        if let (Some(start), Some(end)) = (update.start_at, update.end_at) {
            if end <= start {
                return Err(Error::InvalidArgument(
                    "end time must be after start time".to_string(),
                ));
            }
        }
        if !election.state.is_editable() {
            return Err(Error::InvalidState(format!(
                "cannot edit election {id} in state {}",
                election.state
            )));
        }
        self.store.update_election(ctx, id, update).await
    }

    /// Set start/end times and move `Draft` -> `Scheduled`.
    pub async fn schedule(
        &self,
        ctx: &ActorContext,
        id: Id,
        spec: ScheduleSpec,
    ) -> Result<Election> {
        let election = self.admin_election(ctx, id).await?;
        if spec.end_at <= spec.start_at {
            return Err(Error::InvalidArgument(
                "end time must be after start time".to_string(),
            ));
        }
        if !election.state.may_transition_to(ElectionState::Scheduled) {
            return Err(Error::InvalidState(format!(
                "cannot schedule election {id} in state {}",
                election.state
            )));
        }
        self.store
            .schedule_election(ctx, id, spec.start_at, spec.end_at)
            .await
    }

    /// Open the election for voting, regardless of any scheduled times.
    pub async fn open(&self, ctx: &ActorContext, id: Id) -> Result<Election> {
        let election = self.admin_election(ctx, id).await?;
        if !election.state.may_transition_to(ElectionState::Open) {
            return Err(Error::InvalidState(format!(
                "cannot open election {id} in state {}",
                election.state
            )));
        }
        self.store.open_election(ctx, id).await
    }

    /// Close an open election.
    pub async fn close(&self, ctx: &ActorContext, id: Id) -> Result<Election> {
        let election = self.admin_election(ctx, id).await?;
        if !election.state.may_transition_to(ElectionState::Closed) {
            return Err(Error::InvalidState(format!(
                "cannot close election {id} in state {}",
                election.state
            )));
        }
        self.store.close_election(ctx, id).await
    }

    /// Permanently delete an election and its ballot.
    ///
    /// Never allowed while `Open`, and refused outright once any vote has
    /// been recorded: votes are immutable facts and deleting their election
    /// would orphan them.
    pub async fn delete(&self, ctx: &ActorContext, id: Id) -> Result<()> {
        let election = self.admin_election(ctx, id).await?;
        if election.state == ElectionState::Open {
            return Err(Error::InvalidState(format!(
                "cannot delete election {id} while it is open; close it first"
            )));
        }
        let votes = self.store.votes_in_election(id).await?;
        if votes > 0 {
            return Err(Error::Conflict(format!(
                "election {id} has {votes} recorded votes and cannot be deleted"
            )));
        }
        self.store.delete_election(ctx, id).await
    }

    /// All elections of an organization, visible to any member.
    pub async fn list(&self, ctx: &ActorContext, organization_id: Id) -> Result<Vec<Election>> {
        require_member(&*self.store, organization_id, ctx.user_id).await?;
        self.store.elections_by_org(organization_id).await
    }

    /// One election with its races and candidates, visible to any member.
    pub async fn detail(&self, ctx: &ActorContext, id: Id) -> Result<ElectionDetail> {
        let election = self.member_election(ctx, id).await?;
        let mut races = Vec::new();
        for race in self.store.races_by_election(id).await? {
            let candidates = self.store.candidates_by_race(race.id).await?;
            races.push(RaceDetail { race, candidates });
        }
        Ok(ElectionDetail { election, races })
    }

    /// Create a race on a draft or scheduled election.
    pub async fn create_race(&self, ctx: &ActorContext, spec: RaceSpec) -> Result<Race> {
        let election = self.admin_election(ctx, spec.election_id).await?;
        validate_race_fields(&spec.name, spec.max_votes_per_voter)?;
        self.require_ballot_mutable(&election)?;
        let race = RaceCore {
            election_id: spec.election_id,
            name: spec.name,
            description: spec.description,
            max_votes_per_voter: spec.max_votes_per_voter,
            max_winners: spec.max_winners,
        };
        self.store.create_race(ctx, race).await
    }

    /// Update a race on a draft or scheduled election.
    pub async fn update_race(
        &self,
        ctx: &ActorContext,
        race_id: Id,
        update: RaceUpdate,
    ) -> Result<Race> {
        let (_, election) = self.admin_race(ctx, race_id).await?;
        validate_race_fields(&update.name, update.max_votes_per_voter)?;
        self.require_ballot_mutable(&election)?;
        self.store.update_race(ctx, race_id, update).await
    }

    /// Delete a race on a draft or scheduled election.
    pub async fn delete_race(&self, ctx: &ActorContext, race_id: Id) -> Result<()> {
        let (_, election) = self.admin_race(ctx, race_id).await?;
        self.require_ballot_mutable(&election)?;
        self.store.delete_race(ctx, race_id).await
    }

    /// A race with its candidates, visible to any member.
    pub async fn race_detail(&self, ctx: &ActorContext, race_id: Id) -> Result<RaceDetail> {
        let race = self
            .store
            .race(race_id)
            .await?
            .ok_or_else(|| Error::not_found(format!("Race {race_id}")))?;
        self.member_election(ctx, race.election_id).await?;
        let candidates = self.store.candidates_by_race(race_id).await?;
        Ok(RaceDetail { race, candidates })
    }

    /// All races of an election with their candidates, visible to any member.
    pub async fn races_for_election(
        &self,
        ctx: &ActorContext,
        election_id: Id,
    ) -> Result<Vec<RaceDetail>> {
        self.member_election(ctx, election_id).await?;
        let mut details = Vec::new();
        for race in self.store.races_by_election(election_id).await? {
            let candidates = self.store.candidates_by_race(race.id).await?;
            details.push(RaceDetail { race, candidates });
        }
        Ok(details)
    }

    /// Add a candidate to a race's ballot.
    pub async fn add_candidate(
        &self,
        ctx: &ActorContext,
        race_id: Id,
        spec: CandidateSpec,
    ) -> Result<Candidate> {
        let (_, election) = self.admin_race(ctx, race_id).await?;
        if spec.display_name.trim().is_empty() {
            return Err(Error::InvalidArgument(
                "candidate display name must not be empty".to_string(),
            ));
        }
        self.require_ballot_mutable(&election)?;
        let candidate = CandidateCore {
            race_id,
            display_name: spec.display_name,
            affiliation: spec.affiliation,
            bio: spec.bio,
            ballot_order: spec.ballot_order,
            approved: true,
        };
        self.store.add_candidate(ctx, candidate).await
    }

    /// Update a candidate's ballot entry.
    pub async fn update_candidate(
        &self,
        ctx: &ActorContext,
        candidate_id: Id,
        spec: CandidateSpec,
    ) -> Result<Candidate> {
        let election = self.admin_candidate_election(ctx, candidate_id).await?;
        if spec.display_name.trim().is_empty() {
            return Err(Error::InvalidArgument(
                "candidate display name must not be empty".to_string(),
            ));
        }
        self.require_ballot_mutable(&election)?;
        self.store.update_candidate(ctx, candidate_id, spec).await
    }

    /// Clear a candidate to appear on the ballot, or pull that clearance.
    pub async fn set_candidate_approval(
        &self,
        ctx: &ActorContext,
        candidate_id: Id,
        approved: bool,
    ) -> Result<Candidate> {
        let election = self.admin_candidate_election(ctx, candidate_id).await?;
        self.require_ballot_mutable(&election)?;
        self.store
            .set_candidate_approval(ctx, candidate_id, approved)
            .await
    }

    /// Remove a candidate from a race's ballot.
    pub async fn remove_candidate(&self, ctx: &ActorContext, candidate_id: Id) -> Result<()> {
        let election = self.admin_candidate_election(ctx, candidate_id).await?;
        self.require_ballot_mutable(&election)?;
        self.store.remove_candidate(ctx, candidate_id).await
    }

    /// The election, with the actor verified as an election admin of its
    /// organization.
    async fn admin_election(&self, ctx: &ActorContext, id: Id) -> Result<Election> {
        let election = self
            .store
            .election(id)
            .await?
            .ok_or_else(|| Error::not_found(format!("Election {id}")))?;
        require_admin(&*self.store, election.organization_id, ctx.user_id).await?;
        Ok(election)
    }

    /// The election, with the actor verified as a member of its organization.
    async fn member_election(&self, ctx: &ActorContext, id: Id) -> Result<Election> {
        let election = self
            .store
            .election(id)
            .await?
            .ok_or_else(|| Error::not_found(format!("Election {id}")))?;
        require_member(&*self.store, election.organization_id, ctx.user_id).await?;
        Ok(election)
    }

    async fn admin_race(&self, ctx: &ActorContext, race_id: Id) -> Result<(Race, Election)> {
        let race = self
            .store
            .race(race_id)
            .await?
            .ok_or_else(|| Error::not_found(format!("Race {race_id}")))?;
        let election = self.admin_election(ctx, race.election_id).await?;
        Ok((race, election))
    }

    async fn admin_candidate_election(
        &self,
        ctx: &ActorContext,
        candidate_id: Id,
    ) -> Result<Election> {
        let candidate = self
            .store
            .candidate(candidate_id)
            .await?
            .ok_or_else(|| Error::not_found(format!("Candidate {candidate_id}")))?;
        let (_, election) = self.admin_race(ctx, candidate.race_id).await?;
        Ok(election)
    }

    fn require_ballot_mutable(&self, election: &Election) -> Result<()> {
        if !election.state.allows_race_changes() {
            return Err(Error::InvalidState(format!(
                "election {} is {}; ballot changes are frozen",
                election.id, election.state
            )));
        }
        Ok(())
    }
}

fn validate_race_fields(name: &str, max_votes_per_voter: u32) -> Result<()> {
    if name.trim().is_empty() {
        return Err(Error::InvalidArgument(
            "race name must not be empty".to_string(),
        ));
    }
    if max_votes_per_voter == 0 {
        return Err(Error::InvalidArgument(
            "max_votes_per_voter must be at least 1".to_string(),
        ));
    }
    Ok(())
}
