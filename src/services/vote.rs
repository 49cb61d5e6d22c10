use std::sync::Arc;

use crate::error::{Error, Result};
use crate::model::{
    election::ElectionState,
    mongodb::Id,
    results::{order_tallies, CandidateTally, ElectionResults, RaceResults},
    vote::{CastVoteSpec, VoteCore},
    voter::Voter,
};
use crate::store::{ActorContext, BallotStore};

use super::{require_admin, require_member};

/// The vote casting service: eligibility checks in front of the store's
/// atomic insert, plus the result reads.
pub struct VoteService {
    store: Arc<dyn BallotStore>,
}

impl VoteService {
    pub fn new(store: Arc<dyn BallotStore>) -> Self {
        Self { store }
    }

    /// Register the actor as a voter in the organization, pending approval.
    pub async fn register(&self, ctx: &ActorContext, organization_id: Id) -> Result<Voter> {
        self.store
            .register_voter(ctx, organization_id, ctx.user_id)
            .await
    }

    /// Approve a pending voter registration (admins only).
    pub async fn approve(
        &self,
        ctx: &ActorContext,
        organization_id: Id,
        user_id: Id,
    ) -> Result<Voter> {
        require_admin(&*self.store, organization_id, ctx.user_id).await?;
        self.store
            .approve_voter(ctx, organization_id, user_id)
            .await
    }

    /// The actor's own voter record in the organization, if any.
    pub async fn status(&self, ctx: &ActorContext, organization_id: Id) -> Result<Option<Voter>> {
        self.store.voter_status(organization_id, ctx.user_id).await
    }

    /// Registrations awaiting approval (admins only).
    pub async fn pending(&self, ctx: &ActorContext, organization_id: Id) -> Result<Vec<Voter>> {
        require_admin(&*self.store, organization_id, ctx.user_id).await?;
        self.store.pending_voters(organization_id).await
    }

    /// Cast one vote for the actor.
    ///
    /// Preconditions are checked in a fixed order so each failure mode keeps
    /// its own error kind. The capacity and duplicate pre-checks here are
    /// advisory — fast, friendly failures — while the store's transactional
    /// constraints remain the source of truth under concurrency.
    pub async fn cast_vote(&self, ctx: &ActorContext, spec: CastVoteSpec) -> Result<Id> {
        let election = self
            .store
            .election(spec.election_id)
            .await?
            .ok_or_else(|| Error::not_found(format!("Election {}", spec.election_id)))?;

        if election.state != ElectionState::Open {
            return Err(Error::InvalidState(
                "election not open for voting".to_string(),
            ));
        }

        let race = self
            .store
            .race(spec.race_id)
            .await?
            .filter(|race| race.election_id == spec.election_id)
            .ok_or_else(|| {
                Error::not_found(format!(
                    "Race {} in election {}",
                    spec.race_id, spec.election_id
                ))
            })?;

        self.store
            .candidate(spec.candidate_id)
            .await?
            .filter(|candidate| candidate.race_id == spec.race_id && candidate.approved)
            .ok_or_else(|| {
                Error::not_found(format!(
                    "Candidate {} in race {}",
                    spec.candidate_id, spec.race_id
                ))
            })?;

        let approved = self
            .store
            .voter_status(election.organization_id, ctx.user_id)
            .await?
            .map_or(false, |voter| voter.approved);
        if !approved {
            return Err(Error::Unauthorized("voter not approved".to_string()));
        }

        let cast = self
            .store
            .votes_by_voter_in_race(ctx.user_id, spec.race_id)
            .await?;
        if cast.len() as u64 >= race.max_votes_per_voter as u64 {
            return Err(Error::Conflict("maximum votes reached".to_string()));
        }
        if cast.iter().any(|vote| vote.candidate_id == spec.candidate_id) {
            return Err(Error::Conflict("duplicate vote".to_string()));
        }

        let vote = VoteCore::new(spec.race_id, spec.candidate_id, ctx.user_id, spec.channel);
        self.store
            .cast_vote(ctx, vote, race.max_votes_per_voter)
            .await
    }

    /// Results for one race, recomputed from the votes on every call.
    /// Every registered candidate appears, including those with zero votes.
    pub async fn race_results(
        &self,
        ctx: &ActorContext,
        election_id: Id,
        race_id: Id,
    ) -> Result<RaceResults> {
        let election = self
            .store
            .election(election_id)
            .await?
            .ok_or_else(|| Error::not_found(format!("Election {election_id}")))?;
        require_member(&*self.store, election.organization_id, ctx.user_id).await?;

        let race = self
            .store
            .race(race_id)
            .await?
            .filter(|race| race.election_id == election_id)
            .ok_or_else(|| {
                Error::not_found(format!("Race {race_id} in election {election_id}"))
            })?;

        let candidates = self.store.candidates_by_race(race_id).await?;
        let counts = self.store.vote_counts_by_race(race_id).await?;
        let mut results: Vec<CandidateTally> = candidates
            .into_iter()
            .map(|candidate| CandidateTally {
                candidate_id: candidate.id,
                display_name: candidate.display_name.clone(),
                ballot_order: candidate.ballot_order,
                vote_count: counts.get(&candidate.id).copied().unwrap_or(0),
            })
            .collect();
        order_tallies(&mut results);
        let total_votes = results.iter().map(|tally| tally.vote_count).sum();

        Ok(RaceResults {
            election_id,
            race_id,
            race_name: race.name.clone(),
            election_state: election.state,
            max_winners: race.max_winners,
            results,
            total_votes,
        })
    }

    /// Results for every race of an election.
    pub async fn election_results(
        &self,
        ctx: &ActorContext,
        election_id: Id,
    ) -> Result<ElectionResults> {
        let election = self
            .store
            .election(election_id)
            .await?
            .ok_or_else(|| Error::not_found(format!("Election {election_id}")))?;
        require_member(&*self.store, election.organization_id, ctx.user_id).await?;

        let mut races = Vec::new();
        for race in self.store.races_by_election(election_id).await? {
            races.push(self.race_results(ctx, election_id, race.id).await?);
        }

        Ok(ElectionResults {
            election_id,
            election_name: election.name.clone(),
            election_state: election.state,
            races,
        })
    }
}
