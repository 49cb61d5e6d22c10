//! In-memory implementation of the Ballot Store, used by the test suite.
//!
//! Mirrors the constraint semantics of the MongoDB implementation —
//! status-guarded transitions, uniqueness checks, capacity enforcement,
//! audit recording — over mutex-protected maps. A single lock around all
//! state makes every operation atomic, which is exactly the transactional
//! behavior the services are entitled to assume.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use rocket::tokio::sync::Mutex;

use crate::error::{Error, Result};
use crate::model::{
    candidate::{Candidate, CandidateSpec, NewCandidate},
    election::{Election, ElectionState, ElectionUpdate, NewElection},
    mongodb::Id,
    org::{OrgMembership, OrgRole},
    race::{NewRace, Race, RaceUpdate},
    vote::{NewVote, Vote},
    voter::{Voter, VoterCore},
};

use super::{ActorContext, BallotStore, ElectionTransition, TransitionAction};

#[derive(Default)]
struct Inner {
    memberships: Vec<OrgMembership>,
    elections: HashMap<Id, Election>,
    races: HashMap<Id, Race>,
    candidates: HashMap<Id, Candidate>,
    voters: HashMap<Id, Voter>,
    votes: HashMap<Id, Vote>,
    /// (request_id, action) pairs, in order of application.
    audit: Vec<(String, String)>,
}

#[derive(Default)]
pub struct MemoryBallotStore {
    inner: Mutex<Inner>,
    fail_next_pass: AtomicBool,
}

impl MemoryBallotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an active membership; tests use this in place of the (out of
    /// scope) organization CRUD.
    pub async fn add_membership(&self, organization_id: Id, user_id: Id, role: OrgRole) {
        self.inner.lock().await.memberships.push(OrgMembership {
            organization_id,
            user_id,
            role,
            is_active: true,
        });
    }

    /// The audit trail so far, oldest first.
    pub async fn audit_log(&self) -> Vec<(String, String)> {
        self.inner.lock().await.audit.clone()
    }

    /// Make the next `process_due_elections` call fail with a store error,
    /// simulating an unavailable database.
    pub fn fail_next_process(&self) {
        self.fail_next_pass.store(true, Ordering::SeqCst);
    }
}

impl Inner {
    fn record(&mut self, ctx: &ActorContext, action: &str) {
        self.audit
            .push((ctx.request_id.clone(), action.to_string()));
    }

    fn election_mut(&mut self, id: Id) -> Result<&mut Election> {
        self.elections
            .get_mut(&id)
            .ok_or_else(|| Error::not_found(format!("Election {id}")))
    }

    /// The race and its owning election's state, or `NotFound`.
    fn race_election_state(&self, race_id: Id) -> Result<ElectionState> {
        let race = self
            .races
            .get(&race_id)
            .ok_or_else(|| Error::not_found(format!("Race {race_id}")))?;
        let election = self
            .elections
            .get(&race.election_id)
            .ok_or_else(|| Error::not_found(format!("Election {}", race.election_id)))?;
        Ok(election.state)
    }

    fn require_race_mutable(&self, race_id: Id) -> Result<()> {
        let state = self.race_election_state(race_id)?;
        if !state.allows_race_changes() {
            return Err(Error::InvalidState(format!(
                "election is {state}; ballot changes are frozen"
            )));
        }
        Ok(())
    }
}

#[rocket::async_trait]
impl BallotStore for MemoryBallotStore {
    async fn member_role(&self, organization_id: Id, user_id: Id) -> Result<Option<OrgRole>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .memberships
            .iter()
            .find(|m| m.organization_id == organization_id && m.user_id == user_id && m.is_active)
            .map(|m| m.role))
    }

    async fn election(&self, id: Id) -> Result<Option<Election>> {
        Ok(self.inner.lock().await.elections.get(&id).cloned())
    }

    async fn elections_by_org(&self, organization_id: Id) -> Result<Vec<Election>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .elections
            .values()
            .filter(|e| e.organization_id == organization_id)
            .cloned()
            .collect())
    }

    async fn create_election(&self, ctx: &ActorContext, election: NewElection) -> Result<Election> {
        let mut inner = self.inner.lock().await;
        let election = Election {
            id: Id::new(),
            election,
        };
        inner.elections.insert(election.id, election.clone());
        inner.record(ctx, "create_election");
        Ok(election)
    }

    async fn update_election(
        &self,
        ctx: &ActorContext,
        id: Id,
        update: ElectionUpdate,
    ) -> Result<Election> {
        let mut inner = self.inner.lock().await;
        let election = inner.election_mut(id)?;
        if !election.state.is_editable() {
            return Err(Error::InvalidState(format!(
                "cannot edit election {id} in state {}",
                election.state
            )));
        }
        election.name = update.name;
        election.description = update.description;
        election.start_at = update.start_at;
        election.end_at = update.end_at;
        let updated = election.clone();
        inner.record(ctx, "update_election");
        Ok(updated)
    }

    async fn schedule_election(
        &self,
        ctx: &ActorContext,
        id: Id,
        start_at: DateTime<Utc>,
        end_at: DateTime<Utc>,
    ) -> Result<Election> {
        let mut inner = self.inner.lock().await;
        let election = inner.election_mut(id)?;
        if election.state != ElectionState::Draft {
            return Err(Error::InvalidState(format!(
                "cannot schedule election {id} in state {}",
                election.state
            )));
        }
        election.state = ElectionState::Scheduled;
        election.start_at = Some(start_at);
        election.end_at = Some(end_at);
        let updated = election.clone();
        inner.record(ctx, "schedule_election");
        Ok(updated)
    }

    async fn open_election(&self, ctx: &ActorContext, id: Id) -> Result<Election> {
        let mut inner = self.inner.lock().await;
        let election = inner.election_mut(id)?;
        if !election.state.may_transition_to(ElectionState::Open) {
            return Err(Error::InvalidState(format!(
                "cannot open election {id} in state {}",
                election.state
            )));
        }
        election.state = ElectionState::Open;
        election.opened_at = Some(Utc::now());
        let updated = election.clone();
        inner.record(ctx, "open_election");
        Ok(updated)
    }

    async fn close_election(&self, ctx: &ActorContext, id: Id) -> Result<Election> {
        let mut inner = self.inner.lock().await;
        let election = inner.election_mut(id)?;
        if election.state != ElectionState::Open {
            return Err(Error::InvalidState(format!(
                "cannot close election {id} in state {}",
                election.state
            )));
        }
        election.state = ElectionState::Closed;
        election.closed_at = Some(Utc::now());
        let updated = election.clone();
        inner.record(ctx, "close_election");
        Ok(updated)
    }

    async fn delete_election(&self, ctx: &ActorContext, id: Id) -> Result<()> {
        let mut inner = self.inner.lock().await;
        let election = inner.election_mut(id)?;
        if election.state == ElectionState::Open {
            return Err(Error::InvalidState(format!(
                "cannot delete election {id} in state {}",
                election.state
            )));
        }
        inner.elections.remove(&id);
        let race_ids: Vec<Id> = inner
            .races
            .values()
            .filter(|r| r.election_id == id)
            .map(|r| r.id)
            .collect();
        inner.races.retain(|_, r| r.election_id != id);
        inner
            .candidates
            .retain(|_, c| !race_ids.contains(&c.race_id));
        inner.record(ctx, "delete_election");
        Ok(())
    }

    async fn process_due_elections(&self) -> Result<Vec<ElectionTransition>> {
        if self.fail_next_pass.swap(false, Ordering::SeqCst) {
            return Err(Error::Db(mongodb::error::Error::custom(
                "injected store failure",
            )));
        }

        let now = Utc::now();
        let mut inner = self.inner.lock().await;
        let mut transitions = Vec::new();

        for election in inner.elections.values_mut() {
            if election.state == ElectionState::Scheduled
                && election.start_at.map_or(false, |start| start <= now)
            {
                election.state = ElectionState::Open;
                election.opened_at = Some(now);
                transitions.push(ElectionTransition {
                    election_id: election.id,
                    name: election.name.clone(),
                    action: TransitionAction::Opened,
                });
            }
        }
        for election in inner.elections.values_mut() {
            if election.state == ElectionState::Open
                && election.end_at.map_or(false, |end| end <= now)
            {
                election.state = ElectionState::Closed;
                election.closed_at = Some(now);
                transitions.push(ElectionTransition {
                    election_id: election.id,
                    name: election.name.clone(),
                    action: TransitionAction::Closed,
                });
            }
        }

        Ok(transitions)
    }

    async fn race(&self, id: Id) -> Result<Option<Race>> {
        Ok(self.inner.lock().await.races.get(&id).cloned())
    }

    async fn races_by_election(&self, election_id: Id) -> Result<Vec<Race>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .races
            .values()
            .filter(|r| r.election_id == election_id)
            .cloned()
            .collect())
    }

    async fn create_race(&self, ctx: &ActorContext, race: NewRace) -> Result<Race> {
        let mut inner = self.inner.lock().await;
        let election = inner
            .elections
            .get(&race.election_id)
            .ok_or_else(|| Error::not_found(format!("Election {}", race.election_id)))?;
        if !election.state.allows_race_changes() {
            return Err(Error::InvalidState(format!(
                "election is {}; ballot changes are frozen",
                election.state
            )));
        }
        if inner
            .races
            .values()
            .any(|r| r.election_id == race.election_id && r.name == race.name)
        {
            return Err(Error::Conflict(format!(
                "race '{}' already exists in this election",
                race.name
            )));
        }
        let race = Race {
            id: Id::new(),
            race,
        };
        inner.races.insert(race.id, race.clone());
        inner.record(ctx, "create_race");
        Ok(race)
    }

    async fn update_race(&self, ctx: &ActorContext, id: Id, update: RaceUpdate) -> Result<Race> {
        let mut inner = self.inner.lock().await;
        inner.require_race_mutable(id)?;
        let election_id = inner.races[&id].election_id;
        if inner
            .races
            .values()
            .any(|r| r.election_id == election_id && r.name == update.name && r.id != id)
        {
            return Err(Error::Conflict(format!(
                "race '{}' already exists in this election",
                update.name
            )));
        }
        let race = inner.races.get_mut(&id).unwrap();
        race.name = update.name;
        race.description = update.description;
        race.max_votes_per_voter = update.max_votes_per_voter;
        let updated = race.clone();
        inner.record(ctx, "update_race");
        Ok(updated)
    }

    async fn delete_race(&self, ctx: &ActorContext, id: Id) -> Result<()> {
        let mut inner = self.inner.lock().await;
        inner.require_race_mutable(id)?;
        inner.races.remove(&id);
        inner.candidates.retain(|_, c| c.race_id != id);
        inner.record(ctx, "delete_race");
        Ok(())
    }

    async fn candidate(&self, id: Id) -> Result<Option<Candidate>> {
        Ok(self.inner.lock().await.candidates.get(&id).cloned())
    }

    async fn candidates_by_race(&self, race_id: Id) -> Result<Vec<Candidate>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .candidates
            .values()
            .filter(|c| c.race_id == race_id)
            .cloned()
            .collect())
    }

    async fn add_candidate(
        &self,
        ctx: &ActorContext,
        candidate: NewCandidate,
    ) -> Result<Candidate> {
        let mut inner = self.inner.lock().await;
        inner.require_race_mutable(candidate.race_id)?;
        let candidate = Candidate {
            id: Id::new(),
            candidate,
        };
        inner.candidates.insert(candidate.id, candidate.clone());
        inner.record(ctx, "add_candidate");
        Ok(candidate)
    }

    async fn update_candidate(
        &self,
        ctx: &ActorContext,
        id: Id,
        spec: CandidateSpec,
    ) -> Result<Candidate> {
        let mut inner = self.inner.lock().await;
        let race_id = inner
            .candidates
            .get(&id)
            .ok_or_else(|| Error::not_found(format!("Candidate {id}")))?
            .race_id;
        inner.require_race_mutable(race_id)?;
        let candidate = inner.candidates.get_mut(&id).unwrap();
        candidate.display_name = spec.display_name;
        candidate.affiliation = spec.affiliation;
        candidate.bio = spec.bio;
        candidate.ballot_order = spec.ballot_order;
        let updated = candidate.clone();
        inner.record(ctx, "update_candidate");
        Ok(updated)
    }

    async fn set_candidate_approval(
        &self,
        ctx: &ActorContext,
        id: Id,
        approved: bool,
    ) -> Result<Candidate> {
        let mut inner = self.inner.lock().await;
        let race_id = inner
            .candidates
            .get(&id)
            .ok_or_else(|| Error::not_found(format!("Candidate {id}")))?
            .race_id;
        inner.require_race_mutable(race_id)?;
        let candidate = inner.candidates.get_mut(&id).unwrap();
        candidate.approved = approved;
        let updated = candidate.clone();
        inner.record(ctx, "set_candidate_approval");
        Ok(updated)
    }

    async fn remove_candidate(&self, ctx: &ActorContext, id: Id) -> Result<()> {
        let mut inner = self.inner.lock().await;
        let race_id = inner
            .candidates
            .get(&id)
            .ok_or_else(|| Error::not_found(format!("Candidate {id}")))?
            .race_id;
        inner.require_race_mutable(race_id)?;
        inner.candidates.remove(&id);
        inner.record(ctx, "remove_candidate");
        Ok(())
    }

    async fn voter_status(&self, organization_id: Id, user_id: Id) -> Result<Option<Voter>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .voters
            .values()
            .find(|v| v.organization_id == organization_id && v.user_id == user_id)
            .cloned())
    }

    async fn register_voter(
        &self,
        ctx: &ActorContext,
        organization_id: Id,
        user_id: Id,
    ) -> Result<Voter> {
        let mut inner = self.inner.lock().await;
        if inner
            .voters
            .values()
            .any(|v| v.organization_id == organization_id && v.user_id == user_id)
        {
            return Err(Error::Conflict(
                "already registered as a voter in this organization".to_string(),
            ));
        }
        let voter = Voter {
            id: Id::new(),
            voter: VoterCore::new(organization_id, user_id),
        };
        inner.voters.insert(voter.id, voter.clone());
        inner.record(ctx, "register_voter");
        Ok(voter)
    }

    async fn approve_voter(
        &self,
        ctx: &ActorContext,
        organization_id: Id,
        user_id: Id,
    ) -> Result<Voter> {
        let mut inner = self.inner.lock().await;
        let voter = inner
            .voters
            .values_mut()
            .find(|v| v.organization_id == organization_id && v.user_id == user_id)
            .ok_or_else(|| {
                Error::not_found(format!(
                    "voter registration for user {user_id} in organization {organization_id}"
                ))
            })?;
        voter.approved = true;
        voter.approved_by = Some(ctx.user_id);
        let updated = voter.clone();
        inner.record(ctx, "approve_voter");
        Ok(updated)
    }

    async fn pending_voters(&self, organization_id: Id) -> Result<Vec<Voter>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .voters
            .values()
            .filter(|v| v.organization_id == organization_id && !v.approved)
            .cloned()
            .collect())
    }

    async fn cast_vote(
        &self,
        ctx: &ActorContext,
        vote: NewVote,
        max_votes_per_voter: u32,
    ) -> Result<Id> {
        let mut inner = self.inner.lock().await;
        let cast: Vec<&Vote> = inner
            .votes
            .values()
            .filter(|v| v.voter_user_id == vote.voter_user_id && v.race_id == vote.race_id)
            .collect();
        if cast.len() as u64 >= max_votes_per_voter as u64 {
            return Err(Error::Conflict("maximum votes reached".to_string()));
        }
        if cast.iter().any(|v| v.candidate_id == vote.candidate_id) {
            return Err(Error::Conflict("duplicate vote".to_string()));
        }
        let vote = Vote {
            id: Id::new(),
            vote,
        };
        let id = vote.id;
        inner.votes.insert(id, vote);
        inner.record(ctx, "cast_vote");
        Ok(id)
    }

    async fn votes_by_voter_in_race(&self, voter_user_id: Id, race_id: Id) -> Result<Vec<Vote>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .votes
            .values()
            .filter(|v| v.voter_user_id == voter_user_id && v.race_id == race_id)
            .cloned()
            .collect())
    }

    async fn vote_counts_by_race(&self, race_id: Id) -> Result<HashMap<Id, u64>> {
        let inner = self.inner.lock().await;
        let mut counts = HashMap::new();
        for vote in inner.votes.values().filter(|v| v.race_id == race_id) {
            *counts.entry(vote.candidate_id).or_insert(0) += 1;
        }
        Ok(counts)
    }

    async fn votes_in_election(&self, election_id: Id) -> Result<u64> {
        let inner = self.inner.lock().await;
        let race_ids: Vec<Id> = inner
            .races
            .values()
            .filter(|r| r.election_id == election_id)
            .map(|r| r.id)
            .collect();
        Ok(inner
            .votes
            .values()
            .filter(|v| race_ids.contains(&v.race_id))
            .count() as u64)
    }
}
