//! MongoDB implementation of the Ballot Store.
//!
//! Every mutating operation runs in its own client-session transaction and
//! writes an [`AuditEntry`] before committing, so the audit trail can never
//! disagree with the data. Lifecycle flips use status-guarded filters: the
//! update only matches if the election is still in the expected state, which
//! makes transitions atomic and idempotent under concurrent callers.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use mongodb::{
    bson::{self, doc, serde_helpers::chrono_datetime_as_bson_datetime, Bson},
    options::UpdateOptions,
    Client, ClientSession, Database,
};
use rocket::{
    fairing::{Fairing, Info, Kind},
    futures::TryStreamExt,
    Build, Rocket,
};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{
    candidate::{Candidate, CandidateSpec, NewCandidate},
    election::{Election, ElectionState, ElectionUpdate, NewElection},
    mongodb::{is_duplicate_key, Coll, MongoCollection},
    org::OrgRole,
    race::{NewRace, Race, RaceUpdate},
    vote::{NewVote, Vote},
    voter::{NewVoter, Voter, VoterCore},
};
use crate::model::{mongodb::Id, org::OrgMembership};
use crate::services::{ElectionEngine, VoteService};

use super::{ActorContext, BallotStore, ElectionTransition, TransitionAction};

/// One line of the audit trail, written in the same transaction as the
/// mutation it records.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub actor_user_id: Id,
    pub request_id: String,
    pub action: String,
    pub target: Id,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub at: DateTime<Utc>,
}

/// Per-(voter, race) vote tally, maintained transactionally alongside vote
/// inserts. Concurrent casts by the same voter in the same race contend on
/// this single document, which is what serializes the capacity check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoteCounter {
    pub voter_user_id: Id,
    pub race_id: Id,
    pub count: u32,
}

impl MongoCollection for VoteCounter {
    const NAME: &'static str = "vote_counts";
}

pub struct MongoBallotStore {
    client: Client,
    db: Database,
}

impl MongoBallotStore {
    pub fn new(client: Client, db: Database) -> Self {
        Self { client, db }
    }

    fn coll<T: MongoCollection>(&self) -> Coll<T> {
        Coll::from_db(&self.db)
    }

    /// Start a session with an open transaction. Dropping the session
    /// without committing aborts the transaction, so early `?` returns
    /// leave no partial writes behind.
    async fn transaction(&self) -> Result<ClientSession> {
        let mut session = self.client.start_session(None).await?;
        session.start_transaction(None).await?;
        Ok(session)
    }

    async fn audit(
        &self,
        session: &mut ClientSession,
        ctx: &ActorContext,
        action: &str,
        target: Id,
    ) -> Result<()> {
        let entry = AuditEntry {
            actor_user_id: ctx.user_id,
            request_id: ctx.request_id.clone(),
            action: action.to_string(),
            target,
            at: Utc::now(),
        };
        self.coll::<AuditEntry>()
            .insert_one_with_session(entry, None, session)
            .await?;
        Ok(())
    }

    async fn election_by_id(&self, id: Id) -> Result<Election> {
        self.coll::<Election>()
            .find_one(id.as_doc(), None)
            .await?
            .ok_or_else(|| Error::not_found(format!("Election {id}")))
    }

    async fn race_by_id(&self, id: Id) -> Result<Race> {
        self.coll::<Race>()
            .find_one(id.as_doc(), None)
            .await?
            .ok_or_else(|| Error::not_found(format!("Race {id}")))
    }

    /// Apply a status-guarded update to an election. If nothing matched,
    /// work out whether that's because the election doesn't exist or is in
    /// the wrong state, and fail accordingly.
    async fn guarded_election_update(
        &self,
        session: &mut ClientSession,
        id: Id,
        guard: bson::Document,
        update: bson::Document,
        denied: &str,
    ) -> Result<()> {
        let result = self
            .coll::<Election>()
            .update_one_with_session(guard, update, None, session)
            .await?;
        if result.matched_count != 1 {
            let election = self.election_by_id(id).await?;
            return Err(Error::InvalidState(format!(
                "cannot {denied} election {id} in state {}",
                election.state
            )));
        }
        Ok(())
    }

    /// Look up a race and its owning election, failing unless ballot
    /// changes are still allowed. Runs inside the caller's transaction so
    /// a concurrent open cannot slip between check and write.
    async fn race_for_ballot_change(
        &self,
        session: &mut ClientSession,
        race_id: Id,
    ) -> Result<Race> {
        let race = self
            .coll::<Race>()
            .find_one_with_session(race_id.as_doc(), None, session)
            .await?
            .ok_or_else(|| Error::not_found(format!("Race {race_id}")))?;
        let election = self
            .coll::<Election>()
            .find_one_with_session(race.election_id.as_doc(), None, session)
            .await?
            .ok_or_else(|| Error::not_found(format!("Election {}", race.election_id)))?;
        if !election.state.allows_race_changes() {
            return Err(Error::InvalidState(format!(
                "election {} is {}; ballot changes are frozen",
                election.id, election.state
            )));
        }
        Ok(race)
    }
}

#[rocket::async_trait]
impl BallotStore for MongoBallotStore {
    async fn member_role(&self, organization_id: Id, user_id: Id) -> Result<Option<OrgRole>> {
        let filter = doc! {
            "organization_id": organization_id,
            "user_id": user_id,
            "is_active": true,
        };
        let membership = self.coll::<OrgMembership>().find_one(filter, None).await?;
        Ok(membership.map(|m| m.role))
    }

    async fn election(&self, id: Id) -> Result<Option<Election>> {
        Ok(self.coll::<Election>().find_one(id.as_doc(), None).await?)
    }

    async fn elections_by_org(&self, organization_id: Id) -> Result<Vec<Election>> {
        let filter = doc! { "organization_id": organization_id };
        Ok(self
            .coll::<Election>()
            .find(filter, None)
            .await?
            .try_collect()
            .await?)
    }

    async fn create_election(&self, ctx: &ActorContext, election: NewElection) -> Result<Election> {
        let mut session = self.transaction().await?;
        let id: Id = self
            .coll::<NewElection>()
            .insert_one_with_session(&election, None, &mut session)
            .await?
            .inserted_id
            .as_object_id()
            .unwrap() // Valid because the ID comes directly from the DB.
            .into();
        self.audit(&mut session, ctx, "create_election", id).await?;
        session.commit_transaction().await?;
        Ok(Election { id, election })
    }

    async fn update_election(
        &self,
        ctx: &ActorContext,
        id: Id,
        update: ElectionUpdate,
    ) -> Result<Election> {
        let mut session = self.transaction().await?;
        let guard = doc! { "_id": id, "state": ElectionState::Draft };
        let set = doc! {
            "$set": {
                "name": &update.name,
                "description": update.description.clone().map(Bson::String).unwrap_or(Bson::Null),
                "start_at": optional_datetime(update.start_at),
                "end_at": optional_datetime(update.end_at),
            }
        };
        self.guarded_election_update(&mut session, id, guard, set, "edit")
            .await?;
        self.audit(&mut session, ctx, "update_election", id).await?;
        session.commit_transaction().await?;
        self.election_by_id(id).await
    }

    async fn schedule_election(
        &self,
        ctx: &ActorContext,
        id: Id,
        start_at: DateTime<Utc>,
        end_at: DateTime<Utc>,
    ) -> Result<Election> {
        let mut session = self.transaction().await?;
        let guard = doc! { "_id": id, "state": ElectionState::Draft };
        let set = doc! {
            "$set": {
                "state": ElectionState::Scheduled,
                "start_at": bson::DateTime::from_chrono(start_at),
                "end_at": bson::DateTime::from_chrono(end_at),
            }
        };
        self.guarded_election_update(&mut session, id, guard, set, "schedule")
            .await?;
        self.audit(&mut session, ctx, "schedule_election", id).await?;
        session.commit_transaction().await?;
        self.election_by_id(id).await
    }

    async fn open_election(&self, ctx: &ActorContext, id: Id) -> Result<Election> {
        let mut session = self.transaction().await?;
        let guard = doc! {
            "_id": id,
            "state": { "$in": [ElectionState::Draft, ElectionState::Scheduled] },
        };
        let set = doc! {
            "$set": {
                "state": ElectionState::Open,
                "opened_at": bson::DateTime::from_chrono(Utc::now()),
            }
        };
        self.guarded_election_update(&mut session, id, guard, set, "open")
            .await?;
        self.audit(&mut session, ctx, "open_election", id).await?;
        session.commit_transaction().await?;
        self.election_by_id(id).await
    }

    async fn close_election(&self, ctx: &ActorContext, id: Id) -> Result<Election> {
        let mut session = self.transaction().await?;
        let guard = doc! { "_id": id, "state": ElectionState::Open };
        let set = doc! {
            "$set": {
                "state": ElectionState::Closed,
                "closed_at": bson::DateTime::from_chrono(Utc::now()),
            }
        };
        self.guarded_election_update(&mut session, id, guard, set, "close")
            .await?;
        self.audit(&mut session, ctx, "close_election", id).await?;
        session.commit_transaction().await?;
        self.election_by_id(id).await
    }

    async fn delete_election(&self, ctx: &ActorContext, id: Id) -> Result<()> {
        // Collect the cascade scope up front; the status guard below is
        // what actually protects against deleting a live election.
        let race_ids: Vec<Bson> = self
            .races_by_election(id)
            .await?
            .into_iter()
            .map(|race| Bson::from(race.id))
            .collect();

        let mut session = self.transaction().await?;
        let guard = doc! { "_id": id, "state": { "$ne": ElectionState::Open } };
        let result = self
            .coll::<Election>()
            .delete_one_with_session(guard, None, &mut session)
            .await?;
        if result.deleted_count != 1 {
            let election = self.election_by_id(id).await?;
            return Err(Error::InvalidState(format!(
                "cannot delete election {id} in state {}",
                election.state
            )));
        }
        self.coll::<Race>()
            .delete_many_with_session(doc! { "election_id": id }, None, &mut session)
            .await?;
        self.coll::<Candidate>()
            .delete_many_with_session(doc! { "race_id": { "$in": race_ids } }, None, &mut session)
            .await?;
        self.audit(&mut session, ctx, "delete_election", id).await?;
        session.commit_transaction().await?;
        Ok(())
    }

    async fn process_due_elections(&self) -> Result<Vec<ElectionTransition>> {
        let now = bson::DateTime::from_chrono(Utc::now());
        let elections = self.coll::<Election>();
        let mut transitions = Vec::new();

        // Open every scheduled election whose start time has passed. The
        // per-election status guard means a crash mid-batch, or a second
        // scheduler pass, can never double-apply a transition.
        let due_open: Vec<Election> = elections
            .find(
                doc! { "state": ElectionState::Scheduled, "start_at": { "$lte": now } },
                None,
            )
            .await?
            .try_collect()
            .await?;
        for election in due_open {
            let guard = doc! { "_id": election.id, "state": ElectionState::Scheduled };
            let set = doc! {
                "$set": { "state": ElectionState::Open, "opened_at": now }
            };
            let result = elections.update_one(guard, set, None).await?;
            if result.modified_count == 1 {
                transitions.push(ElectionTransition {
                    election_id: election.id,
                    name: election.name.clone(),
                    action: TransitionAction::Opened,
                });
            }
        }

        // Close every open election whose end time has passed.
        let due_close: Vec<Election> = elections
            .find(
                doc! { "state": ElectionState::Open, "end_at": { "$lte": now } },
                None,
            )
            .await?
            .try_collect()
            .await?;
        for election in due_close {
            let guard = doc! { "_id": election.id, "state": ElectionState::Open };
            let set = doc! {
                "$set": { "state": ElectionState::Closed, "closed_at": now }
            };
            let result = elections.update_one(guard, set, None).await?;
            if result.modified_count == 1 {
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
        Ok(self.coll::<Race>().find_one(id.as_doc(), None).await?)
    }

    async fn races_by_election(&self, election_id: Id) -> Result<Vec<Race>> {
        let filter = doc! { "election_id": election_id };
        Ok(self
            .coll::<Race>()
            .find(filter, None)
            .await?
            .try_collect()
            .await?)
    }

    async fn create_race(&self, ctx: &ActorContext, race: NewRace) -> Result<Race> {
        let mut session = self.transaction().await?;
        let election = self
            .coll::<Election>()
            .find_one_with_session(race.election_id.as_doc(), None, &mut session)
            .await?
            .ok_or_else(|| Error::not_found(format!("Election {}", race.election_id)))?;
        if !election.state.allows_race_changes() {
            return Err(Error::InvalidState(format!(
                "election {} is {}; ballot changes are frozen",
                election.id, election.state
            )));
        }
        let id: Id = self
            .coll::<NewRace>()
            .insert_one_with_session(&race, None, &mut session)
            .await
            .map_err(|e| {
                if is_duplicate_key(&e) {
                    Error::Conflict(format!("race '{}' already exists in this election", race.name))
                } else {
                    e.into()
                }
            })?
            .inserted_id
            .as_object_id()
            .unwrap() // Valid because the ID comes directly from the DB.
            .into();
        self.audit(&mut session, ctx, "create_race", id).await?;
        session.commit_transaction().await?;
        Ok(Race { id, race })
    }

    async fn update_race(&self, ctx: &ActorContext, id: Id, update: RaceUpdate) -> Result<Race> {
        let mut session = self.transaction().await?;
        self.race_for_ballot_change(&mut session, id).await?;
        let set = doc! {
            "$set": {
                "name": &update.name,
                "description": update.description.clone().map(Bson::String).unwrap_or(Bson::Null),
                "max_votes_per_voter": update.max_votes_per_voter,
            }
        };
        self.coll::<Race>()
            .update_one_with_session(id.as_doc(), set, None, &mut session)
            .await
            .map_err(|e| {
                if is_duplicate_key(&e) {
                    Error::Conflict(format!(
                        "race '{}' already exists in this election",
                        update.name
                    ))
                } else {
                    e.into()
                }
            })?;
        self.audit(&mut session, ctx, "update_race", id).await?;
        session.commit_transaction().await?;
        self.race_by_id(id).await
    }

    async fn delete_race(&self, ctx: &ActorContext, id: Id) -> Result<()> {
        let mut session = self.transaction().await?;
        self.race_for_ballot_change(&mut session, id).await?;
        self.coll::<Race>()
            .delete_one_with_session(id.as_doc(), None, &mut session)
            .await?;
        self.coll::<Candidate>()
            .delete_many_with_session(doc! { "race_id": id }, None, &mut session)
            .await?;
        self.audit(&mut session, ctx, "delete_race", id).await?;
        session.commit_transaction().await?;
        Ok(())
    }

    async fn candidate(&self, id: Id) -> Result<Option<Candidate>> {
        Ok(self.coll::<Candidate>().find_one(id.as_doc(), None).await?)
    }

    async fn candidates_by_race(&self, race_id: Id) -> Result<Vec<Candidate>> {
        let filter = doc! { "race_id": race_id };
        Ok(self
            .coll::<Candidate>()
            .find(filter, None)
            .await?
            .try_collect()
            .await?)
    }

    async fn add_candidate(
        &self,
        ctx: &ActorContext,
        candidate: NewCandidate,
    ) -> Result<Candidate> {
        let mut session = self.transaction().await?;
        self.race_for_ballot_change(&mut session, candidate.race_id)
            .await?;
        let id: Id = self
            .coll::<NewCandidate>()
            .insert_one_with_session(&candidate, None, &mut session)
            .await?
            .inserted_id
            .as_object_id()
            .unwrap() // Valid because the ID comes directly from the DB.
            .into();
        self.audit(&mut session, ctx, "add_candidate", id).await?;
        session.commit_transaction().await?;
        Ok(Candidate { id, candidate })
    }

    async fn update_candidate(
        &self,
        ctx: &ActorContext,
        id: Id,
        spec: CandidateSpec,
    ) -> Result<Candidate> {
        let mut session = self.transaction().await?;
        let existing = self
            .coll::<Candidate>()
            .find_one_with_session(id.as_doc(), None, &mut session)
            .await?
            .ok_or_else(|| Error::not_found(format!("Candidate {id}")))?;
        self.race_for_ballot_change(&mut session, existing.race_id)
            .await?;
        let set = doc! {
            "$set": {
                "display_name": &spec.display_name,
                "affiliation": spec.affiliation.clone().map(Bson::String).unwrap_or(Bson::Null),
                "bio": spec.bio.clone().map(Bson::String).unwrap_or(Bson::Null),
                "ballot_order": spec.ballot_order.map(|n| Bson::Int64(n as i64)).unwrap_or(Bson::Null),
            }
        };
        self.coll::<Candidate>()
            .update_one_with_session(id.as_doc(), set, None, &mut session)
            .await?;
        self.audit(&mut session, ctx, "update_candidate", id).await?;
        session.commit_transaction().await?;
        self.coll::<Candidate>()
            .find_one(id.as_doc(), None)
            .await?
            .ok_or_else(|| Error::not_found(format!("Candidate {id}")))
    }

    async fn set_candidate_approval(
        &self,
        ctx: &ActorContext,
        id: Id,
        approved: bool,
    ) -> Result<Candidate> {
        let mut session = self.transaction().await?;
        let existing = self
            .coll::<Candidate>()
            .find_one_with_session(id.as_doc(), None, &mut session)
            .await?
            .ok_or_else(|| Error::not_found(format!("Candidate {id}")))?;
        self.race_for_ballot_change(&mut session, existing.race_id)
            .await?;
        self.coll::<Candidate>()
            .update_one_with_session(
                id.as_doc(),
                doc! { "$set": { "approved": approved } },
                None,
                &mut session,
            )
            .await?;
        self.audit(&mut session, ctx, "set_candidate_approval", id)
            .await?;
        session.commit_transaction().await?;
        self.coll::<Candidate>()
            .find_one(id.as_doc(), None)
            .await?
            .ok_or_else(|| Error::not_found(format!("Candidate {id}")))
    }

    async fn remove_candidate(&self, ctx: &ActorContext, id: Id) -> Result<()> {
        let mut session = self.transaction().await?;
        let existing = self
            .coll::<Candidate>()
            .find_one_with_session(id.as_doc(), None, &mut session)
            .await?
            .ok_or_else(|| Error::not_found(format!("Candidate {id}")))?;
        self.race_for_ballot_change(&mut session, existing.race_id)
            .await?;
        self.coll::<Candidate>()
            .delete_one_with_session(id.as_doc(), None, &mut session)
            .await?;
        self.audit(&mut session, ctx, "remove_candidate", id).await?;
        session.commit_transaction().await?;
        Ok(())
    }

    async fn voter_status(&self, organization_id: Id, user_id: Id) -> Result<Option<Voter>> {
        let filter = doc! { "organization_id": organization_id, "user_id": user_id };
        Ok(self.coll::<Voter>().find_one(filter, None).await?)
    }

    async fn register_voter(
        &self,
        ctx: &ActorContext,
        organization_id: Id,
        user_id: Id,
    ) -> Result<Voter> {
        let voter = VoterCore::new(organization_id, user_id);
        let mut session = self.transaction().await?;
        let id: Id = self
            .coll::<NewVoter>()
            .insert_one_with_session(&voter, None, &mut session)
            .await
            .map_err(|e| {
                if is_duplicate_key(&e) {
                    Error::Conflict(
                        "already registered as a voter in this organization".to_string(),
                    )
                } else {
                    e.into()
                }
            })?
            .inserted_id
            .as_object_id()
            .unwrap() // Valid because the ID comes directly from the DB.
            .into();
        self.audit(&mut session, ctx, "register_voter", id).await?;
        session.commit_transaction().await?;
        Ok(Voter { id, voter })
    }

    async fn approve_voter(
        &self,
        ctx: &ActorContext,
        organization_id: Id,
        user_id: Id,
    ) -> Result<Voter> {
        let filter = doc! { "organization_id": organization_id, "user_id": user_id };
        let set = doc! {
            "$set": { "approved": true, "approved_by": ctx.user_id }
        };
        let mut session = self.transaction().await?;
        let result = self
            .coll::<Voter>()
            .update_one_with_session(filter.clone(), set, None, &mut session)
            .await?;
        if result.matched_count != 1 {
            return Err(Error::not_found(format!(
                "voter registration for user {user_id} in organization {organization_id}"
            )));
        }
        self.audit(&mut session, ctx, "approve_voter", user_id).await?;
        session.commit_transaction().await?;
        self.coll::<Voter>()
            .find_one(filter, None)
            .await?
            .ok_or_else(|| Error::not_found(format!("Voter {user_id}")))
    }

    async fn pending_voters(&self, organization_id: Id) -> Result<Vec<Voter>> {
        let filter = doc! { "organization_id": organization_id, "approved": false };
        Ok(self
            .coll::<Voter>()
            .find(filter, None)
            .await?
            .try_collect()
            .await?)
    }

    async fn cast_vote(
        &self,
        ctx: &ActorContext,
        vote: NewVote,
        max_votes_per_voter: u32,
    ) -> Result<Id> {
        let mut session = self.transaction().await?;

        // Reserve capacity: bump the per-(voter, race) tally, refusing if it
        // is already at the limit. The upsert path inserts the first tally;
        // if the tally exists but is full, the upsert collides with the
        // unique index and reports a duplicate key, i.e. capacity exhausted.
        // Writing this one document is also what serializes concurrent casts
        // by the same voter.
        let capacity = doc! {
            "voter_user_id": vote.voter_user_id,
            "race_id": vote.race_id,
            "count": { "$lt": max_votes_per_voter },
        };
        let bump = doc! { "$inc": { "count": 1 } };
        let upsert = UpdateOptions::builder().upsert(true).build();
        self.coll::<VoteCounter>()
            .update_one_with_session(capacity, bump, upsert, &mut session)
            .await
            .map_err(|e| {
                if is_duplicate_key(&e) {
                    Error::Conflict("maximum votes reached".to_string())
                } else {
                    e.into()
                }
            })?;

        // Record the vote itself; the unique (voter, race, candidate) index
        // is the authoritative duplicate-vote check.
        let id: Id = self
            .coll::<NewVote>()
            .insert_one_with_session(&vote, None, &mut session)
            .await
            .map_err(|e| {
                if is_duplicate_key(&e) {
                    Error::Conflict("duplicate vote".to_string())
                } else {
                    e.into()
                }
            })?
            .inserted_id
            .as_object_id()
            .unwrap() // Valid because the ID comes directly from the DB.
            .into();

        self.audit(&mut session, ctx, "cast_vote", id).await?;
        session.commit_transaction().await?;
        Ok(id)
    }

    async fn votes_by_voter_in_race(&self, voter_user_id: Id, race_id: Id) -> Result<Vec<Vote>> {
        let filter = doc! { "voter_user_id": voter_user_id, "race_id": race_id };
        Ok(self
            .coll::<Vote>()
            .find(filter, None)
            .await?
            .try_collect()
            .await?)
    }

    async fn vote_counts_by_race(&self, race_id: Id) -> Result<HashMap<Id, u64>> {
        let pipeline = vec![
            doc! { "$match": { "race_id": race_id } },
            doc! { "$group": { "_id": "$candidate_id", "count": { "$sum": 1 } } },
        ];
        let rows: Vec<bson::Document> = self
            .db
            .collection::<bson::Document>(Vote::NAME)
            .aggregate(pipeline, None)
            .await?
            .try_collect()
            .await?;
        let mut counts = HashMap::with_capacity(rows.len());
        for row in rows {
            let candidate_id: Id = row
                .get_object_id("_id")
                .expect("$group key is always the candidate ObjectId")
                .into();
            let count = match row.get("count") {
                Some(Bson::Int32(n)) => *n as u64,
                Some(Bson::Int64(n)) => *n as u64,
                _ => 0,
            };
            counts.insert(candidate_id, count);
        }
        Ok(counts)
    }

    async fn votes_in_election(&self, election_id: Id) -> Result<u64> {
        let race_ids: Vec<Bson> = self
            .races_by_election(election_id)
            .await?
            .into_iter()
            .map(|race| Bson::from(race.id))
            .collect();
        let filter = doc! { "race_id": { "$in": race_ids } };
        Ok(self.coll::<Vote>().count_documents(filter, None).await?)
    }
}

fn optional_datetime(value: Option<DateTime<Utc>>) -> Bson {
    value
        .map(|dt| Bson::DateTime(bson::DateTime::from_chrono(dt)))
        .unwrap_or(Bson::Null)
}

/// A fairing that wraps the managed database connection in a
/// [`MongoBallotStore`] and places the store plus the two services built on
/// it into managed state. Must be attached after the database fairing.
pub struct StoreFairing;

#[rocket::async_trait]
impl Fairing for StoreFairing {
    fn info(&self) -> Info {
        Info {
            name: "Ballot Store",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, rocket: Rocket<Build>) -> rocket::fairing::Result {
        let (client, db) = match (rocket.state::<Client>(), rocket.state::<Database>()) {
            (Some(client), Some(db)) => (client.clone(), db.clone()),
            _ => {
                error!("Database was not available when building the ballot store");
                return Err(rocket);
            }
        };
        let store: Arc<dyn BallotStore> = Arc::new(MongoBallotStore::new(client, db));
        Ok(rocket
            .manage(ElectionEngine::new(store.clone()))
            .manage(VoteService::new(store.clone()))
            .manage(store))
    }
}
