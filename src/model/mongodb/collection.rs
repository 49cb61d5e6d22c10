use std::ops::Deref;

use mongodb::{
    bson::doc, error::Error as DbError, options::IndexOptions, Collection, Database, IndexModel,
};

use crate::model::{
    candidate::{Candidate, NewCandidate},
    election::{Election, NewElection},
    org::OrgMembership,
    race::{NewRace, Race},
    vote::{NewVote, Vote},
    voter::{NewVoter, Voter},
};

use crate::store::mongo::{AuditEntry, VoteCounter};

/// A type that can be directly inserted/read to/from the database.
pub trait MongoCollection {
    /// The name of the collection.
    const NAME: &'static str;
}

/// A database collection of the given type.
pub struct Coll<T>(Collection<T>);

impl<T> Coll<T>
where
    T: MongoCollection,
{
    /// Get a handle on this collection in the given database.
    pub fn from_db(db: &Database) -> Self {
        Self(db.collection(T::NAME))
    }
}

// `derive(Clone)` would demand `T: Clone`, which we don't need.
impl<T> Clone for Coll<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T> Deref for Coll<T> {
    type Target = Collection<T>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

// Membership collection
const ORG_MEMBERS: &str = "org_members";
impl MongoCollection for OrgMembership {
    const NAME: &'static str = ORG_MEMBERS;
}

// Election collection
const ELECTIONS: &str = "elections";
impl MongoCollection for Election {
    const NAME: &'static str = ELECTIONS;
}
impl MongoCollection for NewElection {
    const NAME: &'static str = ELECTIONS;
}

// Race collection
const RACES: &str = "races";
impl MongoCollection for Race {
    const NAME: &'static str = RACES;
}
impl MongoCollection for NewRace {
    const NAME: &'static str = RACES;
}

// Candidate-in-race collection
const CANDIDATES: &str = "candidates";
impl MongoCollection for Candidate {
    const NAME: &'static str = CANDIDATES;
}
impl MongoCollection for NewCandidate {
    const NAME: &'static str = CANDIDATES;
}

// Voter collection
const VOTERS: &str = "voters";
impl MongoCollection for Voter {
    const NAME: &'static str = VOTERS;
}
impl MongoCollection for NewVoter {
    const NAME: &'static str = VOTERS;
}

// Vote collection
const VOTES: &str = "votes";
impl MongoCollection for Vote {
    const NAME: &'static str = VOTES;
}
impl MongoCollection for NewVote {
    const NAME: &'static str = VOTES;
}

// Audit collection
const AUDIT_LOG: &str = "audit_log";
impl MongoCollection for AuditEntry {
    const NAME: &'static str = AUDIT_LOG;
}

/// Ensure that all the required indexes exist on the given database.
///
/// The vote and voter uniqueness constraints declared here are the
/// authoritative enforcement of the no-duplicate-vote and
/// one-voter-record-per-org invariants; application-level checks are
/// advisory. This operation is idempotent.
pub async fn ensure_indexes_exist(db: &Database) -> Result<(), DbError> {
    debug!("Ensuring collection indexes exist");

    let unique = IndexOptions::builder().unique(true).build();

    // One membership record per (organization, user).
    let member_index = IndexModel::builder()
        .keys(doc! { "organization_id": 1, "user_id": 1 })
        .options(unique.clone())
        .build();
    Coll::<OrgMembership>::from_db(db)
        .create_index(member_index, None)
        .await?;

    // One voter record per (organization, user).
    let voter_index = IndexModel::builder()
        .keys(doc! { "organization_id": 1, "user_id": 1 })
        .options(unique.clone())
        .build();
    Coll::<Voter>::from_db(db)
        .create_index(voter_index, None)
        .await?;

    // Race names are unique within an election.
    let race_index = IndexModel::builder()
        .keys(doc! { "election_id": 1, "name": 1 })
        .options(unique.clone())
        .build();
    Coll::<Race>::from_db(db)
        .create_index(race_index, None)
        .await?;

    // A voter casts at most one vote per candidate per race.
    let vote_index = IndexModel::builder()
        .keys(doc! { "voter_user_id": 1, "race_id": 1, "candidate_id": 1 })
        .options(unique.clone())
        .build();
    Coll::<Vote>::from_db(db)
        .create_index(vote_index, None)
        .await?;

    // One capacity tally per (voter, race); cast_vote's upsert relies on
    // this index to reject casts beyond the race's limit.
    let counter_index = IndexModel::builder()
        .keys(doc! { "voter_user_id": 1, "race_id": 1 })
        .options(unique)
        .build();
    Coll::<VoteCounter>::from_db(db)
        .create_index(counter_index, None)
        .await?;

    // Lookup indexes for the scheduler's due-election scans.
    let due_open_index = IndexModel::builder()
        .keys(doc! { "state": 1, "start_at": 1 })
        .build();
    let due_close_index = IndexModel::builder()
        .keys(doc! { "state": 1, "end_at": 1 })
        .build();
    let elections = Coll::<Election>::from_db(db);
    elections.create_index(due_open_index, None).await?;
    elections.create_index(due_close_index, None).await?;

    // Candidates are always read through their race.
    let candidate_index = IndexModel::builder()
        .keys(doc! { "race_id": 1 })
        .build();
    Coll::<Candidate>::from_db(db)
        .create_index(candidate_index, None)
        .await?;

    Ok(())
}
