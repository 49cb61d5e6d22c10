use std::ops::Deref;

use chrono::{DateTime, Utc};
use mongodb::bson::{serde_helpers::chrono_datetime_as_bson_datetime, to_bson, Bson};
use serde::{Deserialize, Serialize};

use crate::model::mongodb::Id;

/// How a vote reached the system.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum VoteChannel {
    Web,
    Kiosk,
}

impl Default for VoteChannel {
    fn default() -> Self {
        VoteChannel::Web
    }
}

impl From<VoteChannel> for Bson {
    fn from(channel: VoteChannel) -> Self {
        to_bson(&channel).expect("Serialisation is infallible")
    }
}

/// Core vote data, as stored in the database. Votes are append-only facts:
/// there is no update or delete path anywhere in the system.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub struct VoteCore {
    pub race_id: Id,
    /// The candidate-in-race association voted for.
    pub candidate_id: Id,
    pub voter_user_id: Id,
    pub channel: VoteChannel,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub cast_at: DateTime<Utc>,
}

impl VoteCore {
    pub fn new(race_id: Id, candidate_id: Id, voter_user_id: Id, channel: VoteChannel) -> Self {
        Self {
            race_id,
            candidate_id,
            voter_user_id,
            channel,
            cast_at: Utc::now(),
        }
    }
}

/// A vote without an ID, ready for insertion.
pub type NewVote = VoteCore;

/// A vote from the database, with its unique ID.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub struct Vote {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub vote: VoteCore,
}

impl Deref for Vote {
    type Target = VoteCore;

    fn deref(&self) -> &Self::Target {
        &self.vote
    }
}

/// Request payload for casting a vote.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CastVoteSpec {
    pub election_id: Id,
    pub race_id: Id,
    pub candidate_id: Id,
    #[serde(default)]
    pub channel: VoteChannel,
}
