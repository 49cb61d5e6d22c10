use std::ops::{Deref, DerefMut};

use serde::{Deserialize, Serialize};

use crate::model::mongodb::Id;

/// A candidate's appearance on one race's ballot, as stored in the database.
///
/// The ballot view is always scoped through this association; a person
/// standing in two races gets two records.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub struct CandidateCore {
    /// The race this candidacy belongs to.
    pub race_id: Id,
    /// Name as it appears on the ballot.
    pub display_name: String,
    pub affiliation: Option<String>,
    pub bio: Option<String>,
    /// Position on the ballot; unordered candidates sort last.
    pub ballot_order: Option<u32>,
    /// Cleared to appear on the ballot and receive votes.
    pub approved: bool,
}

/// A candidacy without an ID, ready for insertion.
pub type NewCandidate = CandidateCore;

/// A candidacy from the database, with its unique ID.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub struct Candidate {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub candidate: CandidateCore,
}

impl Deref for Candidate {
    type Target = CandidateCore;

    fn deref(&self) -> &Self::Target {
        &self.candidate
    }
}

impl DerefMut for Candidate {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.candidate
    }
}

/// Request payload for adding a candidate to a race.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateSpec {
    pub display_name: String,
    #[serde(default)]
    pub affiliation: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub ballot_order: Option<u32>,
}
