use std::ops::{Deref, DerefMut};

use serde::{Deserialize, Serialize};

use crate::model::mongodb::Id;

/// Core race data, as stored in the database.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub struct RaceCore {
    /// Owning election.
    pub election_id: Id,
    /// Race name, unique within the election.
    pub name: String,
    pub description: Option<String>,
    /// How many distinct candidates one voter may select in this race.
    pub max_votes_per_voter: u32,
    /// How many top-ranked candidates count as winners when reading results.
    pub max_winners: u32,
}

/// A race without an ID, ready for insertion.
pub type NewRace = RaceCore;

/// A race from the database, with its unique ID.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub struct Race {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub race: RaceCore,
}

impl Deref for Race {
    type Target = RaceCore;

    fn deref(&self) -> &Self::Target {
        &self.race
    }
}

impl DerefMut for Race {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.race
    }
}

fn default_limit() -> u32 {
    1
}

/// Request payload for creating a race.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RaceSpec {
    pub election_id: Id,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_limit")]
    pub max_votes_per_voter: u32,
    #[serde(default = "default_limit")]
    pub max_winners: u32,
}

/// Request payload for updating a race.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RaceUpdate {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_limit")]
    pub max_votes_per_voter: u32,
}
