use std::ops::{Deref, DerefMut};

use chrono::{DateTime, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};

use crate::model::mongodb::Id;

/// Core voter data: an (organization, user) pair with an approval flag.
///
/// Only the approval flag matters at vote time; everything else is
/// bookkeeping for the admission workflow.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub struct VoterCore {
    pub organization_id: Id,
    pub user_id: Id,
    pub approved: bool,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub registered_at: DateTime<Utc>,
    /// The admin who approved this voter, once approved.
    pub approved_by: Option<Id>,
}

impl VoterCore {
    /// A fresh, not-yet-approved registration.
    pub fn new(organization_id: Id, user_id: Id) -> Self {
        Self {
            organization_id,
            user_id,
            approved: false,
            registered_at: Utc::now(),
            approved_by: None,
        }
    }
}

/// A voter record without an ID, ready for insertion.
pub type NewVoter = VoterCore;

/// A voter record from the database, with its unique ID.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub struct Voter {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub voter: VoterCore,
}

impl Deref for Voter {
    type Target = VoterCore;

    fn deref(&self) -> &Self::Target {
        &self.voter
    }
}

impl DerefMut for Voter {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.voter
    }
}
