use std::fmt::{self, Display, Formatter};
use std::ops::{Deref, DerefMut};

use chrono::{DateTime, Utc};
use mongodb::bson::{serde_helpers::chrono_datetime_as_bson_datetime, to_bson, Bson};
use serde::{Deserialize, Serialize};

use crate::model::mongodb::{serde_option_datetime, Id};

/// States in the election lifecycle.
///
/// Transitions only ever move forward: an election can never return to an
/// earlier state, and nothing exits `Closed`. `Archived` is a declared
/// terminal state for future use; no operation currently produces it.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ElectionState {
    /// Under construction, only visible to its organization.
    Draft,
    /// Start/end times set; the scheduler will open it when due.
    Scheduled,
    /// Accepting votes.
    Open,
    /// Voting finished; results are final.
    Closed,
    /// Retired terminal state (reserved).
    Archived,
}

impl ElectionState {
    /// Is `next` a legal immediate successor of this state?
    ///
    /// This table is the single authority for both manual operations and
    /// the scheduler's automatic transitions.
    pub fn may_transition_to(self, next: ElectionState) -> bool {
        use ElectionState::*;
        matches!(
            (self, next),
            (Draft, Scheduled) | (Draft, Open) | (Scheduled, Open) | (Open, Closed)
        )
    }

    /// May election fields (name, description, times) still be edited?
    pub fn is_editable(self) -> bool {
        self == ElectionState::Draft
    }

    /// May races and candidates still be created, updated or deleted?
    pub fn allows_race_changes(self) -> bool {
        matches!(self, ElectionState::Draft | ElectionState::Scheduled)
    }
}

impl Display for ElectionState {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Draft => "DRAFT",
            Self::Scheduled => "SCHEDULED",
            Self::Open => "OPEN",
            Self::Closed => "CLOSED",
            Self::Archived => "ARCHIVED",
        };
        write!(f, "{name}")
    }
}

impl From<ElectionState> for Bson {
    fn from(state: ElectionState) -> Self {
        to_bson(&state).expect("Serialisation is infallible")
    }
}

/// Core election data, as stored in the database.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub struct ElectionCore {
    /// Owning organization.
    pub organization_id: Id,
    /// Election name.
    pub name: String,
    /// Optional free-text description.
    pub description: Option<String>,
    /// Lifecycle state.
    pub state: ElectionState,
    /// When the scheduler should open this election, if scheduled.
    #[serde(with = "serde_option_datetime")]
    pub start_at: Option<DateTime<Utc>>,
    /// When the scheduler should close this election, if scheduled.
    #[serde(with = "serde_option_datetime")]
    pub end_at: Option<DateTime<Utc>>,
    /// When the election actually opened.
    #[serde(with = "serde_option_datetime")]
    pub opened_at: Option<DateTime<Utc>>,
    /// When the election actually closed.
    #[serde(with = "serde_option_datetime")]
    pub closed_at: Option<DateTime<Utc>>,
    /// The admin who created the election.
    pub created_by: Id,
    /// Creation time.
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

impl ElectionCore {
    /// A new election in `Draft`.
    pub fn new(
        organization_id: Id,
        name: String,
        description: Option<String>,
        created_by: Id,
    ) -> Self {
        Self {
            organization_id,
            name,
            description,
            state: ElectionState::Draft,
            start_at: None,
            end_at: None,
            opened_at: None,
            closed_at: None,
            created_by,
            created_at: Utc::now(),
        }
    }
}

/// An election without an ID, ready for insertion.
pub type NewElection = ElectionCore;

/// An election from the database, with its unique ID.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub struct Election {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub election: ElectionCore,
}

impl Deref for Election {
    type Target = ElectionCore;

    fn deref(&self) -> &Self::Target {
        &self.election
    }
}

impl DerefMut for Election {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.election
    }
}

/// Request payload for creating an election.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElectionSpec {
    pub organization_id: Id,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// Request payload for editing a draft election.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElectionUpdate {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub start_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_at: Option<DateTime<Utc>>,
}

/// Request payload for scheduling an election.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleSpec {
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    use ElectionState::*;

    const ALL_STATES: [ElectionState; 5] = [Draft, Scheduled, Open, Closed, Archived];

    /// Position of each state along the lifecycle.
    fn rank(state: ElectionState) -> u8 {
        match state {
            Draft => 0,
            Scheduled => 1,
            Open => 2,
            Closed => 3,
            Archived => 4,
        }
    }

    #[test]
    fn transitions_never_regress() {
        for from in ALL_STATES {
            for to in ALL_STATES {
                if from.may_transition_to(to) {
                    assert!(
                        rank(to) > rank(from),
                        "{from} -> {to} would move the lifecycle backwards"
                    );
                }
            }
        }
    }

    #[test]
    fn closed_is_terminal() {
        for to in ALL_STATES {
            assert!(!Closed.may_transition_to(to));
        }
    }

    #[test]
    fn archived_is_unreachable() {
        for from in ALL_STATES {
            assert!(!from.may_transition_to(Archived));
        }
    }

    #[test]
    fn manual_open_skips_scheduled() {
        assert!(Draft.may_transition_to(Open));
        assert!(Scheduled.may_transition_to(Open));
        assert!(!Open.may_transition_to(Open));
    }

    #[test]
    fn race_changes_frozen_once_open() {
        assert!(Draft.allows_race_changes());
        assert!(Scheduled.allows_race_changes());
        assert!(!Open.allows_race_changes());
        assert!(!Closed.allows_race_changes());
    }
}
