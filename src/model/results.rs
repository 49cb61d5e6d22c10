use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::model::{election::ElectionState, mongodb::Id};

/// One candidate's standing in a race.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateTally {
    pub candidate_id: Id,
    pub display_name: String,
    pub ballot_order: Option<u32>,
    pub vote_count: u64,
}

/// Full results for one race, recomputed on every read.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RaceResults {
    pub election_id: Id,
    pub race_id: Id,
    pub race_name: String,
    pub election_state: ElectionState,
    pub max_winners: u32,
    pub results: Vec<CandidateTally>,
    pub total_votes: u64,
}

/// Results for every race of an election.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElectionResults {
    pub election_id: Id,
    pub election_name: String,
    pub election_state: ElectionState,
    pub races: Vec<RaceResults>,
}

/// Order tallies the way they are displayed: vote count descending, ties
/// broken by ballot order ascending (unordered candidates last), then by
/// display name ascending.
pub fn order_tallies(tallies: &mut [CandidateTally]) {
    tallies.sort_by(|a, b| {
        b.vote_count
            .cmp(&a.vote_count)
            .then_with(|| cmp_ballot_order(a.ballot_order, b.ballot_order))
            .then_with(|| a.display_name.cmp(&b.display_name))
    });
}

fn cmp_ballot_order(a: Option<u32>, b: Option<u32>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tally(name: &str, ballot_order: Option<u32>, votes: u64) -> CandidateTally {
        CandidateTally {
            candidate_id: Id::new(),
            display_name: name.to_string(),
            ballot_order,
            vote_count: votes,
        }
    }

    #[test]
    fn orders_by_count_then_ballot_order_then_name() {
        let mut tallies = vec![
            tally("Carol", None, 2),
            tally("Alice", Some(2), 5),
            tally("Bob", Some(1), 5),
            tally("Dave", Some(3), 2),
        ];
        order_tallies(&mut tallies);
        let names: Vec<_> = tallies.iter().map(|t| t.display_name.as_str()).collect();
        // Bob beats Alice on ballot order at 5 votes; Dave's explicit order
        // beats Carol's missing one at 2.
        assert_eq!(names, vec!["Bob", "Alice", "Dave", "Carol"]);
    }

    #[test]
    fn name_breaks_final_ties() {
        let mut tallies = vec![tally("Zoe", None, 0), tally("Amy", None, 0)];
        order_tallies(&mut tallies);
        assert_eq!(tallies[0].display_name, "Amy");
    }
}
