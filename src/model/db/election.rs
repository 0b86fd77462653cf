use std::ops::{Deref, DerefMut};

use chrono::{DateTime, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};

use crate::model::common::election::{CountMethod, ElectionId, VotingWindow};

/// Core election data, as stored in the database.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub struct ElectionCore {
    /// Election name.
    pub name: String,
    /// Voting opens at this instant (inclusive).
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub start_time: DateTime<Utc>,
    /// Voting closes at this instant (exclusive).
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub end_time: DateTime<Utc>,
    /// Unpublished elections are only visible to admins.
    pub public: bool,
    /// Set once, by the tally, and never unset.
    pub counted: bool,
    /// How ballots are turned into scores.
    pub count_method: CountMethod,
    /// Fewest candidates a ballot may rank.
    pub min_candidates: u32,
    /// Most candidates a ballot may rank.
    pub max_candidates: u32,
}

impl ElectionCore {
    /// Classify `now` against this election's voting window.
    pub fn window(&self, now: DateTime<Utc>) -> VotingWindow {
        VotingWindow::at(now, self.start_time, self.end_time)
    }

    /// Is the given number of ranked candidates within this election's bounds?
    pub fn accepts_ranking_len(&self, len: usize) -> bool {
        let len = u32::try_from(len).unwrap_or(u32::MAX);
        self.min_candidates <= len && len <= self.max_candidates
    }
}

/// An election from the database, with its unique ID.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub struct Election {
    #[serde(rename = "_id")]
    pub id: ElectionId,
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


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ranking_bounds_are_inclusive() {
        let election = ElectionCore::current_example();
        assert!(!election.accepts_ranking_len(0));
        assert!(!election.accepts_ranking_len(1));
        assert!(election.accepts_ranking_len(2));
        assert!(election.accepts_ranking_len(3));
        assert!(!election.accepts_ranking_len(4));
        assert!(!election.accepts_ranking_len(usize::MAX));
    }

    #[test]
    fn window_uses_election_times() {
        let election = ElectionCore::current_example();
        assert_eq!(election.window(election.start_time), VotingWindow::Open);
        assert_eq!(election.window(election.end_time), VotingWindow::Closed);
    }
}
