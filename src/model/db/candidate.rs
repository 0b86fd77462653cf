use std::ops::{Deref, DerefMut};

use serde::{Deserialize, Serialize};

use crate::model::common::election::{CandidateId, ElectionId};

/// Core candidate data, as stored in the database.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct CandidateCore {
    /// The election this candidate stands in.
    pub election_id: ElectionId,
    pub name: String,
    pub presentation: String,
    /// Image reference, opaque to the backend.
    pub image: String,
    /// Score assigned by the most recent tally; zero until then.
    #[serde(default)]
    pub points: f64,
}

/// A candidate from the database, with its unique ID.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct Candidate {
    #[serde(rename = "_id")]
    pub id: CandidateId,
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

/// Example data for tests.
#[cfg(test)]
mod examples {
    use super::*;

    impl CandidateCore {
        pub fn example(election_id: ElectionId, name: &str) -> Self {
            Self {
                election_id,
                name: name.to_string(),
                presentation: format!("Vote {name}!"),
                image: format!("{}.png", name.to_lowercase()),
                points: 0.0,
            }
        }
    }
}
