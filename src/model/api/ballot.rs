use serde::{Deserialize, Serialize};

use crate::model::common::election::CandidateId;

/// A ballot the caller wishes to cast.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BallotSpec {
    /// Candidate IDs, most preferred first.
    pub candidates: Vec<CandidateId>,
}

/// The receipt handed back for a cast ballot.
/// Holding it is the only way to look the ballot up again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    pub receipt: String,
}
