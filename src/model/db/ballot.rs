use std::ops::{Deref, DerefMut};

use serde::{Deserialize, Serialize};

use crate::model::common::election::{BallotId, CandidateId, ElectionId};

/// Core ballot data, as stored in the database.
///
/// A ballot must never carry anything identifying the voter who cast it.
/// The only way back to it is the receipt, which is stored hashed.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub struct BallotCore {
    pub election_id: ElectionId,
    /// Lowercase hex SHA-256 of the receipt token.
    pub receipt_hash: String,
    /// Candidate IDs, most preferred first.
    pub candidates: Vec<CandidateId>,
}

/// A ballot from the database, with its unique ID.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub struct Ballot {
    #[serde(rename = "_id")]
    pub id: BallotId,
    #[serde(flatten)]
    pub ballot: BallotCore,
}

impl Deref for Ballot {
    type Target = BallotCore;

    fn deref(&self) -> &Self::Target {
        &self.ballot
    }
}

impl DerefMut for Ballot {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.ballot
    }
}
