use serde::{Deserialize, Serialize};

use crate::model::{api::election::ElectionView, common::election::CandidateId};

/// Everything needed to recount a finished election independently.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElectionResults {
    /// The counted election, with published points.
    pub election: ElectionView,
    /// Every ballot's ranking, most preferred first.
    /// Sorted, so the order says nothing about when each ballot was cast.
    pub ballots: Vec<Vec<CandidateId>>,
}
