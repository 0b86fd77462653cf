use std::collections::HashMap;

use log::{debug, info};
use mongodb::bson::doc;
use serde::Serialize;

use crate::error::{Error, Result};
use crate::model::{
    common::election::{CandidateId, CountMethod, ElectionId, VotingWindow},
    db::{ballot::Ballot, candidate::Candidate, election::Election},
    mongodb::{bson_datetime, u32_id_filter},
};

use super::{
    coordinator::UnitOfWork,
    registry::{candidates_of, election_by_id},
};

/// What a tally did.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TallyOutcome {
    /// Scores were written from this many ballots.
    Counted { ballots: usize },
    /// The election had already been counted; nothing changed.
    AlreadyCounted,
}

/// Score every candidate on `roster` from `ballots`.
///
/// `N` for Borda is the size of the roster, not of each ballot. Candidates
/// nobody ranked score zero. Rankings of candidates off the roster are ignored.
pub fn score(
    method: CountMethod,
    roster: &[CandidateId],
    ballots: &[Vec<CandidateId>],
) -> HashMap<CandidateId, f64> {
    let total = roster.len();
    let mut scores: HashMap<CandidateId, f64> = roster.iter().map(|&id| (id, 0.0)).collect();
    for ballot in ballots {
        for (position, candidate) in ballot.iter().enumerate() {
            if let Some(points) = scores.get_mut(candidate) {
                *points += method.points(position, total);
            }
        }
    }
    scores
}

/// Count a closed election, writing each candidate's score and marking the
/// election counted in the same unit.
///
/// Tallying an already counted election changes nothing.
pub async fn tally(unit: &mut UnitOfWork, election_id: ElectionId) -> Result<TallyOutcome> {
    let election = election_by_id(unit, election_id).await?;
    if election.counted {
        debug!("Election {election_id} already counted");
        return Ok(TallyOutcome::AlreadyCounted);
    }
    if election.window(unit.now()) != VotingWindow::Closed {
        return Err(Error::NotClosed(election_id));
    }

    let candidates = candidates_of(unit, election_id).await?;
    let roster: Vec<CandidateId> = candidates.iter().map(|c| c.id).collect();
    let ballots: Vec<Vec<CandidateId>> = unit
        .coll::<Ballot>()
        .find_all_with_session(doc! {"election_id": election_id}, None, unit.session())
        .await?
        .into_iter()
        .map(|b| b.ballot.candidates)
        .collect();
    let scores = score(election.count_method, &roster, &ballots);

    write_points(unit, &scores).await?;

    let filter = doc! {
        "_id": election_id,
        "counted": false,
    };
    let update = doc! {
        "$set": { "counted": true },
    };
    let result = unit
        .coll::<Election>()
        .update_one_with_session(filter, update, None, unit.session())
        .await?;
    if result.modified_count != 1 {
        return Err(Error::CountedFlag(election_id));
    }

    info!(
        "Counted election {election_id}: {} ballots by {:?}",
        ballots.len(),
        election.count_method
    );
    Ok(TallyOutcome::Counted {
        ballots: ballots.len(),
    })
}

/// Store each candidate's score. Every candidate must exist.
async fn write_points(unit: &mut UnitOfWork, scores: &HashMap<CandidateId, f64>) -> Result<()> {
    // `$set`, not `$inc`: a retried tally must land on the same values.
    let candidates = unit.coll::<Candidate>();
    for (&candidate, &points) in scores {
        let update = doc! {
            "$set": { "points": points },
        };
        let result = candidates
            .update_one_with_session(u32_id_filter(candidate), update, None, unit.session())
            .await?;
        if result.matched_count == 0 {
            return Err(Error::DanglingCandidate(candidate));
        }
    }
    Ok(())
}

/// Tally every election that has closed but not yet been counted.
/// Returns the IDs of the elections counted by this call.
pub async fn tally_closed_elections(unit: &mut UnitOfWork) -> Result<Vec<ElectionId>> {
    let filter = doc! {
        "counted": false,
        "end_time": { "$lte": bson_datetime(unit.now()) },
    };
    let due: Vec<ElectionId> = unit
        .coll::<Election>()
        .find_all_with_session(filter, None, unit.session())
        .await?
        .into_iter()
        .map(|e| e.id)
        .collect();

    let mut counted = Vec::with_capacity(due.len());
    for election_id in due {
        if let TallyOutcome::Counted { .. } = tally(unit, election_id).await? {
            counted.push(election_id);
        }
    }
    Ok(counted)
}
