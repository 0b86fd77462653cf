use std::collections::HashSet;

use log::{debug, info};
use mongodb::bson::doc;

use crate::error::{Error, Result};
use crate::model::{
    api::ballot::Receipt,
    common::{
        election::{CandidateId, VotingWindow},
        user::UserId,
    },
    db::{
        ballot::{Ballot, BallotCore},
        election::Election,
        user::User,
    },
    mongodb::{is_duplicate_key_error, u32_id_filter, Counter, BALLOT_ID_COUNTER_ID},
};

use super::{
    coordinator::UnitOfWork,
    receipt::ReceiptToken,
    registry::{candidates_of, single_election},
};

/// Cast `voter`'s ranked ballot in the single election.
///
/// Checks run in order: one election exists, voting is open, the voter is
/// eligible and has not voted, the ranking has an allowed length, and every
/// ranked candidate stands in the election exactly once. The voter is marked
/// as having voted and the ballot is stored in the same unit, so either both
/// persist or neither does.
pub async fn cast_ballot(
    unit: &mut UnitOfWork,
    voter: UserId,
    ranking: Vec<CandidateId>,
) -> Result<Receipt> {
    let election = single_election(unit).await?;
    check_window(&election, unit)?;
    mark_voted(unit, voter).await?;
    check_length(&election, &ranking)?;
    let roster = candidates_of(unit, election.id)
        .await?
        .into_iter()
        .map(|c| c.id)
        .collect::<HashSet<_>>();
    validate_ranking(&ranking, &roster)?;

    let token = ReceiptToken::generate();
    let ballot_id = Counter::next(&unit.coll(), BALLOT_ID_COUNTER_ID, unit.session()).await?;
    let ballot = Ballot {
        id: ballot_id,
        ballot: BallotCore {
            election_id: election.id,
            receipt_hash: token.hash(),
            candidates: ranking,
        },
    };
    unit.coll::<Ballot>()
        .insert_one_with_session(&ballot, None, unit.session())
        .await
        .map_err(|err| {
            if is_duplicate_key_error(&err) {
                Error::ReceiptCollision
            } else {
                err.into()
            }
        })?;

    // Never log the voter alongside the ballot.
    info!("Ballot {ballot_id} cast in election {}", election.id);
    Ok(Receipt {
        receipt: token.to_string(),
    })
}

fn check_window(election: &Election, unit: &UnitOfWork) -> Result<()> {
    match election.window(unit.now()) {
        VotingWindow::NotStarted => Err(Error::TooEarly),
        VotingWindow::Open => Ok(()),
        VotingWindow::Closed => Err(Error::TooLate),
    }
}

/// Atomically flip the voter's `has_voted` flag from false to true.
///
/// Of any number of concurrent attempts for the same voter, only the one
/// that actually modifies the document succeeds.
async fn mark_voted(unit: &mut UnitOfWork, voter: UserId) -> Result<()> {
    let users = unit.coll::<User>();
    let user = users
        .find_one_with_session(u32_id_filter(voter), None, unit.session())
        .await?
        .ok_or(Error::UnknownVoter(voter))?;
    if !user.role.may_vote() {
        debug!("Rejected ballot from unvalidated user {voter}");
        return Err(Error::NotValidated(voter));
    }

    let filter = doc! {
        "_id": voter,
        "has_voted": false,
    };
    let update = doc! {
        "$set": { "has_voted": true },
    };
    let result = users
        .update_one_with_session(filter, update, None, unit.session())
        .await?;
    if result.modified_count == 0 {
        debug!("Rejected second ballot from user {voter}");
        return Err(Error::AlreadyVoted(voter));
    }
    Ok(())
}

fn check_length(election: &Election, ranking: &[CandidateId]) -> Result<()> {
    if election.accepts_ranking_len(ranking.len()) {
        Ok(())
    } else {
        Err(Error::Cardinality {
            min: election.min_candidates,
            max: election.max_candidates,
            got: ranking.len(),
        })
    }
}

/// Every ranked candidate must be on the roster, and none may appear twice.
pub fn validate_ranking(ranking: &[CandidateId], roster: &HashSet<CandidateId>) -> Result<()> {
    let mut seen = HashSet::with_capacity(ranking.len());
    for &candidate in ranking {
        if !roster.contains(&candidate) {
            return Err(Error::UnknownCandidate(candidate));
        }
        if !seen.insert(candidate) {
            return Err(Error::DuplicateCandidate(candidate));
        }
    }
    Ok(())
}
