use std::collections::HashMap;

use log::info;
use mongodb::{bson::doc, options::FindOptions};
use rand::seq::SliceRandom;
use rocket::http::Status;

use crate::error::{Error, Result};
use crate::model::{
    api::{
        election::{ElectionSpec, ElectionView},
        results::ElectionResults,
    },
    common::election::{CandidateId, ElectionId},
    db::{ballot::Ballot, candidate::Candidate, election::Election},
    mongodb::{u32_id_filter, Counter, CANDIDATE_ID_COUNTER_ID, ELECTION_ID_COUNTER_ID},
};

use super::coordinator::UnitOfWork;

/// Get the one and only election.
pub async fn single_election(unit: &mut UnitOfWork) -> Result<Election> {
    let elections = unit.coll::<Election>();
    let count = elections
        .count_documents_with_session(doc! {}, None, unit.session())
        .await?;
    if count != 1 {
        return Err(Error::ElectionCount(count));
    }
    elections
        .find_one_with_session(doc! {}, None, unit.session())
        .await?
        .ok_or(Error::ElectionCount(0))
}

/// Get an election by ID.
pub async fn election_by_id(unit: &mut UnitOfWork, election_id: ElectionId) -> Result<Election> {
    unit.coll::<Election>()
        .find_one_with_session(u32_id_filter(election_id), None, unit.session())
        .await?
        .ok_or_else(|| Error::not_found(format!("Election {election_id}")))
}

/// Every candidate standing in the given election, in ID order.
pub async fn candidates_of(
    unit: &mut UnitOfWork,
    election_id: ElectionId,
) -> Result<Vec<Candidate>> {
    let options = FindOptions::builder().sort(doc! {"_id": 1}).build();
    let candidates = unit
        .coll::<Candidate>()
        .find_all_with_session(doc! {"election_id": election_id}, options, unit.session())
        .await?;
    Ok(candidates)
}

/// Has the election been created yet?
pub async fn is_initialized(unit: &mut UnitOfWork) -> Result<bool> {
    let count = unit
        .coll::<Election>()
        .count_documents_with_session(doc! {}, None, unit.session())
        .await?;
    Ok(count > 0)
}

/// Create the election and its candidates. Only possible once.
pub async fn initialize(unit: &mut UnitOfWork, spec: ElectionSpec) -> Result<ElectionView> {
    spec.validate()?;
    if is_initialized(unit).await? {
        return Err(Error::AlreadyInitialized);
    }

    let counters = unit.coll::<Counter>();
    let election_id = Counter::next(&counters, ELECTION_ID_COUNTER_ID, unit.session()).await?;
    let mut candidate_ids = Vec::with_capacity(spec.candidates.len());
    for _ in &spec.candidates {
        candidate_ids.push(Counter::next(&counters, CANDIDATE_ID_COUNTER_ID, unit.session()).await?);
    }
    let (election, candidates) = spec.into_election(election_id, &candidate_ids);

    unit.coll::<Election>()
        .insert_one_with_session(&election, None, unit.session())
        .await?;
    unit.coll::<Candidate>()
        .insert_many_with_session(&candidates, None, unit.session())
        .await?;

    info!(
        "Initialized election {election_id} with {} candidates",
        candidates.len()
    );
    Ok(ElectionView::new(election, candidates))
}

/// Make an election visible to everyone. Publishing twice is harmless.
pub async fn publish(unit: &mut UnitOfWork, election_id: ElectionId) -> Result<()> {
    let update = doc! {
        "$set": { "public": true },
    };
    let result = unit
        .coll::<Election>()
        .update_one_with_session(u32_id_filter(election_id), update, None, unit.session())
        .await?;
    if result.matched_count == 0 {
        return Err(Error::not_found(format!("Election {election_id}")));
    }
    info!("Published election {election_id}");
    Ok(())
}

/// List elections by start time, each with its candidates in a fresh random order.
/// Unpublished elections are left out if `only_public` is set.
pub async fn get_elections(unit: &mut UnitOfWork, only_public: bool) -> Result<Vec<ElectionView>> {
    let filter = if only_public {
        doc! {"public": true}
    } else {
        doc! {}
    };
    let options = FindOptions::builder().sort(doc! {"start_time": 1}).build();
    let elections = unit
        .coll::<Election>()
        .find_all_with_session(filter, options, unit.session())
        .await?;

    let ids: Vec<ElectionId> = elections.iter().map(|e| e.id).collect();
    let filter = doc! {
        "election_id": { "$in": ids },
    };
    let candidates = unit
        .coll::<Candidate>()
        .find_all_with_session(filter, None, unit.session())
        .await?;

    Ok(with_shuffled_candidates(elections, candidates))
}

/// Group candidates under their elections, shuffling each roster.
fn with_shuffled_candidates(
    elections: Vec<Election>,
    candidates: Vec<Candidate>,
) -> Vec<ElectionView> {
    let mut by_election: HashMap<ElectionId, Vec<Candidate>> = HashMap::new();
    for candidate in candidates {
        by_election
            .entry(candidate.election_id)
            .or_default()
            .push(candidate);
    }
    let mut rng = rand::thread_rng();
    elections
        .into_iter()
        .map(|election| {
            let mut roster = by_election.remove(&election.id).unwrap_or_default();
            roster.shuffle(&mut rng);
            ElectionView::new(election, roster)
        })
        .collect()
}

/// Everything needed to audit a counted election.
///
/// Unpublished elections are only returned if `include_unpublished` is set.
pub async fn get_results(
    unit: &mut UnitOfWork,
    election_id: ElectionId,
    include_unpublished: bool,
) -> Result<ElectionResults> {
    let election = election_by_id(unit, election_id).await?;
    if !election.public && !include_unpublished {
        return Err(Error::not_found(format!("Election {election_id}")));
    }
    if !election.counted {
        return Err(Error::Status(
            Status::Forbidden,
            format!("Election {election_id} has not been counted yet"),
        ));
    }

    let candidates = candidates_of(unit, election_id).await?;
    let ballots = unit
        .coll::<Ballot>()
        .find_all_with_session(doc! {"election_id": election_id}, None, unit.session())
        .await?;

    Ok(ElectionResults {
        election: ElectionView::new(election, candidates),
        ballots: sorted_rankings(ballots),
    })
}

/// Strip ballots down to their rankings, sorted so storage order is not revealed.
fn sorted_rankings(ballots: Vec<Ballot>) -> Vec<Vec<CandidateId>> {
    let mut rankings: Vec<_> = ballots.into_iter().map(|b| b.ballot.candidates).collect();
    rankings.sort_unstable();
    rankings
}
