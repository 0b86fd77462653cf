use log::info;
use rocket::{futures::FutureExt, serde::json::Json, Route, State};

use crate::error::Result;
use crate::logging::RequestId;
use crate::model::api::{
    ballot::{BallotSpec, Receipt},
    election::CandidateView,
};
use crate::voting::{cast::cast_ballot, receipt::verify_receipt, Coordinator};

use super::common::Caller;

pub fn routes() -> Vec<Route> {
    routes![cast_vote, check_vote]
}

#[post("/elections/vote", data = "<ballot>", format = "json")]
async fn cast_vote(
    caller: Caller,
    ballot: Json<BallotSpec>,
    coordinator: &State<Coordinator>,
    request_id: &RequestId,
) -> Result<Json<Receipt>> {
    let voter = caller.id;
    let ranking = ballot.into_inner().candidates;
    let receipt = coordinator
        .execute(move |unit| cast_ballot(unit, voter, ranking).boxed())
        .await?;
    info!("{request_id}: ballot accepted");
    Ok(Json(receipt))
}

/// Anyone holding a receipt may see the ranking it refers to.
#[post("/elections/vote/check", data = "<receipt>", format = "json")]
async fn check_vote(
    receipt: Json<Receipt>,
    coordinator: &State<Coordinator>,
) -> Result<Json<Vec<CandidateView>>> {
    let token = receipt.into_inner().receipt;
    let ranked = coordinator
        .execute(move |unit| async move { verify_receipt(unit, &token).await }.boxed())
        .await?;
    Ok(Json(ranked))
}
