use log::info;
use rocket::{futures::FutureExt, http::Status, serde::json::Json, Route, State};

use crate::error::Result;
use crate::model::{
    api::{
        election::{ElectionSpec, ElectionView},
        results::ElectionResults,
    },
    common::election::ElectionId,
};
use crate::voting::{
    registry::{get_elections, get_results, initialize, publish},
    tally::{tally, TallyOutcome},
    Coordinator,
};

use super::common::AdminCaller;

pub fn routes() -> Vec<Route> {
    routes![
        all_elections,
        all_results,
        initialize_election,
        publish_election,
        tally_election,
    ]
}

#[get("/elections", rank = 1)]
async fn all_elections(
    _admin: AdminCaller,
    coordinator: &State<Coordinator>,
) -> Result<Json<Vec<ElectionView>>> {
    let elections = coordinator
        .execute(|unit| get_elections(unit, false).boxed())
        .await?;
    Ok(Json(elections))
}

#[get("/elections/<election_id>/results", rank = 1)]
async fn all_results(
    _admin: AdminCaller,
    election_id: ElectionId,
    coordinator: &State<Coordinator>,
) -> Result<Json<ElectionResults>> {
    let results = coordinator
        .execute(move |unit| get_results(unit, election_id, true).boxed())
        .await?;
    Ok(Json(results))
}

#[post("/initialize", data = "<spec>", format = "json")]
async fn initialize_election(
    admin: AdminCaller,
    spec: Json<ElectionSpec>,
    coordinator: &State<Coordinator>,
) -> Result<(Status, Json<ElectionView>)> {
    let spec = spec.into_inner();
    let election = coordinator
        .execute(move |unit| initialize(unit, spec).boxed())
        .await?;
    info!("Admin {} initialized election {}", admin.0.id, election.id);
    Ok((Status::Created, Json(election)))
}

#[post("/elections/<election_id>/publish")]
async fn publish_election(
    _admin: AdminCaller,
    election_id: ElectionId,
    coordinator: &State<Coordinator>,
) -> Result<()> {
    coordinator
        .execute(move |unit| publish(unit, election_id).boxed())
        .await
}

/// Count a closed election now rather than waiting for the next periodic pass.
#[post("/elections/<election_id>/tally")]
async fn tally_election(
    _admin: AdminCaller,
    election_id: ElectionId,
    coordinator: &State<Coordinator>,
) -> Result<Json<TallyOutcome>> {
    let outcome = coordinator
        .execute(move |unit| tally(unit, election_id).boxed())
        .await?;
    Ok(Json(outcome))
}
