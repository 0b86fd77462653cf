use rocket::{futures::FutureExt, serde::json::Json, Route, State};

use crate::error::Result;
use crate::model::{
    api::{election::ElectionView, results::ElectionResults},
    common::election::ElectionId,
};
use crate::voting::{
    registry::{get_elections, get_results, is_initialized},
    Coordinator,
};

pub fn routes() -> Vec<Route> {
    routes![public_elections, public_results, uninitialized]
}

#[get("/elections", rank = 2)]
async fn public_elections(coordinator: &State<Coordinator>) -> Result<Json<Vec<ElectionView>>> {
    let elections = coordinator
        .execute(|unit| get_elections(unit, true).boxed())
        .await?;
    Ok(Json(elections))
}

#[get("/elections/<election_id>/results", rank = 2)]
async fn public_results(
    election_id: ElectionId,
    coordinator: &State<Coordinator>,
) -> Result<Json<ElectionResults>> {
    let results = coordinator
        .execute(move |unit| get_results(unit, election_id, false).boxed())
        .await?;
    Ok(Json(results))
}

/// Does the system still need an election to be set up?
#[get("/uninitialized")]
async fn uninitialized(coordinator: &State<Coordinator>) -> Result<Json<bool>> {
    let initialized = coordinator
        .execute(|unit| is_initialized(unit).boxed())
        .await?;
    Ok(Json(!initialized))
}
