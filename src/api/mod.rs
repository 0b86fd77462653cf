use rocket::Route;

mod admin;
mod common;
mod public;
mod voting;

pub use common::{AdminCaller, Caller, USER_ID_COOKIE};

pub fn routes() -> Vec<Route> {
    let mut routes = Vec::new();
    routes.extend(admin::routes());
    routes.extend(public::routes());
    routes.extend(voting::routes());
    routes
}
