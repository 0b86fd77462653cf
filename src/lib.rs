#[macro_use]
extern crate rocket;

#[cfg(test)]
#[macro_use]
extern crate backend_test;

use rocket::{Build, Rocket};

use crate::config::{ConfigFairing, DatabaseFairing};
use crate::logging::LoggerFairing;
use crate::voting::scheduler::TallySchedulerFairing;

pub mod api;
pub mod config;
pub mod error;
pub mod logging;
pub mod model;
pub mod scheduled_task;
pub mod voting;

/// Build the server: configuration, database, periodic tally, logging and routes.
pub fn build() -> Rocket<Build> {
    rocket::build()
        .attach(ConfigFairing)
        .attach(DatabaseFairing)
        .attach(TallySchedulerFairing::default())
        .attach(LoggerFairing)
        .mount("/", api::routes())
}

/// Connect to the database named in the Rocket config, for tests.
#[cfg(test)]
pub(crate) async fn db_client() -> mongodb::Client {
    let config: config::DbConfig = rocket::Config::figment()
        .extract()
        .expect("`db_uri` not set");
    mongodb::Client::with_uri_str(config.db_uri)
        .await
        .expect("Could not connect to database")
}

/// A random database name, so tests never collide.
#[cfg(test)]
pub(crate) fn database() -> String {
    let random: u32 = rand::random();
    format!("test{random}")
}

#[cfg(test)]
pub(crate) async fn prepare_database(db: &mongodb::Database) {
    config::prepare_database(db)
        .await
        .expect("Could not prepare test database");
}

/// A server around an existing coordinator. No periodic tally runs, so
/// tests decide when counting happens.
#[cfg(test)]
pub(crate) fn rocket_for_coordinator(coordinator: voting::Coordinator) -> Rocket<Build> {
    rocket::build()
        .attach(ConfigFairing)
        .attach(LoggerFairing)
        .manage(coordinator.db().clone())
        .manage(coordinator)
        .mount("/", api::routes())
}
