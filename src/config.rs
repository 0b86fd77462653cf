use std::sync::Arc;
use std::time::Duration;

use log::{error, info};
use mongodb::{Client as MongoClient, Database};
use rocket::{
    fairing::{Fairing, Info, Kind},
    Build, Rocket,
};
use serde::Deserialize;

use crate::model::mongodb::{ensure_counters_exist, ensure_indexes_exist};
use crate::voting::{Coordinator, SystemClock};

/// Application configuration, derived from `Rocket.toml` and `ROCKET_*`
/// environment variables. This struct becomes managed state and can be
/// inspected by any endpoint.
#[derive(Debug, Deserialize)]
pub struct Config {
    // non-secrets
    tally_interval: u64,
}

impl Config {
    /// Time between periodic tally passes.
    /// Configured in seconds via `TALLY_INTERVAL`.
    pub fn tally_interval(&self) -> Duration {
        Duration::from_secs(self.tally_interval.max(1))
    }
}

/// A fairing that loads the application config and puts it in managed state.
/// This could easily be achieved using `AdHoc::config`, but is written out
/// explicitly for symmetry with the other fairings and control over error
/// messages.
pub struct ConfigFairing;

#[rocket::async_trait]
impl Fairing for ConfigFairing {
    fn info(&self) -> Info {
        Info {
            name: "Config",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        // Load the config.
        let config = match rocket.figment().extract::<Config>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load application config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };

        // Manage the state.
        rocket = rocket.manage(config);
        Ok(rocket)
    }
}

/// Configuration for the database.
#[derive(Deserialize)]
pub(crate) struct DbConfig {
    // secrets
    pub(crate) db_uri: String,
}

/// A fairing that loads the MongoDB config, connects to the database,
/// performs any setup necessary, and places the `Client`, the `Database`
/// and a `Coordinator` over them into managed state.
pub struct DatabaseFairing;

#[rocket::async_trait]
impl Fairing for DatabaseFairing {
    fn info(&self) -> Info {
        Info {
            name: "MongoDB",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        // Load the config.
        let config = match rocket.figment().extract::<DbConfig>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load database config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };
        info!("Loaded database config, connecting...");
        // Construct the connection.
        let client = match MongoClient::with_uri_str(config.db_uri).await {
            Ok(client) => client,
            Err(e) => {
                error!("Failed to connect to database: {e}");
                return Err(rocket);
            }
        };
        let db = client.database(&get_database_name());

        // Ensure the required indexes and ID counters exist.
        if let Err(e) = prepare_database(&db).await {
            error!("Failed to prepare database: {e}");
            return Err(rocket);
        }
        info!("...database connection online!");

        // Manage the state.
        let coordinator = Coordinator::new(client.clone(), db.clone(), Arc::new(SystemClock));
        rocket = rocket.manage(client).manage(db).manage(coordinator);
        Ok(rocket)
    }
}

/// Idempotent start-up setup: indexes and ID counters.
pub(crate) async fn prepare_database(db: &Database) -> Result<(), mongodb::error::Error> {
    ensure_indexes_exist(db).await?;
    ensure_counters_exist(db).await
}

/// Get the name of the database to use.
fn get_database_name() -> String {
    "ballot_box".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    use rocket::figment::{providers::Serialized, Figment};

    #[test]
    fn tally_interval_in_seconds() {
        let figment = Figment::from(Serialized::default("tally_interval", 60));
        let config: Config = figment.extract().unwrap();
        assert_eq!(config.tally_interval(), Duration::from_secs(60));
    }

    #[test]
    fn zero_interval_is_clamped() {
        let figment = Figment::from(Serialized::default("tally_interval", 0));
        let config: Config = figment.extract().unwrap();
        assert_eq!(config.tally_interval(), Duration::from_secs(1));
    }

    #[test]
    fn interval_is_required() {
        let figment = Figment::from(Serialized::default("db_uri", "mongodb://localhost"));
        assert!(figment.extract::<Config>().is_err());
    }
}
