use log::{error, info, trace, warn};
use rocket::{
    fairing::{Fairing, Info, Kind},
    futures::FutureExt,
    tokio::sync::Mutex,
    Orbit, Rocket,
};

use crate::config::Config;
use crate::error::Result;
use crate::model::common::election::ElectionId;
use crate::scheduled_task::PeriodicTask;

use super::{coordinator::Coordinator, tally::tally_closed_elections};

/// Run one tally pass in its own unit of work.
pub async fn run_pass(coordinator: &Coordinator) -> Result<Vec<ElectionId>> {
    coordinator
        .execute(|unit| tally_closed_elections(unit).boxed())
        .await
}

/// Start tallying closed elections every `period`.
/// A failed pass is logged and retried at the next one.
pub fn spawn_tally_task(coordinator: Coordinator, period: std::time::Duration) -> PeriodicTask {
    PeriodicTask::new(period, move || {
        let coordinator = coordinator.clone();
        async move {
            match run_pass(&coordinator).await {
                Ok(counted) if counted.is_empty() => trace!("Tally pass found nothing to count"),
                Ok(counted) => info!("Tally pass counted elections {counted:?}"),
                Err(err) => error!("Tally pass failed, will retry: {err}"),
            }
        }
    })
}

/// A fairing that runs the periodic tally while the server is live.
#[derive(Default)]
pub struct TallySchedulerFairing {
    task: Mutex<Option<PeriodicTask>>,
}

#[rocket::async_trait]
impl Fairing for TallySchedulerFairing {
    fn info(&self) -> Info {
        Info {
            name: "Tally scheduler",
            kind: Kind::Liftoff | Kind::Shutdown,
        }
    }

    async fn on_liftoff(&self, rocket: &Rocket<Orbit>) {
        let (Some(coordinator), Some(config)) =
            (rocket.state::<Coordinator>(), rocket.state::<Config>())
        else {
            error!("Tally scheduler started without a coordinator or config");
            return;
        };
        let period = config.tally_interval();
        let task = spawn_tally_task(coordinator.clone(), period);
        // Count anything that closed while the server was down.
        task.trigger_now();
        *self.task.lock().await = Some(task);
        info!("Tallying closed elections every {}s", period.as_secs());
    }

    async fn on_shutdown(&self, _rocket: &Rocket<Orbit>) {
        let task = self.task.lock().await.take();
        match task {
            Some(task) => {
                task.cancel().await;
                info!("Tally scheduler stopped");
            }
            None => warn!("Tally scheduler was not running"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::Duration;
    use mongodb::bson::doc;

    use crate::model::{
        api::election::ElectionSpec, db::election::Election, mongodb::Coll,
    };
    use crate::voting::{registry::initialize, TestClock};

    #[backend_test]
    async fn triggered_pass_counts_closed_election(
        coordinator: Coordinator,
        clock: TestClock,
        elections: Coll<Election>,
    ) {
        let spec = ElectionSpec::example(clock.now());
        coordinator
            .execute(move |unit| initialize(unit, spec).boxed())
            .await
            .unwrap();

        let task = spawn_tally_task(coordinator.clone(), std::time::Duration::from_secs(3600));

        // Open elections are left alone.
        assert!(run_pass(&coordinator).await.unwrap().is_empty());

        clock.advance(Duration::days(1));
        task.trigger_now();
        let mut counted = false;
        for _ in 0..50 {
            rocket::tokio::time::sleep(std::time::Duration::from_millis(100)).await;
            let election = elections.find_one(doc! {}, None).await.unwrap().unwrap();
            if election.counted {
                counted = true;
                break;
            }
        }
        task.cancel().await;
        assert!(counted);

        // Later passes have nothing left to do.
        assert!(run_pass(&coordinator).await.unwrap().is_empty());
    }
}
