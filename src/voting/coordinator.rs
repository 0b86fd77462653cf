use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::{debug, error, trace, warn};
use mongodb::{Client, ClientSession, Database};
use rocket::{
    futures::future::BoxFuture,
    tokio::{
        self,
        sync::{Mutex, OwnedMutexGuard},
    },
};

use crate::error::{Error, Result};
use crate::model::mongodb::{Coll, MongoCollection};

/// Source of the current time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// The real wall clock.
#[derive(Debug, Default, Copy, Clone)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Serialises every unit of work against the database.
///
/// Exactly one unit holds the write lock at a time, from before its
/// transaction starts until after it commits or aborts. Clones share the lock.
#[derive(Clone)]
pub struct Coordinator {
    client: Client,
    db: Database,
    write_lock: Arc<Mutex<()>>,
    clock: Arc<dyn Clock>,
}

impl Coordinator {
    pub fn new(client: Client, db: Database, clock: Arc<dyn Clock>) -> Self {
        Self {
            client,
            db,
            write_lock: Default::default(),
            clock,
        }
    }

    #[cfg(test)]
    pub(crate) fn db(&self) -> &Database {
        &self.db
    }

    /// Wait for the write lock, then open a session and start a transaction.
    ///
    /// Prefer [`Self::execute`], which also guarantees the unit finishes.
    pub async fn begin(&self) -> Result<UnitOfWork> {
        let guard = self.write_lock.clone().lock_owned().await;
        trace!("Write lock acquired");
        let mut session = self.client.start_session(None).await?;
        session.start_transaction(None).await?;
        Ok(UnitOfWork {
            session,
            db: self.db.clone(),
            now: self.clock.now(),
            _guard: guard,
        })
    }

    /// Run `op` as one atomic unit of work: committed if it returns `Ok`,
    /// rolled back otherwise.
    ///
    /// The unit runs on its own task, so it completes even if the caller
    /// stops waiting for it.
    pub async fn execute<T, F>(&self, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: for<'u> FnOnce(&'u mut UnitOfWork) -> BoxFuture<'u, Result<T>> + Send + 'static,
    {
        let coordinator = self.clone();
        let unit = tokio::spawn(async move {
            let mut unit = coordinator.begin().await?;
            let result = op(&mut unit).await;
            unit.finish(result).await
        });
        match unit.await {
            Ok(result) => result,
            Err(err) => {
                error!("Unit of work did not complete: {err}");
                Err(Error::Unit(err.to_string()))
            }
        }
    }
}

/// An open transaction holding the write lock.
pub struct UnitOfWork {
    session: ClientSession,
    db: Database,
    now: DateTime<Utc>,
    _guard: OwnedMutexGuard<()>,
}

impl UnitOfWork {
    /// The session every read and write in this unit must go through.
    pub fn session(&mut self) -> &mut ClientSession {
        &mut self.session
    }

    pub fn coll<T: MongoCollection>(&self) -> Coll<T> {
        Coll::from_db(&self.db)
    }

    /// The time at which this unit acquired the lock.
    /// Fixed for the lifetime of the unit.
    pub fn now(&self) -> DateTime<Utc> {
        self.now
    }

    /// Commit if `result` is `Ok`, otherwise roll back; then release the lock.
    ///
    /// A failed commit is reported as an error, and nothing from the unit persists.
    pub async fn finish<T>(mut self, result: Result<T>) -> Result<T> {
        match result {
            Ok(value) => match self.session.commit_transaction().await {
                Ok(()) => {
                    trace!("Committed unit of work");
                    Ok(value)
                }
                Err(err) => {
                    // Dropping the session aborts whatever is left of the transaction.
                    error!("Commit failed, unit rolled back: {err}");
                    Err(err.into())
                }
            },
            Err(err) => {
                debug!("Rolling back unit of work: {err}");
                if let Err(abort_err) = self.session.abort_transaction().await {
                    warn!("Failed to abort transaction: {abort_err}");
                }
                Err(err)
            }
        }
    }
}

#[cfg(test)]
pub use test_clock::TestClock;

#[cfg(test)]
mod test_clock {
    use super::*;

    use chrono::{Duration, TimeZone};
    use std::sync::Mutex as SyncMutex;

    /// A manually driven clock. Clones share the same time.
    #[derive(Debug, Clone)]
    pub struct TestClock(Arc<SyncMutex<DateTime<Utc>>>);

    impl TestClock {
        pub fn new(now: DateTime<Utc>) -> Self {
            Self(Arc::new(SyncMutex::new(now)))
        }

        pub fn now(&self) -> DateTime<Utc> {
            *self.0.lock().unwrap()
        }

        pub fn set(&self, now: DateTime<Utc>) {
            *self.0.lock().unwrap() = now;
        }

        pub fn advance(&self, by: Duration) {
            *self.0.lock().unwrap() += by;
        }
    }

    impl Default for TestClock {
        /// Starts at the current time, rounded down to the second.
        fn default() -> Self {
            Self::new(Utc.timestamp_opt(Utc::now().timestamp(), 0).unwrap())
        }
    }

    impl Clock for TestClock {
        fn now(&self) -> DateTime<Utc> {
            TestClock::now(self)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::Duration;
    use mongodb::bson::doc;
    use rocket::futures::FutureExt;

    use crate::model::{common::user::Role, db::user::User};

    #[test]
    fn test_clock_is_shared_between_clones() {
        let clock = TestClock::default();
        let start = clock.now();
        let other = clock.clone();
        other.advance(Duration::minutes(5));
        assert_eq!(clock.now(), start + Duration::minutes(5));
        clock.set(start);
        assert_eq!(other.now(), start);
    }

    async fn insert_user(unit: &mut UnitOfWork, id: u32) -> Result<()> {
        unit.coll::<User>()
            .insert_one_with_session(User::example(id, Role::Validated), None, unit.session())
            .await?;
        Ok(())
    }

    async fn insert_user_then_fail(unit: &mut UnitOfWork, id: u32) -> Result<()> {
        insert_user(unit, id).await?;
        Err(Error::TooLate)
    }

    #[backend_test]
    async fn commits_on_success(coordinator: Coordinator, users: Coll<User>) {
        coordinator
            .execute(|unit| insert_user(unit, 1).boxed())
            .await
            .unwrap();

        assert!(users.find_one(doc! {"_id": 1}, None).await.unwrap().is_some());
    }

    #[backend_test]
    async fn rolls_back_on_error(coordinator: Coordinator, users: Coll<User>) {
        let result = coordinator
            .execute(|unit| insert_user_then_fail(unit, 1).boxed())
            .await;
        assert!(matches!(result, Err(Error::TooLate)));

        // Nothing from the failed unit is visible.
        assert!(users.find_one(doc! {"_id": 1}, None).await.unwrap().is_none());
    }

    async fn insert_user_then_stall(unit: &mut UnitOfWork, id: u32) -> Result<()> {
        insert_user(unit, id).await?;
        rocket::tokio::time::sleep(std::time::Duration::from_millis(300)).await;
        Ok(())
    }

    #[backend_test]
    async fn units_finish_when_caller_gives_up(coordinator: Coordinator, users: Coll<User>) {
        // Stop waiting long before the unit is done.
        let abandoned = rocket::tokio::time::timeout(
            std::time::Duration::from_millis(50),
            coordinator.execute(|unit| insert_user_then_stall(unit, 1).boxed()),
        )
        .await;
        assert!(abandoned.is_err());

        // The lock is released once the unit finishes on its own.
        let next = rocket::tokio::time::timeout(
            std::time::Duration::from_secs(5),
            coordinator.begin(),
        )
        .await
        .expect("write lock never released")
        .unwrap();
        next.finish(Ok(())).await.unwrap();

        // And its work was committed.
        assert!(users.find_one(doc! {"_id": 1}, None).await.unwrap().is_some());
    }

    #[backend_test]
    async fn units_see_the_clock_when_they_start(coordinator: Coordinator, clock: TestClock) {
        let expected = clock.now() + Duration::days(3);
        clock.set(expected);
        let seen = coordinator
            .execute(|unit| {
                let now = unit.now();
                async move { Ok::<_, Error>(now) }.boxed()
            })
            .await
            .unwrap();
        assert_eq!(seen, expected);
    }

    #[backend_test]
    async fn units_are_serialised(coordinator: Coordinator) {
        // Holding one unit open blocks the next from starting.
        let unit = coordinator.begin().await.unwrap();
        let waiting = coordinator.begin();
        rocket::tokio::pin!(waiting);
        let blocked = rocket::tokio::time::timeout(
            std::time::Duration::from_millis(100),
            &mut waiting,
        )
        .await;
        assert!(blocked.is_err());

        unit.finish(Ok(())).await.unwrap();
        let next = waiting.await.unwrap();
        next.finish(Ok(())).await.unwrap();
    }
}
