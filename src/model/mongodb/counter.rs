use mongodb::{
    bson::doc,
    error::Error as DbError,
    options::{FindOneAndUpdateOptions, ReturnDocument, UpdateOptions},
    ClientSession, Database,
};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::mongodb::Coll;

/// Counter backing election IDs.
pub const ELECTION_ID_COUNTER_ID: &str = "election_id";
/// Counter backing candidate IDs.
pub const CANDIDATE_ID_COUNTER_ID: &str = "candidate_id";
/// Counter backing ballot IDs.
pub const BALLOT_ID_COUNTER_ID: &str = "ballot_id";

const ALL_COUNTERS: [&str; 3] = [
    ELECTION_ID_COUNTER_ID,
    CANDIDATE_ID_COUNTER_ID,
    BALLOT_ID_COUNTER_ID,
];

/// A counter object used to implement auto-increment fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Counter {
    #[serde(rename = "_id")]
    pub id: String,
    pub next: u32,
}

impl Counter {
    /// Create a new `Counter` with the given ID, starting at the given value.
    #[cfg(test)]
    pub(crate) fn new(id: impl Into<String>, start: u32) -> Self {
        Self {
            id: id.into(),
            next: start,
        }
    }

    /// Atomically retrieve the next value of the counter with the given ID,
    /// as part of the session's transaction.
    pub async fn next(
        counters: &Coll<Counter>,
        id: &str,
        session: &mut ClientSession,
    ) -> Result<u32> {
        let update = doc! {
            "$inc": { "next": 1 }
        };
        let options: FindOneAndUpdateOptions = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::Before)
            .build();
        let counter = counters
            .find_one_and_update_with_session(doc! {"_id": id}, update, options, session)
            .await?
            .ok_or_else(|| Error::MissingCounter(id.to_string()))?;
        Ok(counter.next)
    }
}

/// Ensure every ID counter exists, starting new ones at 1.
///
/// This operation is idempotent: existing counters are left untouched.
pub async fn ensure_counters_exist(db: &Database) -> std::result::Result<(), DbError> {
    let counters = Coll::<Counter>::from_db(db);
    let upsert = UpdateOptions::builder().upsert(true).build();
    for id in ALL_COUNTERS {
        let update = doc! {
            "$setOnInsert": { "next": 1 }
        };
        counters
            .update_one(doc! {"_id": id}, update, upsert.clone())
            .await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use mongodb::Database;

    use crate::voting::Coordinator;

    #[backend_test]
    async fn counter_increment(coordinator: Coordinator, counters: Coll<Counter>) {
        const START: u32 = 5;

        // Create a counter and insert it.
        counters
            .insert_one(Counter::new("test_counter", START), None)
            .await
            .unwrap();

        // Get the next value.
        let mut unit = coordinator.begin().await.unwrap();
        let next = Counter::next(&counters, "test_counter", unit.session()).await;
        let next = unit.finish(next).await.unwrap();
        assert_eq!(next, START);

        // Check the counter was incremented.
        let counter = counters
            .find_one(doc! {"_id": "test_counter"}, None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(counter.next, START + 1);

        // Missing counters are reported rather than created.
        let mut unit = coordinator.begin().await.unwrap();
        let missing = Counter::next(&counters, "no_such_counter", unit.session()).await;
        let missing = unit.finish(missing).await;
        assert!(matches!(missing, Err(Error::MissingCounter(_))));
    }

    #[backend_test]
    async fn counters_ensured_idempotently(db: Database, counters: Coll<Counter>) {
        // The test harness already ran this once; bump a counter and rerun.
        counters
            .update_one(
                doc! {"_id": BALLOT_ID_COUNTER_ID},
                doc! {"$set": {"next": 42}},
                None,
            )
            .await
            .unwrap();
        ensure_counters_exist(&db).await.unwrap();

        for id in ALL_COUNTERS {
            let counter = counters.find_one(doc! {"_id": id}, None).await.unwrap().unwrap();
            let expected = if id == BALLOT_ID_COUNTER_ID { 42 } else { 1 };
            assert_eq!(counter.next, expected);
        }
    }
}
