use std::ops::Deref;

use log::debug;
use mongodb::{
    bson::{doc, Document},
    error::Error as DbError,
    options::{FindOptions, IndexOptions},
    ClientSession, Collection, Database, IndexModel,
};
use rocket::{
    request::{self, FromRequest, Request},
    State,
};
use serde::de::DeserializeOwned;

use crate::model::db::{ballot::Ballot, candidate::Candidate, election::Election, user::User};

use super::counter::Counter;

/// A type that can be directly inserted/read to/from the database.
pub trait MongoCollection {
    /// The name of the collection.
    const NAME: &'static str;
}

/// A database collection of the given type.
pub struct Coll<T>(Collection<T>);

impl<T> Coll<T>
where
    T: MongoCollection,
{
    /// Get a handle on this collection in the given database.
    pub fn from_db(db: &Database) -> Self {
        Self(db.collection(T::NAME))
    }
}

impl<T> Coll<T>
where
    T: DeserializeOwned + Unpin + Send + Sync,
{
    /// Read every document matching `filter` as part of the session's transaction.
    pub async fn find_all_with_session(
        &self,
        filter: Document,
        options: impl Into<Option<FindOptions>>,
        session: &mut ClientSession,
    ) -> Result<Vec<T>, DbError> {
        let mut cursor = self.find_with_session(filter, options, session).await?;
        let mut found = Vec::new();
        while let Some(item) = cursor.next(session).await {
            found.push(item?);
        }
        Ok(found)
    }
}

// `Derive(Clone)` would only derive if `T: Clone`, but we don't need that bound.
impl<T> Clone for Coll<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T> Deref for Coll<T> {
    type Target = Collection<T>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[rocket::async_trait]
impl<'r, T> FromRequest<'r> for Coll<T>
where
    T: MongoCollection,
{
    type Error = ();

    /// Get the database connection from the managed state and wrap it in a collection.
    ///
    /// Panics iff the [`Database`] is not managed by [`rocket::Rocket`].
    async fn from_request(req: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        let db = req.guard::<&State<Database>>().await.unwrap();
        request::Outcome::Success(Coll::from_db(db))
    }
}

// User collection, owned by the identity service.
const USERS: &str = "users";
impl MongoCollection for User {
    const NAME: &'static str = USERS;
}

// Election collection
const ELECTIONS: &str = "elections";
impl MongoCollection for Election {
    const NAME: &'static str = ELECTIONS;
}

// Candidate collection
const CANDIDATES: &str = "candidates";
impl MongoCollection for Candidate {
    const NAME: &'static str = CANDIDATES;
}

// Ballot collection
const BALLOTS: &str = "ballots";
impl MongoCollection for Ballot {
    const NAME: &'static str = BALLOTS;
}

// Counter collection
const COUNTERS: &str = "counters";
impl MongoCollection for Counter {
    const NAME: &'static str = COUNTERS;
}

/// Ensure that all the required indexes exist on the given database.
///
/// This operation is idempotent.
pub async fn ensure_indexes_exist(db: &Database) -> Result<(), DbError> {
    debug!("Ensuring collection indexes exist");

    let unique = IndexOptions::builder().unique(true).build();

    // Ballot collection: receipts must resolve to exactly one ballot.
    let receipt_index = IndexModel::builder()
        .keys(doc! {"receipt_hash": 1})
        .options(unique)
        .build();
    let election_index = IndexModel::builder()
        .keys(doc! {"election_id": 1})
        .build();
    let ballots = Coll::<Ballot>::from_db(db);
    ballots.create_index(receipt_index, None).await?;
    ballots.create_index(election_index.clone(), None).await?;

    // Candidate collection.
    Coll::<Candidate>::from_db(db)
        .create_index(election_index, None)
        .await?;

    Ok(())
}
