mod bson;
mod collection;
mod counter;
mod errors;

pub use bson::{bson_datetime, u32_id_filter};
pub use collection::{ensure_indexes_exist, Coll, MongoCollection};
pub use counter::{
    ensure_counters_exist, Counter, BALLOT_ID_COUNTER_ID, CANDIDATE_ID_COUNTER_ID,
    ELECTION_ID_COUNTER_ID,
};
pub use errors::is_duplicate_key_error;
