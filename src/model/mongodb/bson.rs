use chrono::{DateTime, Utc};
use mongodb::bson::{doc, DateTime as BsonDateTime, Document};

/// Filter matching the document with the given integer `_id`.
pub fn u32_id_filter(id: u32) -> Document {
    doc! {
        "_id": id,
    }
}

/// Convert a chrono timestamp for use inside query documents.
pub fn bson_datetime(datetime: DateTime<Utc>) -> BsonDateTime {
    BsonDateTime::from_chrono(datetime)
}
