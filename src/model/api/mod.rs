//! API-compatible types.
//!
//! The types in this module are serialised in an API-friendly way, e.g.:
//!
//! - Datetimes are serialised as RFC 3339 strings.
//! - Candidate points are hidden until the election has been counted.

pub mod ballot;
pub mod election;
pub mod results;
