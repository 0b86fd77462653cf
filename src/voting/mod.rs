//! The vote-casting and tally core.
//!
//! Every operation here takes a [`UnitOfWork`] and must be run through
//! [`Coordinator::execute`], which makes it atomic and serialises it against
//! every other unit.

pub mod cast;
pub mod coordinator;
pub mod receipt;
pub mod registry;
pub mod scheduler;
pub mod tally;

pub use coordinator::{Clock, Coordinator, SystemClock, UnitOfWork};
#[cfg(test)]
pub use coordinator::TestClock;
