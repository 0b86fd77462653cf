use log::{debug, error};
use mongodb::error::Error as DbError;
use rocket::{
    http::{ContentType, Status},
    response::{self, Responder, Response},
    serde::json::serde_json,
    Request,
};
use serde::Serialize;
use std::io::Cursor;
use thiserror::Error;

use crate::model::common::{
    election::{CandidateId, ElectionId},
    user::UserId,
};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    // Configuration.
    #[error("Expected exactly one election, found {0}")]
    ElectionCount(u64),
    #[error("The election has already been initialized")]
    AlreadyInitialized,
    #[error("Counter `{0}` does not exist")]
    MissingCounter(String),

    // Timing.
    #[error("Voting has not started yet")]
    TooEarly,
    #[error("Voting has closed")]
    TooLate,
    #[error("Election {0} has not closed yet")]
    NotClosed(ElectionId),

    // Eligibility.
    #[error("No user with ID {0}")]
    UnknownVoter(UserId),
    #[error("User {0} has not been validated")]
    NotValidated(UserId),
    #[error("User {0} has already voted")]
    AlreadyVoted(UserId),

    // Ballot shape.
    #[error("Ballot must rank between {min} and {max} candidates, got {got}")]
    Cardinality { min: u32, max: u32, got: usize },
    #[error("Candidate {0} does not stand in this election")]
    UnknownCandidate(CandidateId),
    #[error("Candidate {0} is ranked more than once")]
    DuplicateCandidate(CandidateId),

    // Integrity.
    #[error("Receipt not found")]
    ReceiptNotFound,
    #[error("Receipt matches {0} ballots")]
    AmbiguousReceipt(u64),
    #[error("Ballot references missing candidate {0}")]
    DanglingCandidate(CandidateId),
    #[error("Generated receipt collides with an existing ballot")]
    ReceiptCollision,
    #[error("Election {0} could not be marked as counted")]
    CountedFlag(ElectionId),

    // Storage.
    #[error(transparent)]
    Db(#[from] DbError),
    #[error("Unit of work did not complete: {0}")]
    Unit(String),

    // Request.
    #[error("Invalid election: {0}")]
    InvalidElection(String),
    #[error("{1}")]
    Status(Status, String),
}

/// Failure categories, distinguishable by callers.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Configuration,
    Timing,
    Eligibility,
    BallotShape,
    Integrity,
    Storage,
    Request,
}

impl Error {
    /// Shorthand for a 404 with the given message.
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::Status(Status::NotFound, what.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ElectionCount(_) | Self::AlreadyInitialized | Self::MissingCounter(_) => {
                ErrorKind::Configuration
            }
            Self::TooEarly | Self::TooLate | Self::NotClosed(_) => ErrorKind::Timing,
            Self::UnknownVoter(_) | Self::NotValidated(_) | Self::AlreadyVoted(_) => {
                ErrorKind::Eligibility
            }
            Self::Cardinality { .. } | Self::UnknownCandidate(_) | Self::DuplicateCandidate(_) => {
                ErrorKind::BallotShape
            }
            Self::ReceiptNotFound
            | Self::AmbiguousReceipt(_)
            | Self::DanglingCandidate(_)
            | Self::ReceiptCollision
            | Self::CountedFlag(_) => ErrorKind::Integrity,
            Self::Db(_) | Self::Unit(_) => ErrorKind::Storage,
            Self::InvalidElection(_) | Self::Status(_, _) => ErrorKind::Request,
        }
    }

    pub fn status(&self) -> Status {
        match self {
            Self::ElectionCount(_) | Self::MissingCounter(_) => Status::ServiceUnavailable,
            Self::AlreadyInitialized => Status::Conflict,
            Self::TooEarly | Self::TooLate | Self::NotClosed(_) => Status::Forbidden,
            Self::UnknownVoter(_) => Status::NotFound,
            Self::NotValidated(_) => Status::Forbidden,
            Self::AlreadyVoted(_) => Status::Conflict,
            Self::Cardinality { .. } | Self::UnknownCandidate(_) | Self::DuplicateCandidate(_) => {
                Status::UnprocessableEntity
            }
            Self::ReceiptNotFound => Status::NotFound,
            Self::AmbiguousReceipt(_)
            | Self::DanglingCandidate(_)
            | Self::ReceiptCollision
            | Self::CountedFlag(_) => Status::InternalServerError,
            Self::Db(_) | Self::Unit(_) => Status::InternalServerError,
            Self::InvalidElection(_) => Status::UnprocessableEntity,
            Self::Status(status, _) => *status,
        }
    }
}

/// Error body sent to clients.
#[derive(Debug, Serialize)]
struct ErrorBody {
    kind: ErrorKind,
    message: String,
}

impl<'r, 'o: 'r> Responder<'r, 'o> for Error {
    fn respond_to(self, _: &'r Request<'_>) -> response::Result<'o> {
        let status = self.status();
        let kind = self.kind();
        let message = match kind {
            ErrorKind::Storage => {
                error!("{self}");
                "storage failure".to_string()
            }
            ErrorKind::Integrity => {
                error!("{self}");
                self.to_string()
            }
            _ => {
                debug!("{self}");
                self.to_string()
            }
        };
        let body = serde_json::to_string(&ErrorBody { kind, message })
            .map_err(|_| Status::InternalServerError)?;
        Response::build()
            .status(status)
            .header(ContentType::JSON)
            .sized_body(body.len(), Cursor::new(body))
            .ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn categories_are_distinguishable() {
        assert_eq!(Error::AlreadyVoted(1).kind(), ErrorKind::Eligibility);
        assert_eq!(
            Error::Cardinality {
                min: 2,
                max: 3,
                got: 4
            }
            .kind(),
            ErrorKind::BallotShape
        );
        assert_eq!(Error::TooLate.kind(), ErrorKind::Timing);
        assert_eq!(Error::ElectionCount(0).kind(), ErrorKind::Configuration);
        assert_eq!(Error::AmbiguousReceipt(2).kind(), ErrorKind::Integrity);
        assert_eq!(Error::Unit("panicked".into()).kind(), ErrorKind::Storage);
    }

    #[test]
    fn statuses() {
        assert_eq!(Error::AlreadyVoted(1).status(), Status::Conflict);
        assert_eq!(Error::TooEarly.status(), Status::Forbidden);
        assert_eq!(Error::NotValidated(1).status(), Status::Forbidden);
        assert_eq!(Error::UnknownCandidate(9).status(), Status::UnprocessableEntity);
        assert_eq!(Error::DuplicateCandidate(9).status(), Status::UnprocessableEntity);
        assert_eq!(Error::ReceiptNotFound.status(), Status::NotFound);
        assert_eq!(Error::ElectionCount(2).status(), Status::ServiceUnavailable);
        assert_eq!(
            Error::Status(Status::Unauthorized, "who?".into()).status(),
            Status::Unauthorized
        );
    }

    #[test]
    fn error_kinds_serialise_in_snake_case() {
        let json = serde_json::to_string(&ErrorKind::BallotShape).unwrap();
        assert_eq!(json, "\"ballot_shape\"");
    }
}
