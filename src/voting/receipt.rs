use std::fmt::{Display, Formatter};

use data_encoding::HEXLOWER;
use mongodb::bson::doc;
use rand::{rngs::OsRng, RngCore};
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};
use crate::model::{
    api::election::CandidateView,
    common::election::CandidateId,
    db::{ballot::Ballot, candidate::Candidate},
};

use super::{coordinator::UnitOfWork, registry::election_by_id};

/// Number of random bytes in a receipt token.
const TOKEN_BYTES: usize = 32;

/// An opaque, unguessable receipt token.
///
/// Only its hash is ever stored, so the token itself never touches the database.
#[derive(Clone, PartialEq, Eq)]
pub struct ReceiptToken([u8; TOKEN_BYTES]);

impl ReceiptToken {
    /// Generate a fresh token from the operating system's CSPRNG.
    pub fn generate() -> Self {
        let mut bytes = [0; TOKEN_BYTES];
        OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Parse a token from its hex form. Case-insensitive.
    pub fn parse(token: &str) -> Option<Self> {
        if token.len() != 2 * TOKEN_BYTES {
            return None;
        }
        let bytes = HEXLOWER
            .decode(token.to_ascii_lowercase().as_bytes())
            .ok()?;
        bytes.try_into().ok().map(Self)
    }

    /// The value stored against the ballot: hex-encoded SHA-256 of the token bytes.
    pub fn hash(&self) -> String {
        HEXLOWER.encode(&Sha256::digest(self.0))
    }
}

impl Display for ReceiptToken {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", HEXLOWER.encode(&self.0))
    }
}

// Never print a live token by accident.
impl std::fmt::Debug for ReceiptToken {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str("ReceiptToken(..)")
    }
}

/// Resolve a receipt to the ranked candidates on its ballot, in ranked order.
/// Points are included once the election has been counted.
pub async fn verify_receipt(unit: &mut UnitOfWork, token: &str) -> Result<Vec<CandidateView>> {
    let token = ReceiptToken::parse(token).ok_or(Error::ReceiptNotFound)?;
    let filter = doc! {
        "receipt_hash": token.hash(),
    };

    // Receipts are unique by construction, so more than one match is corruption.
    let mut ballots = unit
        .coll::<Ballot>()
        .find_all_with_session(filter, None, unit.session())
        .await?;
    let ballot = match ballots.len() {
        0 => return Err(Error::ReceiptNotFound),
        1 => ballots.remove(0),
        n => return Err(Error::AmbiguousReceipt(n as u64)),
    };

    let filter = doc! {
        "_id": { "$in": ballot.candidates.clone() },
        "election_id": ballot.election_id,
    };
    let candidates = unit
        .coll::<Candidate>()
        .find_all_with_session(filter, None, unit.session())
        .await?;
    let counted = election_by_id(unit, ballot.election_id).await?.counted;

    in_ballot_order(&ballot.candidates, candidates, counted)
}

/// Arrange `candidates` to follow `ranking`, which the store does not preserve.
fn in_ballot_order(
    ranking: &[CandidateId],
    mut candidates: Vec<Candidate>,
    show_points: bool,
) -> Result<Vec<CandidateView>> {
    ranking
        .iter()
        .map(|&id| {
            let position = candidates
                .iter()
                .position(|c| c.id == id)
                .ok_or(Error::DanglingCandidate(id))?;
            Ok(CandidateView::new(candidates.swap_remove(position), show_points))
        })
        .collect()
}
