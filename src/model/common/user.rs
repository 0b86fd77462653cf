use mongodb::bson::{to_bson, Bson};
use serde::{Deserialize, Serialize};

/// Our user IDs are integers, assigned by the identity service.
pub type UserId = u32;

/// User roles, in increasing order of privilege.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Registered, but identity not yet checked by an admin.
    #[serde(rename = "none")]
    Unvalidated,
    /// Identity checked; may vote.
    Validated,
    /// May vote and administer the election.
    Admin,
}

impl Role {
    /// Is this role allowed to cast a ballot?
    pub fn may_vote(self) -> bool {
        self >= Role::Validated
    }
}

impl From<Role> for Bson {
    fn from(role: Role) -> Self {
        to_bson(&role).expect("Serialisation is infallible")
    }
}
