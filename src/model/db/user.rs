use serde::{Deserialize, Serialize};

use crate::model::common::user::{Role, UserId};

/// A user record.
///
/// Users are created and validated by the identity service; this crate only
/// reads the role and flips `has_voted`.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "_id")]
    pub id: UserId,
    pub role: Role,
    #[serde(default)]
    pub has_voted: bool,
}

/// Example data for tests.
#[cfg(test)]
mod examples {
    use super::*;

    impl User {
        pub fn example(id: UserId, role: Role) -> Self {
            Self {
                id,
                role,
                has_voted: false,
            }
        }
    }
}
