use rocket::{
    http::Status,
    request::{FromRequest, Outcome, Request},
};

use crate::error::Error;
use crate::model::{
    common::user::{Role, UserId},
    db::user::User,
    mongodb::{u32_id_filter, Coll},
};

/// Private cookie holding the caller's user ID, set by the authentication layer.
pub const USER_ID_COOKIE: &str = "user_id";

/// The identity behind a request, resolved from the [`USER_ID_COOKIE`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub id: UserId,
    pub role: Role,
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for Caller {
    type Error = Error;

    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let Some(cookie) = req.cookies().get_private(USER_ID_COOKIE) else {
            return Outcome::Failure((
                Status::Unauthorized,
                Error::Status(Status::Unauthorized, "Not signed in".to_string()),
            ));
        };
        let Ok(id) = cookie.value().parse::<UserId>() else {
            return Outcome::Failure((
                Status::BadRequest,
                Error::Status(Status::BadRequest, "Malformed user cookie".to_string()),
            ));
        };
        let Some(users) = req.guard::<Coll<User>>().await.succeeded() else {
            return Outcome::Failure((
                Status::InternalServerError,
                Error::Status(Status::InternalServerError, "No database".to_string()),
            ));
        };
        match users.find_one(u32_id_filter(id), None).await {
            Ok(Some(user)) => Outcome::Success(Caller {
                id,
                role: user.role,
            }),
            Ok(None) => Outcome::Failure((Status::Unauthorized, Error::UnknownVoter(id))),
            Err(err) => Outcome::Failure((Status::InternalServerError, err.into())),
        }
    }
}

/// A caller with the admin role. Forwards for anyone else.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminCaller(pub Caller);

#[rocket::async_trait]
impl<'r> FromRequest<'r> for AdminCaller {
    type Error = Error;

    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        match req.guard::<Caller>().await {
            Outcome::Success(caller) if caller.role == Role::Admin => {
                Outcome::Success(AdminCaller(caller))
            }
            Outcome::Failure((status, err)) if status == Status::InternalServerError => {
                Outcome::Failure((Status::InternalServerError, err))
            }
            _ => Outcome::Forward(()),
        }
    }
}
