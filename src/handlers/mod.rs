use std::future::{ready, Ready};

use actix_web::dev::Payload;
use actix_web::{FromRequest, HttpRequest};
use uuid::Uuid;

use crate::errors::AppError;

pub mod orders;

/// Identity of the acting user, taken from the `X-User-Id` header set by
/// the authenticating gateway. Authentication itself is not this service's
/// job; a missing or malformed header is rejected with 401.
#[derive(Debug, Clone, Copy)]
pub struct UserId(pub Uuid);

impl FromRequest for UserId {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(
            req.headers()
                .get("X-User-Id")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| Uuid::parse_str(s).ok())
                .map(UserId)
                .ok_or(AppError::Unauthorized),
        )
    }
}
