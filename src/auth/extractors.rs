use actix_web::dev::Payload;
use actix_web::{Error as ActixError, FromRequest, HttpMessage, HttpRequest};
use std::future::{ready, Ready};

use crate::error::AppError;
use crate::models::User;

/// The authenticated principal for the current request.
///
/// `AuthMiddleware` inserts this into request extensions after a successful
/// gate pass. Handlers receive it through `FromRequest`; the raw token is
/// kept alongside the user so logout can revoke exactly the session that made
/// the request.
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub user: User,
    pub token: String,
}

impl FromRequest for AuthSession {
    type Error = ActixError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        match req.extensions().get::<AuthSession>().cloned() {
            Some(session) => ready(Ok(session)),
            None => {
                // Only reachable if a handler is registered outside the
                // middleware's protection; rejecting is the safe default.
                ready(Err(AppError::Unauthorized.into()))
            }
        }
    }
}
