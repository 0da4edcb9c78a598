use std::rc::Rc;

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    http::Method,
    web, Error, HttpMessage,
};
use futures::future::{ready, LocalBoxFuture, Ready};
use sqlx::PgPool;

use crate::auth::extractors::AuthSession;
use crate::auth::token::TokenCodec;
use crate::error::AppError;
use crate::models::User;

/// The authentication gate. Every request to a protected route passes
/// through here: bearer extraction, token verification, user lookup, and the
/// live-token check that makes logout effective before a token expires.
///
/// All four rejection causes (missing/malformed header, bad token, unknown
/// user, revoked token) are observably identical to the caller: one 401 with
/// a fixed body. The cause is only visible in the server debug log.
pub struct AuthMiddleware;

impl<S, B> Transform<S, ServiceRequest> for AuthMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Transform = AuthMiddlewareService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(AuthMiddlewareService {
            service: Rc::new(service),
        }))
    }
}

pub struct AuthMiddlewareService<S> {
    // The user lookup awaits the database, so the inner service is held in an
    // Rc and cloned into the boxed future.
    service: Rc<S>,
}

/// Routes reachable without a session: registration, login, liveness.
fn is_public(method: &Method, path: &str) -> bool {
    path == "/health"
        || (*method == Method::POST && (path == "/users" || path == "/users/login"))
}

async fn authenticate(req: &ServiceRequest) -> Result<AuthSession, AppError> {
    let token = req
        .headers()
        .get("Authorization")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .ok_or(AppError::Unauthorized)?;

    let codec = req
        .app_data::<web::Data<TokenCodec>>()
        .ok_or_else(|| AppError::Internal("token codec not configured".into()))?;
    let pool = req
        .app_data::<web::Data<PgPool>>()
        .ok_or_else(|| AppError::Internal("database pool not configured".into()))?;

    let claims = codec.verify(token).map_err(|e| {
        log::debug!("token rejected: {}", e);
        AppError::Unauthorized
    })?;

    let user = User::find_by_id(pool.get_ref(), claims.sub)
        .await?
        .ok_or(AppError::Unauthorized)?;

    // The user's token list is the source of truth for live sessions; a
    // cryptographically valid token that has been logged out is rejected.
    if !user.tokens.iter().any(|entry| entry.token == token) {
        log::debug!("token rejected: revoked for user {}", user.id);
        return Err(AppError::Unauthorized);
    }

    Ok(AuthSession {
        user,
        token: token.to_string(),
    })
}

impl<S, B> Service<ServiceRequest> for AuthMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);

        Box::pin(async move {
            if is_public(req.method(), req.path()) {
                return service.call(req).await;
            }

            match authenticate(&req).await {
                Ok(session) => {
                    req.extensions_mut().insert(session);
                    service.call(req).await
                }
                Err(app_err) => Err(app_err.into()),
            }
        })
    }
}
