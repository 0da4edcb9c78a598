use crate::{
    auth::{AuthResponse, AuthSession, LoginRequest, TokenCodec},
    error::AppError,
    models::{NewUser, User, UserUpdate},
};
use actix_web::{delete, get, patch, post, web, HttpResponse, Responder};
use sqlx::PgPool;

/// Register a new user.
///
/// Validates the payload, persists the user, and signs them in: the response
/// carries the public user view together with a first session token.
///
/// ## Responses:
/// - `201 Created`: `{ user, token }`.
/// - `400 Bad Request`: validation failure, itemized per field.
/// - `409 Conflict`: the email is already registered.
#[post("")]
pub async fn register(
    pool: web::Data<PgPool>,
    codec: web::Data<TokenCodec>,
    input: web::Json<NewUser>,
) -> Result<impl Responder, AppError> {
    let mut user = User::create(pool.get_ref(), input.into_inner()).await?;
    let token = user.generate_auth_token(pool.get_ref(), codec.get_ref()).await?;

    Ok(HttpResponse::Created().json(AuthResponse {
        user: user.to_public(),
        token,
    }))
}

/// Login with email and password.
///
/// On success a new session token is issued and appended to the user's live
/// token list, so each signed-in device holds its own revocable session.
///
/// ## Responses:
/// - `200 OK`: `{ user, token }`.
/// - `400 Bad Request`: `{"error": "Unable to login."}`, the same body
///   whether the email is unknown or the password is wrong.
#[post("/login")]
pub async fn login(
    pool: web::Data<PgPool>,
    codec: web::Data<TokenCodec>,
    input: web::Json<LoginRequest>,
) -> Result<impl Responder, AppError> {
    let mut user =
        User::find_by_credentials(pool.get_ref(), &input.email, &input.password).await?;
    let token = user.generate_auth_token(pool.get_ref(), codec.get_ref()).await?;

    Ok(HttpResponse::Ok().json(AuthResponse {
        user: user.to_public(),
        token,
    }))
}

/// Logout the current session. Removes exactly the token that authenticated
/// this request; sessions on other devices stay valid.
#[post("/logout")]
pub async fn logout(
    pool: web::Data<PgPool>,
    session: AuthSession,
) -> Result<impl Responder, AppError> {
    let mut user = session.user;
    user.logout(pool.get_ref(), &session.token).await?;

    Ok(HttpResponse::Ok().finish())
}

/// Logout everywhere. Clears the user's entire token list; every previously
/// issued token is rejected from the next request on, expired or not.
#[post("/logoutAll")]
pub async fn logout_all(
    pool: web::Data<PgPool>,
    session: AuthSession,
) -> Result<impl Responder, AppError> {
    let mut user = session.user;
    user.logout_all(pool.get_ref()).await?;

    Ok(HttpResponse::Ok().finish())
}

/// The authenticated user's own profile.
#[get("/me")]
pub async fn me(session: AuthSession) -> Result<impl Responder, AppError> {
    Ok(HttpResponse::Ok().json(session.user.to_public()))
}

/// Update the authenticated user's profile.
///
/// Accepts `name`, `email`, `password`, and `age` under the same rules as
/// registration; any other field is rejected. The password hash is
/// recomputed only when the patch carries a password.
#[patch("/me")]
pub async fn update_me(
    pool: web::Data<PgPool>,
    session: AuthSession,
    update: web::Json<UserUpdate>,
) -> Result<impl Responder, AppError> {
    let mut user = session.user;
    user.apply_update(pool.get_ref(), update.into_inner()).await?;

    Ok(HttpResponse::Ok().json(user.to_public()))
}

/// Delete the authenticated user's account and every task they authored.
#[delete("/me")]
pub async fn delete_me(
    pool: web::Data<PgPool>,
    session: AuthSession,
) -> Result<impl Responder, AppError> {
    let public = session.user.delete_cascade(pool.get_ref()).await?;

    Ok(HttpResponse::Ok().json(public))
}
