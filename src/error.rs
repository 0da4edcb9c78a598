//!
//! # Custom Error Handling
//!
//! This module defines the custom error type `AppError` used throughout the application.
//! It centralizes error management, providing a consistent way to handle and represent
//! various error conditions that can occur, from database issues to validation failures.
//!
//! `AppError` implements `actix_web::error::ResponseError` to seamlessly convert
//! application errors into appropriate HTTP responses with JSON bodies. Two failure
//! surfaces carry deliberately fixed messages: every rejection of the authentication
//! gate answers 401 `{"error": "Authentication failed"}` and every login failure
//! answers 400 `{"error": "Unable to login."}`, so a caller cannot tell which step
//! failed. Persistence faults are reported as a generic 500; their detail goes to the
//! server log only.

use actix_web::http::StatusCode;
use actix_web::{error::JsonPayloadError, error::ResponseError, HttpRequest, HttpResponse};
use serde_json::json;
use std::fmt;
use validator::ValidationErrors;

/// Represents all possible errors that can occur within the application.
#[derive(Debug)]
pub enum AppError {
    /// Failed input validation (HTTP 400). Carries the per-field error map.
    Validation(ValidationErrors),
    /// Credential check failed during login (HTTP 400). The message is uniform
    /// whether the email is unknown or the password is wrong.
    LoginFailed,
    /// The authentication gate rejected the request (HTTP 401). All rejection
    /// causes produce this one variant.
    Unauthorized,
    /// A malformed or invalid request outside field validation (HTTP 400).
    BadRequest(String),
    /// A requested resource is absent or not owned by the requester (HTTP 404).
    NotFound(String),
    /// A unique field collided with an existing record, e.g. email (HTTP 409).
    Conflict(String),
    /// An error originating from database operations (HTTP 500).
    Database(String),
    /// An unexpected server-side error (HTTP 500).
    Internal(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            AppError::Validation(errors) => write!(f, "Validation failed: {}", errors),
            AppError::LoginFailed => write!(f, "Unable to login."),
            AppError::Unauthorized => write!(f, "Authentication failed"),
            AppError::BadRequest(msg) => write!(f, "Bad Request: {}", msg),
            AppError::NotFound(msg) => write!(f, "Not Found: {}", msg),
            AppError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            AppError::Database(msg) => write!(f, "Database Error: {}", msg),
            AppError::Internal(msg) => write!(f, "Internal Server Error: {}", msg),
        }
    }
}

/// Converts `AppError` variants into `HttpResponse` objects.
impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::LoginFailed => StatusCode::BAD_REQUEST,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        match self {
            AppError::Validation(errors) => HttpResponse::BadRequest().json(json!({
                "error": "Validation failed",
                "fields": errors
            })),
            AppError::LoginFailed => HttpResponse::BadRequest().json(json!({
                "error": "Unable to login."
            })),
            AppError::Unauthorized => HttpResponse::Unauthorized().json(json!({
                "error": "Authentication failed"
            })),
            AppError::BadRequest(msg) => HttpResponse::BadRequest().json(json!({
                "error": msg
            })),
            AppError::NotFound(msg) => HttpResponse::NotFound().json(json!({
                "error": msg
            })),
            AppError::Conflict(msg) => HttpResponse::Conflict().json(json!({
                "error": msg
            })),
            // Store faults are not leaked to the client; the detail is logged here.
            AppError::Database(msg) | AppError::Internal(msg) => {
                log::error!("internal error: {}", msg);
                HttpResponse::InternalServerError().json(json!({
                    "error": "Internal server error"
                }))
            }
        }
    }
}

/// Converts `sqlx::Error` into `AppError`.
///
/// `RowNotFound` maps to `NotFound`, a unique-constraint violation maps to
/// `Conflict`, and every other database error becomes `Database`.
impl From<sqlx::Error> for AppError {
    fn from(error: sqlx::Error) -> AppError {
        match &error {
            sqlx::Error::RowNotFound => AppError::NotFound("Record not found".into()),
            sqlx::Error::Database(db_error) if db_error.is_unique_violation() => {
                AppError::Conflict("Email already in use".into())
            }
            _ => AppError::Database(error.to_string()),
        }
    }
}

/// Converts `validator::ValidationErrors` into `AppError::Validation`,
/// preserving the per-field breakdown for the response body.
impl From<ValidationErrors> for AppError {
    fn from(errors: ValidationErrors) -> AppError {
        AppError::Validation(errors)
    }
}

/// Converts `bcrypt::BcryptError` into `AppError::Internal`.
impl From<bcrypt::BcryptError> for AppError {
    fn from(error: bcrypt::BcryptError) -> AppError {
        AppError::Internal(error.to_string())
    }
}

/// Converts a `TokenError` escaping token *issuance* into `AppError::Internal`.
/// Verification failures never take this path: the authentication gate maps
/// them to `Unauthorized` explicitly.
impl From<crate::auth::token::TokenError> for AppError {
    fn from(error: crate::auth::token::TokenError) -> AppError {
        AppError::Internal(format!("token codec: {}", error))
    }
}

/// Error handler for JSON payload extraction, registered via `web::JsonConfig`.
/// Keeps body-shape failures (including unknown fields on patch payloads) on
/// the same JSON error envelope as the rest of the API.
pub fn json_error_handler(error: JsonPayloadError, _req: &HttpRequest) -> actix_web::Error {
    AppError::BadRequest(error.to_string()).into()
}
