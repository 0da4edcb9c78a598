pub mod extractors;
pub mod middleware;
pub mod password;
pub mod token;

use crate::models::PublicUser;
use serde::{Deserialize, Serialize};

// Re-export necessary items
pub use extractors::AuthSession;
pub use middleware::AuthMiddleware;
pub use password::{hash_password, verify_password};
pub use token::{Claims, TokenCodec, TokenError};

/// Represents the payload for a user login request.
///
/// No field validation runs here on purpose: every login failure, including
/// a nonsensical email, funnels into the same "Unable to login." response.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    /// User's email address.
    pub email: String,
    /// User's password.
    pub password: String,
}

/// Response structure after successful authentication (login or registration).
/// Carries the public user view and the newly issued session token.
#[derive(Debug, Serialize, Deserialize)]
pub struct AuthResponse {
    /// The authenticated user, stripped of credentials and session state.
    pub user: PublicUser,
    /// The session token to present as `Authorization: Bearer <token>`.
    pub token: String,
}
