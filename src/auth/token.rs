use jsonwebtoken::{
    decode, encode, errors::ErrorKind, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Represents the claims encoded within a session token.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Claims {
    /// Subject of the token: the user's unique identifier.
    pub sub: Uuid,
    /// Expiration timestamp (seconds since epoch) for the token.
    pub exp: usize,
}

/// The ways a token can fail verification. The authentication gate collapses
/// all of these into one uniform rejection; the distinction exists for
/// server-side logging and for tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenError {
    InvalidSignature,
    Expired,
    Malformed,
}

impl fmt::Display for TokenError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TokenError::InvalidSignature => write!(f, "invalid signature"),
            TokenError::Expired => write!(f, "token expired"),
            TokenError::Malformed => write!(f, "malformed token"),
        }
    }
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(error: jsonwebtoken::errors::Error) -> TokenError {
        match error.kind() {
            ErrorKind::ExpiredSignature => TokenError::Expired,
            ErrorKind::InvalidSignature => TokenError::InvalidSignature,
            _ => TokenError::Malformed,
        }
    }
}

/// Signs and verifies session tokens.
///
/// The codec is stateless: `issue` and `verify` are pure functions of their
/// inputs plus the signing secret and TTL injected at construction. The
/// secret is never read from the environment here; `Config` owns that.
#[derive(Clone)]
pub struct TokenCodec {
    secret: String,
    ttl: chrono::Duration,
}

impl TokenCodec {
    pub fn new(secret: impl Into<String>, ttl_hours: i64) -> Self {
        Self {
            secret: secret.into(),
            ttl: chrono::Duration::hours(ttl_hours),
        }
    }

    /// Produces a signed token embedding `user_id` and an expiry claim.
    pub fn issue(&self, user_id: Uuid) -> Result<String, TokenError> {
        let expiration = chrono::Utc::now()
            .checked_add_signed(self.ttl)
            .expect("valid timestamp")
            .timestamp() as usize;

        let claims = Claims {
            sub: user_id,
            exp: expiration,
        };

        Ok(encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )?)
    }

    /// Verifies a token string and decodes its claims. Fails with
    /// `InvalidSignature` if tampered, `Expired` if past TTL, and
    /// `Malformed` if not decodable at all.
    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        let data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &Validation::default(),
        )?;
        Ok(data.claims)
    }
}
