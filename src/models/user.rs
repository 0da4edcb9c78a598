use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{types::Json, FromRow, PgPool};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::auth::password::{hash_password, verify_password};
use crate::auth::token::TokenCodec;
use crate::error::AppError;

/// A bcrypt digest of the word "password"; compared against when a login
/// names an unknown email so that both failure paths cost one hash check.
const DUMMY_HASH: &str = "$2a$12$R9h/cIPz0gi.URNNX3kh2OPST9/PgBkqquzi.Ss7KIUgO2t0jWMUW";

/// One live session. Each login appends an entry; entries are kept in
/// insertion order and are not deduplicated, so the same device logging in
/// twice holds two independent sessions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionToken {
    pub token: String,
}

/// A user row. The `tokens` column is JSONB: the token list is read and
/// written as part of the user document, never row-by-row.
///
/// `User` deliberately does not implement `Serialize`; the only shape ever
/// sent to a client is [`PublicUser`].
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub age: i64,
    #[sqlx(json)]
    pub tokens: Vec<SessionToken>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The client-facing user representation: no password hash, no token list.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicUser {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub age: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Registration payload. Validation runs on the raw input, before hashing:
/// the password length and content rules apply to the plaintext.
#[derive(Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct NewUser {
    #[validate(custom = "crate::models::validate_not_blank")]
    pub name: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 7), custom = "validate_password_content")]
    pub password: String,
    #[validate(range(min = 0))]
    pub age: Option<i64>,
}

/// PATCH /users/me payload. Same field rules as registration; any field
/// outside this set fails deserialization.
#[derive(Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct UserUpdate {
    #[validate(custom = "crate::models::validate_not_blank")]
    pub name: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    #[validate(length(min = 7), custom = "validate_password_content")]
    pub password: Option<String>,
    #[validate(range(min = 0))]
    pub age: Option<i64>,
}

fn validate_password_content(value: &str) -> Result<(), ValidationError> {
    if value.to_lowercase().contains("password") {
        let mut error = ValidationError::new("forbidden");
        error.message = Some("must not contain the word \"password\"".into());
        return Err(error);
    }
    Ok(())
}

/// Lowercases and trims an email for storage and lookup, so the unique index
/// and credential search are case-insensitive.
pub fn normalize_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}

const USER_COLUMNS: &str =
    "id, name, email, password_hash, age, tokens, created_at, updated_at";

impl User {
    /// Validates and persists a new user. The email is normalized before the
    /// uniqueness check; the password is hashed before it is stored. Returns
    /// the created user with an empty token list.
    pub async fn create(pool: &PgPool, input: NewUser) -> Result<User, AppError> {
        input.validate()?;

        let email = normalize_email(&input.email);
        if Self::find_by_email(pool, &email).await?.is_some() {
            return Err(AppError::Conflict("Email already in use".into()));
        }

        let password_hash = hash_password(&input.password)?;
        let now = Utc::now();

        let sql = format!(
            "INSERT INTO users (id, name, email, password_hash, age, tokens, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING {}",
            USER_COLUMNS
        );
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(Uuid::new_v4())
            .bind(input.name.trim())
            .bind(&email)
            .bind(&password_hash)
            .bind(input.age.unwrap_or(0))
            .bind(Json(Vec::<SessionToken>::new()))
            .bind(now)
            .bind(now)
            .fetch_one(pool)
            .await?;

        Ok(user)
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<User>, AppError> {
        let sql = format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS);
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(pool)
            .await?)
    }

    pub async fn find_by_email(pool: &PgPool, email: &str) -> Result<Option<User>, AppError> {
        let sql = format!("SELECT {} FROM users WHERE email = $1", USER_COLUMNS);
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(normalize_email(email))
            .fetch_optional(pool)
            .await?)
    }

    /// Looks a user up by email and password. Fails uniformly with
    /// `LoginFailed` whether the email is unknown or the password is wrong;
    /// the unknown-email path still burns a bcrypt comparison.
    pub async fn find_by_credentials(
        pool: &PgPool,
        email: &str,
        password: &str,
    ) -> Result<User, AppError> {
        match Self::find_by_email(pool, email).await? {
            Some(user) => {
                if verify_password(password, &user.password_hash)? {
                    Ok(user)
                } else {
                    Err(AppError::LoginFailed)
                }
            }
            None => {
                let _ = verify_password(password, DUMMY_HASH);
                Err(AppError::LoginFailed)
            }
        }
    }

    /// Issues a session token for this user, appends it to the live token
    /// list, and persists the list. Returns the token string.
    pub async fn generate_auth_token(
        &mut self,
        pool: &PgPool,
        codec: &TokenCodec,
    ) -> Result<String, AppError> {
        let token = codec.issue(self.id)?;
        self.tokens.push(SessionToken {
            token: token.clone(),
        });
        self.save_tokens(pool).await?;
        Ok(token)
    }

    /// Removes one matching entry from the live token list, revoking exactly
    /// the session that presented it.
    pub async fn logout(&mut self, pool: &PgPool, token: &str) -> Result<(), AppError> {
        if let Some(position) = self.tokens.iter().position(|entry| entry.token == token) {
            self.tokens.remove(position);
        }
        self.save_tokens(pool).await
    }

    /// Clears the live token list, revoking every session on every device.
    pub async fn logout_all(&mut self, pool: &PgPool) -> Result<(), AppError> {
        self.tokens.clear();
        self.save_tokens(pool).await
    }

    async fn save_tokens(&mut self, pool: &PgPool) -> Result<(), AppError> {
        self.updated_at = Utc::now();
        sqlx::query("UPDATE users SET tokens = $1, updated_at = $2 WHERE id = $3")
            .bind(Json(&self.tokens))
            .bind(self.updated_at)
            .bind(self.id)
            .execute(pool)
            .await?;
        Ok(())
    }

    /// Applies a profile update. The password hash is recomputed only when
    /// the patch carries a password. An email collision surfaces as
    /// `Conflict` through the unique index.
    pub async fn apply_update(
        &mut self,
        pool: &PgPool,
        update: UserUpdate,
    ) -> Result<(), AppError> {
        update.validate()?;

        if let Some(name) = update.name {
            self.name = name.trim().to_string();
        }
        if let Some(email) = update.email {
            self.email = normalize_email(&email);
        }
        if let Some(password) = update.password {
            self.password_hash = hash_password(&password)?;
        }
        if let Some(age) = update.age {
            self.age = age;
        }
        self.updated_at = Utc::now();

        sqlx::query(
            "UPDATE users SET name = $1, email = $2, password_hash = $3, age = $4, \
             updated_at = $5 WHERE id = $6",
        )
        .bind(&self.name)
        .bind(&self.email)
        .bind(&self.password_hash)
        .bind(self.age)
        .bind(self.updated_at)
        .bind(self.id)
        .execute(pool)
        .await?;

        Ok(())
    }

    /// Deletes this user and every task they authored. Two per-document
    /// writes, tasks first; no cross-document transaction is assumed.
    pub async fn delete_cascade(self, pool: &PgPool) -> Result<PublicUser, AppError> {
        sqlx::query("DELETE FROM tasks WHERE author = $1")
            .bind(self.id)
            .execute(pool)
            .await?;
        sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(self.id)
            .execute(pool)
            .await?;
        Ok(self.to_public())
    }

    /// The only user representation ever returned to a client.
    pub fn to_public(&self) -> PublicUser {
        PublicUser {
            id: self.id,
            name: self.name.clone(),
            email: self.email.clone(),
            age: self.age,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}
