use thiserror::Error;

/// Failures of the authoritative user store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("user not found")]
    NotFound,
    #[error("email is already taken")]
    Conflict,
    #[error("request was cancelled or timed out")]
    Context,
    #[error("store failure: {0}")]
    Infra(#[source] anyhow::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::RowNotFound => StoreError::NotFound,
            sqlx::Error::Database(ref db) if db.is_unique_violation() => StoreError::Conflict,
            sqlx::Error::PoolTimedOut => StoreError::Context,
            other => StoreError::Infra(other.into()),
        }
    }
}

/// Failures of the identity cache. A miss is `NotFound`, never `Infra`.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache miss")]
    NotFound,
    #[error("request was cancelled or timed out")]
    Context,
    #[error("cache payload could not be decoded: {0}")]
    Codec(#[from] serde_json::Error),
    #[error("cache failure: {0}")]
    Infra(String),
}

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("invalid token: {0}")]
    Invalid(String),
    #[error("token has expired")]
    Expired,
    #[error("failed to sign token: {0}")]
    Generation(#[source] jsonwebtoken::errors::Error),
}

/// Rejections raised while building a `User` from raw input.
#[derive(Debug, Error)]
pub enum UserError {
    #[error("email is invalid")]
    InvalidEmail,
    #[error("name cannot be empty")]
    EmptyName,
    #[error("password cannot be empty")]
    EmptyPassword,
    #[error("failed to hash password: {0}")]
    Hash(String),
}

/// Errors returned by `IdentityService`. Callers branch on the variant;
/// the transport layer maps each one to a status.
#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("token cannot be empty")]
    NilToken,
    #[error("invalid token")]
    InvalidToken,
    #[error("some args are invalid")]
    InvalidArgs,
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("email is invalid")]
    InvalidEmail,
    #[error("failed to create user")]
    CreateUserFailed(#[source] UserError),
    #[error("user already exists")]
    UserAlreadyExists,
    #[error("user doesn't exist")]
    UserDoesNotExist,
    #[error("context was cancelled or timed out")]
    Context,
    #[error("error with database")]
    Database,
    #[error("failed to generate new token")]
    TokenGeneration(#[source] TokenError),
}

impl IdentityError {
    /// Stable outcome code recorded with performance events.
    pub fn code(&self) -> &'static str {
        match self {
            IdentityError::NilToken => "nil_token",
            IdentityError::InvalidToken => "invalid_token",
            IdentityError::InvalidArgs => "invalid_args",
            IdentityError::InvalidCredentials => "invalid_credentials",
            IdentityError::InvalidEmail => "invalid_email",
            IdentityError::CreateUserFailed(_) => "create_user_failed",
            IdentityError::UserAlreadyExists => "user_already_exists",
            IdentityError::UserDoesNotExist => "user_does_not_exist",
            IdentityError::Context => "context",
            IdentityError::Database => "database",
            IdentityError::TokenGeneration(_) => "token_generation",
        }
    }
}
