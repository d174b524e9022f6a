use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Session token payload. Only trusted after signature and expiry checks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    pub email: String,
    pub id: Uuid,
    pub iss: String, // issuer
    pub iat: i64,    // issued at (unix timestamp)
    pub exp: i64,    // expires at (unix timestamp)
    pub sub: String, // = id
}
