use std::time::Duration;

use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::debug;
use uuid::Uuid;

use super::claims::TokenClaims;
use crate::config::JwtConfig;
use crate::error::TokenError;

/// Signs and verifies session tokens.
pub trait TokenAuthority: Send + Sync {
    fn issue(&self, email: &str, id: Uuid) -> Result<String, TokenError>;
    fn verify(&self, token: &str) -> Result<TokenClaims, TokenError>;
}

/// HS256 token authority.
#[derive(Clone)]
pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    issuer: String,
    ttl: Duration,
}

impl JwtKeys {
    pub fn new(cfg: &JwtConfig) -> Self {
        Self {
            encoding: EncodingKey::from_secret(cfg.secret.as_bytes()),
            decoding: DecodingKey::from_secret(cfg.secret.as_bytes()),
            issuer: cfg.issuer.clone(),
            ttl: cfg.ttl,
        }
    }

    fn sign(&self, claims: &TokenClaims) -> Result<String, TokenError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding)
            .map_err(TokenError::Generation)
    }

    fn validation(&self) -> Validation {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_issuer(std::slice::from_ref(&self.issuer));
        validation.set_required_spec_claims(&["exp", "iss", "sub"]);
        validation
    }
}

impl TokenAuthority for JwtKeys {
    fn issue(&self, email: &str, id: Uuid) -> Result<String, TokenError> {
        let now = OffsetDateTime::now_utc();
        let exp = now + TimeDuration::seconds(self.ttl.as_secs() as i64);
        let claims = TokenClaims {
            email: email.to_string(),
            id,
            iss: self.issuer.clone(),
            iat: now.unix_timestamp(),
            exp: exp.unix_timestamp(),
            sub: id.to_string(),
        };
        let token = self.sign(&claims)?;
        debug!(user_id = %id, "jwt signed");
        Ok(token)
    }

    fn verify(&self, token: &str) -> Result<TokenClaims, TokenError> {
        if token.is_empty() {
            return Err(TokenError::Invalid("empty token".into()));
        }
        let data = decode::<TokenClaims>(token, &self.decoding, &self.validation()).map_err(
            |e| match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Invalid(e.to_string()),
            },
        )?;
        let claims = data.claims;
        if claims.sub != claims.id.to_string() {
            return Err(TokenError::Invalid("subject does not match id".into()));
        }
        debug!(user_id = %claims.id, "jwt verified");
        Ok(claims)
    }
}

#[cfg(test)]
impl JwtKeys {
    /// Token for `email`/`id` whose expiry is already `secs_ago` in the past.
    pub(crate) fn issue_expired(&self, email: &str, id: Uuid, secs_ago: i64) -> String {
        let now = OffsetDateTime::now_utc().unix_timestamp();
        self.sign(&TokenClaims {
            email: email.to_string(),
            id,
            iss: self.issuer.clone(),
            iat: now - secs_ago - self.ttl.as_secs() as i64,
            exp: now - secs_ago,
            sub: id.to_string(),
        })
        .expect("sign expired token")
    }
}

#[cfg(test)]
pub(crate) fn test_keys() -> JwtKeys {
    JwtKeys::new(&JwtConfig {
        secret: "dev-secret".into(),
        issuer: "test-issuer".into(),
        ttl: Duration::from_secs(15 * 60),
    })
}
