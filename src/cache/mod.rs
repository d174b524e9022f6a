//! Cache-aside lookups of users by id or by email.
//!
//! Both lookups share one namespace, so a user read by id and by email
//! occupies two independent entries that expire on their own.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::context::RequestContext;
use crate::domain::{Email, User};
use crate::error::CacheError;

mod memory;

pub use memory::InMemoryIdentityCache;

#[async_trait]
pub trait IdentityCache: Send + Sync {
    async fn get_by_id(&self, ctx: &RequestContext, id: Uuid) -> Result<User, CacheError>;
    async fn get_by_email(&self, ctx: &RequestContext, email: &str) -> Result<User, CacheError>;
    /// Overwrites any existing entry; last writer wins.
    async fn set_by_id(&self, ctx: &RequestContext, user: &User) -> Result<(), CacheError>;
    async fn set_by_email(&self, ctx: &RequestContext, user: &User) -> Result<(), CacheError>;
}

/// `"{namespace}:{id-or-email}"`
pub fn cache_key(namespace: &str, key: impl std::fmt::Display) -> String {
    format!("{namespace}:{key}")
}

/// Wire form of a cached user, hash included.
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct CachedUser {
    pub id: Uuid,
    pub email: Email,
    pub name: String,
    pub surname: String,
    pub is_recruiter: bool,
    pub password_hash: String,
}

impl From<&User> for CachedUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            name: user.name.clone(),
            surname: user.surname.clone(),
            is_recruiter: user.is_recruiter,
            password_hash: user.password_hash().to_string(),
        }
    }
}

impl From<CachedUser> for User {
    fn from(c: CachedUser) -> Self {
        User::from_parts(c.id, c.email, c.name, c.surname, c.is_recruiter, c.password_hash)
    }
}

pub(crate) fn encode_user(user: &User) -> Result<Vec<u8>, CacheError> {
    Ok(serde_json::to_vec(&CachedUser::from(user))?)
}

pub(crate) fn decode_user(bytes: &[u8]) -> Result<User, CacheError> {
    let cached: CachedUser = serde_json::from_slice(bytes)?;
    Ok(cached.into())
}
