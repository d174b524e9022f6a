//! Authoritative user persistence.

use async_trait::async_trait;
use uuid::Uuid;

use crate::context::RequestContext;
use crate::domain::User;
use crate::error::StoreError;

mod memory;
mod postgres;

pub use memory::InMemoryCredentialStore;
pub use postgres::PgCredentialStore;

/// System of record for users. Email uniqueness is enforced here, atomically.
///
/// Every method fails with `StoreError::Context` when `ctx` has already
/// fired before the call starts.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Persists a new user. `Conflict` when the email is taken.
    async fn save(&self, ctx: &RequestContext, user: &User) -> Result<Uuid, StoreError>;
    async fn get_by_id(&self, ctx: &RequestContext, id: Uuid) -> Result<User, StoreError>;
    async fn get_by_email(&self, ctx: &RequestContext, email: &str) -> Result<User, StoreError>;
    /// `NotFound` when no row was removed.
    async fn delete(&self, ctx: &RequestContext, id: Uuid) -> Result<(), StoreError>;
}

pub(crate) fn check_ctx(ctx: &RequestContext) -> Result<(), StoreError> {
    ctx.ensure_active().map_err(|_| StoreError::Context)
}
