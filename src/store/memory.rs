use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;
use uuid::Uuid;

use super::{check_ctx, CredentialStore};
use crate::context::RequestContext;
use crate::domain::User;
use crate::error::StoreError;

#[derive(Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    by_email: HashMap<String, Uuid>,
}

/// Process-local store. Both indexes change under one write lock, so a save
/// is all-or-nothing and the email constraint holds under concurrency.
#[derive(Default)]
pub struct InMemoryCredentialStore {
    tables: RwLock<Tables>,
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.tables.read().users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Replaces a stored record in place, bypassing the service. Used to
    /// simulate changes made outside this process.
    pub fn overwrite(&self, user: User) {
        let mut t = self.tables.write();
        if let Some(old) = t.users.get(&user.id) {
            let old_email = old.email.as_str().to_string();
            t.by_email.remove(&old_email);
        }
        t.by_email.insert(user.email.as_str().to_string(), user.id);
        t.users.insert(user.id, user);
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn save(&self, ctx: &RequestContext, user: &User) -> Result<Uuid, StoreError> {
        check_ctx(ctx)?;
        let mut t = self.tables.write();
        if t.by_email.contains_key(user.email.as_str()) || t.users.contains_key(&user.id) {
            return Err(StoreError::Conflict);
        }
        t.by_email.insert(user.email.as_str().to_string(), user.id);
        t.users.insert(user.id, user.clone());
        Ok(user.id)
    }

    async fn get_by_id(&self, ctx: &RequestContext, id: Uuid) -> Result<User, StoreError> {
        check_ctx(ctx)?;
        self.tables
            .read()
            .users
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn get_by_email(&self, ctx: &RequestContext, email: &str) -> Result<User, StoreError> {
        check_ctx(ctx)?;
        let t = self.tables.read();
        t.by_email
            .get(email)
            .and_then(|id| t.users.get(id))
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn delete(&self, ctx: &RequestContext, id: Uuid) -> Result<(), StoreError> {
        check_ctx(ctx)?;
        let mut t = self.tables.write();
        let user = t.users.remove(&id).ok_or(StoreError::NotFound)?;
        t.by_email.remove(user.email.as_str());
        Ok(())
    }
}
