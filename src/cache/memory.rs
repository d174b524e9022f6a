use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::time::Instant;
use tracing::debug;
use uuid::Uuid;

use super::{cache_key, decode_user, encode_user, IdentityCache};
use crate::config::CacheConfig;
use crate::context::RequestContext;
use crate::domain::User;
use crate::error::CacheError;

struct Entry {
    payload: Vec<u8>,
    expires_at: Instant,
}

/// Process-local TTL cache holding serialized user records.
pub struct InMemoryIdentityCache {
    entries: DashMap<String, Entry>,
    namespace: String,
    ttl: Duration,
}

impl InMemoryIdentityCache {
    pub fn new(cfg: &CacheConfig) -> Self {
        Self {
            entries: DashMap::new(),
            namespace: cfg.namespace.clone(),
            ttl: cfg.ttl,
        }
    }

    /// Drops every expired entry; returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut removed = 0;
        self.entries.retain(|_, e| {
            let keep = e.expires_at > now;
            if !keep {
                removed += 1;
            }
            keep
        });
        removed
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[cfg(test)]
    pub(crate) fn put_raw(&self, key: &str, payload: Vec<u8>) {
        self.entries.insert(
            cache_key(&self.namespace, key),
            Entry {
                payload,
                expires_at: Instant::now() + self.ttl,
            },
        );
    }

    fn get(&self, ctx: &RequestContext, key: String) -> Result<User, CacheError> {
        ctx.ensure_active().map_err(|_| CacheError::Context)?;
        let payload = {
            let entry = self.entries.get(&key).ok_or(CacheError::NotFound)?;
            if entry.expires_at > Instant::now() {
                Some(entry.payload.clone())
            } else {
                None
            }
        };
        match payload {
            Some(bytes) => decode_user(&bytes),
            None => {
                self.entries
                    .remove_if(&key, |_, e| e.expires_at <= Instant::now());
                debug!(key = %key, "cache entry expired");
                Err(CacheError::NotFound)
            }
        }
    }

    fn set(&self, ctx: &RequestContext, key: String, user: &User) -> Result<(), CacheError> {
        ctx.ensure_active().map_err(|_| CacheError::Context)?;
        let payload = encode_user(user)?;
        self.entries.insert(
            key,
            Entry {
                payload,
                expires_at: Instant::now() + self.ttl,
            },
        );
        Ok(())
    }
}

#[async_trait]
impl IdentityCache for InMemoryIdentityCache {
    async fn get_by_id(&self, ctx: &RequestContext, id: Uuid) -> Result<User, CacheError> {
        self.get(ctx, cache_key(&self.namespace, id))
    }

    async fn get_by_email(&self, ctx: &RequestContext, email: &str) -> Result<User, CacheError> {
        self.get(ctx, cache_key(&self.namespace, email))
    }

    async fn set_by_id(&self, ctx: &RequestContext, user: &User) -> Result<(), CacheError> {
        self.set(ctx, cache_key(&self.namespace, user.id), user)
    }

    async fn set_by_email(&self, ctx: &RequestContext, user: &User) -> Result<(), CacheError> {
        self.set(ctx, cache_key(&self.namespace, &user.email), user)
    }
}
