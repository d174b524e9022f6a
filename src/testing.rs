//! Test doubles and a ready-made service wired to in-memory adapters.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use uuid::Uuid;

use crate::auth::jwt::test_keys;
use crate::auth::password::cheap_passwords;
use crate::auth::services::{IdentityService, Registration};
use crate::cache::{IdentityCache, InMemoryIdentityCache};
use crate::config::test_config;
use crate::context::RequestContext;
use crate::domain::User;
use crate::error::{CacheError, StoreError};
use crate::perf::{PerformanceEvent, PerformanceRecorder};
use crate::store::{CredentialStore, InMemoryCredentialStore};
use crate::tasks::BackgroundTasks;

/// In-memory store that counts how often each method is hit.
#[derive(Default)]
pub(crate) struct CountingStore {
    pub inner: InMemoryCredentialStore,
    pub saves: AtomicUsize,
    pub by_id: AtomicUsize,
    pub by_email: AtomicUsize,
    pub deletes: AtomicUsize,
}

impl CountingStore {
    pub fn reads(&self) -> usize {
        self.by_id.load(Ordering::SeqCst) + self.by_email.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CredentialStore for CountingStore {
    async fn save(&self, ctx: &RequestContext, user: &User) -> Result<Uuid, StoreError> {
        self.saves.fetch_add(1, Ordering::SeqCst);
        self.inner.save(ctx, user).await
    }

    async fn get_by_id(&self, ctx: &RequestContext, id: Uuid) -> Result<User, StoreError> {
        self.by_id.fetch_add(1, Ordering::SeqCst);
        self.inner.get_by_id(ctx, id).await
    }

    async fn get_by_email(&self, ctx: &RequestContext, email: &str) -> Result<User, StoreError> {
        self.by_email.fetch_add(1, Ordering::SeqCst);
        self.inner.get_by_email(ctx, email).await
    }

    async fn delete(&self, ctx: &RequestContext, id: Uuid) -> Result<(), StoreError> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        self.inner.delete(ctx, id).await
    }
}

/// Store whose backend is unreachable.
pub(crate) struct BrokenStore;

#[async_trait]
impl CredentialStore for BrokenStore {
    async fn save(&self, _ctx: &RequestContext, _user: &User) -> Result<Uuid, StoreError> {
        Err(StoreError::Infra(anyhow::anyhow!("connection refused")))
    }

    async fn get_by_id(&self, _ctx: &RequestContext, _id: Uuid) -> Result<User, StoreError> {
        Err(StoreError::Infra(anyhow::anyhow!("connection refused")))
    }

    async fn get_by_email(&self, _ctx: &RequestContext, _email: &str) -> Result<User, StoreError> {
        Err(StoreError::Infra(anyhow::anyhow!("connection refused")))
    }

    async fn delete(&self, _ctx: &RequestContext, _id: Uuid) -> Result<(), StoreError> {
        Err(StoreError::Infra(anyhow::anyhow!("connection refused")))
    }
}

/// Store that never answers within any sane deadline.
pub(crate) struct StalledStore;

impl StalledStore {
    async fn stall<T>() -> Result<T, StoreError> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Err(StoreError::NotFound)
    }
}

#[async_trait]
impl CredentialStore for StalledStore {
    async fn save(&self, _ctx: &RequestContext, _user: &User) -> Result<Uuid, StoreError> {
        Self::stall().await
    }

    async fn get_by_id(&self, _ctx: &RequestContext, _id: Uuid) -> Result<User, StoreError> {
        Self::stall().await
    }

    async fn get_by_email(&self, _ctx: &RequestContext, _email: &str) -> Result<User, StoreError> {
        Self::stall().await
    }

    async fn delete(&self, _ctx: &RequestContext, _id: Uuid) -> Result<(), StoreError> {
        Self::stall().await
    }
}

/// Cache whose backend is unreachable.
pub(crate) struct BrokenCache;

#[async_trait]
impl IdentityCache for BrokenCache {
    async fn get_by_id(&self, _ctx: &RequestContext, _id: Uuid) -> Result<User, CacheError> {
        Err(CacheError::Infra("connection reset".into()))
    }

    async fn get_by_email(&self, _ctx: &RequestContext, _email: &str) -> Result<User, CacheError> {
        Err(CacheError::Infra("connection reset".into()))
    }

    async fn set_by_id(&self, _ctx: &RequestContext, _user: &User) -> Result<(), CacheError> {
        Err(CacheError::Infra("connection reset".into()))
    }

    async fn set_by_email(&self, _ctx: &RequestContext, _user: &User) -> Result<(), CacheError> {
        Err(CacheError::Infra("connection reset".into()))
    }
}

#[derive(Default)]
pub(crate) struct RecordingRecorder {
    events: Mutex<Vec<PerformanceEvent>>,
}

impl RecordingRecorder {
    pub fn events(&self) -> Vec<PerformanceEvent> {
        self.events.lock().clone()
    }
}

#[async_trait]
impl PerformanceRecorder for RecordingRecorder {
    async fn record(&self, event: PerformanceEvent) {
        self.events.lock().push(event);
    }
}

pub(crate) fn ctx() -> RequestContext {
    RequestContext::with_timeout(Duration::from_secs(10))
}

pub(crate) fn registration(email: &str, password: &str) -> Registration {
    Registration {
        email: email.into(),
        name: "Alice".into(),
        surname: "Liddell".into(),
        password: password.into(),
        is_recruiter: false,
    }
}

/// A service plus handles on every adapter behind it.
pub(crate) struct Harness {
    pub service: Arc<IdentityService>,
    pub recorder: Arc<RecordingRecorder>,
}

impl Harness {
    pub fn build(store: Arc<dyn CredentialStore>, cache: Arc<dyn IdentityCache>) -> Self {
        let cfg = test_config();
        let recorder = Arc::new(RecordingRecorder::default());
        let service = IdentityService::new(
            store,
            cache,
            Arc::new(test_keys()),
            recorder.clone(),
            cheap_passwords(),
            BackgroundTasks::new(cfg.background_timeout),
            cfg.rw_timeout,
        );
        Self {
            service: Arc::new(service),
            recorder,
        }
    }

    /// Counting store and a real in-memory cache with the test ttl.
    pub fn in_memory() -> (Self, Arc<CountingStore>, Arc<InMemoryIdentityCache>) {
        let store = Arc::new(CountingStore::default());
        let cache = Arc::new(InMemoryIdentityCache::new(&test_config().cache));
        let harness = Self::build(store.clone(), cache.clone());
        (harness, store, cache)
    }

    /// Waits for cache writes and performance events to land.
    pub async fn settle(&self) {
        self.service.background().drain().await;
    }
}
