use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use crate::auth::jwt::JwtKeys;
use crate::auth::password::Passwords;
use crate::auth::services::IdentityService;
use crate::cache::InMemoryIdentityCache;
use crate::config::{AppConfig, PerformanceSink};
use crate::context::RequestContext;
use crate::perf::{PerformanceRecorder, PgPerformanceRecorder, TracingRecorder};
use crate::store::PgCredentialStore;
use crate::tasks::BackgroundTasks;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<IdentityService>,
    pub config: Arc<AppConfig>,
}

impl AppState {
    /// Connects to Postgres, applies migrations and wires the service.
    pub async fn init(config: AppConfig) -> anyhow::Result<Self> {
        let config = Arc::new(config);

        let db = sqlx::postgres::PgPoolOptions::new()
            .max_connections(config.db_max_connections)
            .acquire_timeout(config.rw_timeout)
            .connect(&config.database_url)
            .await?;

        sqlx::migrate!("./migrations").run(&db).await?;
        info!("migrations applied");

        let cache = Arc::new(InMemoryIdentityCache::new(&config.cache));
        spawn_cache_sweeper(Arc::clone(&cache), config.cache.ttl);

        let recorder: Arc<dyn PerformanceRecorder> = match config.performance_sink {
            PerformanceSink::Postgres => Arc::new(PgPerformanceRecorder::new(db.clone())),
            PerformanceSink::Log => Arc::new(TracingRecorder),
        };

        let service = IdentityService::new(
            Arc::new(PgCredentialStore::new(db)),
            cache,
            Arc::new(JwtKeys::new(&config.jwt)),
            recorder,
            Passwords::new(&config.password)?,
            BackgroundTasks::new(config.background_timeout),
            config.rw_timeout,
        );

        Ok(Self::from_parts(Arc::new(service), config))
    }

    pub fn from_parts(service: Arc<IdentityService>, config: Arc<AppConfig>) -> Self {
        Self { service, config }
    }

    /// Fresh context for one inbound request.
    pub fn request_context(&self) -> RequestContext {
        RequestContext::with_timeout(self.config.rw_timeout)
    }

    /// Service over in-memory adapters with cheap hashing.
    #[cfg(test)]
    pub fn fake() -> Self {
        let (harness, _, _) = crate::testing::Harness::in_memory();
        Self::from_parts(harness.service, Arc::new(crate::config::test_config()))
    }
}

/// Periodically evicts expired cache entries for the life of the process.
fn spawn_cache_sweeper(cache: Arc<InMemoryIdentityCache>, every: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let removed = cache.purge_expired();
            if removed > 0 {
                debug!(removed, remaining = cache.len(), "purged expired cache entries");
            }
        }
    });
}
