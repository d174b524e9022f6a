use async_trait::async_trait;
use sqlx::PgPool;
use tracing::error;

use super::{PerformanceEvent, PerformanceRecorder};

/// Appends events to the `performance_logs` table.
#[derive(Clone)]
pub struct PgPerformanceRecorder {
    db: PgPool,
}

impl PgPerformanceRecorder {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl PerformanceRecorder for PgPerformanceRecorder {
    async fn record(&self, event: PerformanceEvent) {
        let duration_ns = i64::try_from(event.duration.as_nanos()).unwrap_or(i64::MAX);
        let res = sqlx::query(
            r#"
            INSERT INTO performance_logs (endpoint, duration_ns, outcome, cache_hit)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(event.operation.as_str())
        .bind(duration_ns)
        .bind(event.outcome)
        .bind(event.cache_hit)
        .execute(&self.db)
        .await;

        if let Err(e) = res {
            error!(
                error = %e,
                endpoint = event.operation.as_str(),
                "failed to insert performance log"
            );
        }
    }
}
