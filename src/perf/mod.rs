//! Best-effort per-operation performance events.

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

mod postgres;

pub use postgres::PgPerformanceRecorder;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    GetUserByToken,
    Login,
    Register,
    Delete,
    Refresh,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::GetUserByToken => "sso.get_user_by_token",
            Operation::Login => "sso.login",
            Operation::Register => "sso.register",
            Operation::Delete => "sso.delete",
            Operation::Refresh => "sso.refresh",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PerformanceEvent {
    pub operation: Operation,
    pub duration: Duration,
    /// `"ok"` or the error code of the failed call.
    pub outcome: &'static str,
    pub cache_hit: bool,
}

/// Write-only sink. Implementations swallow and log their own failures.
#[async_trait]
pub trait PerformanceRecorder: Send + Sync {
    async fn record(&self, event: PerformanceEvent);
}

/// Emits events as debug log lines.
#[derive(Debug, Default, Clone)]
pub struct TracingRecorder;

#[async_trait]
impl PerformanceRecorder for TracingRecorder {
    async fn record(&self, event: PerformanceEvent) {
        debug!(
            operation = event.operation.as_str(),
            duration_us = event.duration.as_micros() as u64,
            outcome = event.outcome,
            cache_hit = event.cache_hit,
            "performance event"
        );
    }
}
