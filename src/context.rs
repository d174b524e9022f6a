//! Per-request deadline and cancellation.
//!
//! Every call into the store or the cache receives a `RequestContext`.
//! Adapters refuse to start work once the context has fired, and the
//! orchestrator bounds each downstream await by the context deadline.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

/// The context has been cancelled or its deadline has passed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("context was cancelled or timed out")]
pub struct ContextError;

#[derive(Debug, Clone)]
pub struct RequestContext {
    deadline: Instant,
    cancelled: Arc<AtomicBool>,
}

impl RequestContext {
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            deadline: Instant::now() + timeout,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Derives a context that expires at the earlier of the parent deadline
    /// and `now + timeout`. Cancellation is shared with the parent.
    pub fn child(&self, timeout: Duration) -> Self {
        let own = Instant::now() + timeout;
        Self {
            deadline: own.min(self.deadline),
            cancelled: Arc::clone(&self.cancelled),
        }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    pub fn ensure_active(&self) -> Result<(), ContextError> {
        if self.is_cancelled() || Instant::now() >= self.deadline {
            return Err(ContextError);
        }
        Ok(())
    }

    /// Awaits `fut` unless the context has already fired or the deadline
    /// passes first.
    pub async fn run<F, T>(&self, fut: F) -> Result<T, ContextError>
    where
        F: Future<Output = T>,
    {
        self.ensure_active()?;
        tokio::time::timeout_at(self.deadline, fut)
            .await
            .map_err(|_| ContextError)
    }
}
