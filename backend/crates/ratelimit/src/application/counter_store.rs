//! Counter Store
//!
//! Wraps a [`CounterBackend`] with a per-call deadline and the fail-open
//! policy: any backend error or timeout reads as an empty window, so the
//! request is admitted.

use crate::domain::entities::WindowSnapshot;
use crate::domain::repository::CounterBackend;
use crate::domain::value_objects::RateLimitKey;
use crate::error::{RateLimitError, RateLimitResult};
use std::future::Future;
use std::time::Duration;

pub struct CounterStore<B> {
    backend: B,
    timeout: Duration,
}

impl<B> CounterStore<B>
where
    B: CounterBackend + Send + Sync + 'static,
{
    pub fn new(backend: B, timeout: Duration) -> Self {
        Self { backend, timeout }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub async fn count_and_record(
        &self,
        key: &RateLimitKey,
        now: f64,
        window_secs: u64,
        ceiling: u64,
    ) -> WindowSnapshot {
        let result = self
            .bounded(
                self.backend
                    .count_and_record(key.as_str(), now, window_secs, ceiling),
            )
            .await;
        self.open_on_error("count_and_record", result)
    }

    pub async fn peek(&self, key: &RateLimitKey, now: f64, window_secs: u64) -> WindowSnapshot {
        let result = self
            .bounded(self.backend.peek(key.as_str(), now, window_secs))
            .await;
        self.open_on_error("peek", result)
    }

    /// Remove keys matching `pattern`; 0 when the backend fails.
    pub async fn invalidate(&self, pattern: &str) -> u64 {
        match self.bounded(self.backend.invalidate(pattern)).await {
            Ok(removed) => {
                tracing::info!(pattern, removed, "Invalidated rate limit keys");
                removed
            }
            Err(e) => {
                e.log("invalidate", self.backend.name());
                0
            }
        }
    }

    async fn bounded<T>(&self, fut: impl Future<Output = RateLimitResult<T>>) -> RateLimitResult<T> {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(RateLimitError::Timeout(self.timeout)),
        }
    }

    fn open_on_error(
        &self,
        op: &'static str,
        result: RateLimitResult<WindowSnapshot>,
    ) -> WindowSnapshot {
        match result {
            Ok(snapshot) => snapshot,
            Err(e) => {
                e.log(op, self.backend.name());
                WindowSnapshot::empty()
            }
        }
    }
}
