//! Backend selection
//!
//! `REDIS_URL` present selects the shared store; absent (or unreachable at
//! startup) selects the in-process store.

use crate::domain::entities::WindowSnapshot;
use crate::domain::repository::CounterBackend;
use crate::error::RateLimitResult;
use crate::infra::memory::MemoryCounterBackend;
use crate::infra::redis_store::RedisCounterBackend;
use monitor::Sweep;
use platform::clock::SharedClock;
use std::sync::Arc;

pub enum SelectedBackend {
    Shared(RedisCounterBackend),
    Local(Arc<MemoryCounterBackend>),
}

impl SelectedBackend {
    pub async fn from_url(redis_url: Option<&str>, clock: SharedClock) -> Self {
        let Some(url) = redis_url else {
            tracing::info!("No REDIS_URL set, using in-process rate limit counters");
            return Self::local(clock);
        };

        match RedisCounterBackend::connect(url).await {
            Ok(backend) => {
                tracing::info!("Using shared rate limit counters");
                SelectedBackend::Shared(backend)
            }
            Err(e) => {
                tracing::error!(error = %e, "Shared counter store unreachable, using in-process counters");
                Self::local(clock)
            }
        }
    }

    pub fn local(clock: SharedClock) -> Self {
        SelectedBackend::Local(Arc::new(MemoryCounterBackend::new(clock)))
    }

    /// Periodic cleanup job, if this backend needs one.
    pub fn sweeper(&self) -> Option<Arc<dyn Sweep>> {
        match self {
            SelectedBackend::Shared(_) => None,
            SelectedBackend::Local(memory) => Some(memory.clone() as Arc<dyn Sweep>),
        }
    }
}

impl CounterBackend for SelectedBackend {
    async fn count_and_record(
        &self,
        key: &str,
        now: f64,
        window_secs: u64,
        ceiling: u64,
    ) -> RateLimitResult<WindowSnapshot> {
        match self {
            SelectedBackend::Shared(b) => b.count_and_record(key, now, window_secs, ceiling).await,
            SelectedBackend::Local(b) => b.count_and_record(key, now, window_secs, ceiling).await,
        }
    }

    async fn peek(&self, key: &str, now: f64, window_secs: u64) -> RateLimitResult<WindowSnapshot> {
        match self {
            SelectedBackend::Shared(b) => b.peek(key, now, window_secs).await,
            SelectedBackend::Local(b) => b.peek(key, now, window_secs).await,
        }
    }

    async fn invalidate(&self, pattern: &str) -> RateLimitResult<u64> {
        match self {
            SelectedBackend::Shared(b) => b.invalidate(pattern).await,
            SelectedBackend::Local(b) => b.invalidate(pattern).await,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            SelectedBackend::Shared(b) => CounterBackend::name(b),
            SelectedBackend::Local(b) => CounterBackend::name(b.as_ref()),
        }
    }
}
