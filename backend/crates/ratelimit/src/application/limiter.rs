//! Window Limiter
//!
//! Sliding-window log admission over a [`CounterStore`].

use crate::application::counter_store::CounterStore;
use crate::domain::entities::{Admission, RateLimitInfo, RateLimitPolicy, WindowSnapshot};
use crate::domain::repository::CounterBackend;
use crate::domain::services::{is_admitted, window_info};
use crate::domain::value_objects::RateLimitKey;
use platform::clock::SharedClock;

pub struct WindowLimiter<B> {
    store: CounterStore<B>,
    clock: SharedClock,
}

impl<B> WindowLimiter<B>
where
    B: CounterBackend + Send + Sync + 'static,
{
    pub fn new(store: CounterStore<B>, clock: SharedClock) -> Self {
        Self { store, clock }
    }

    pub fn store(&self) -> &CounterStore<B> {
        &self.store
    }

    pub fn now(&self) -> f64 {
        self.clock.epoch_secs()
    }

    /// Count this attempt and decide. Only admitted attempts are recorded.
    pub async fn check(&self, key: &RateLimitKey, policy: RateLimitPolicy) -> Admission {
        let now = self.now();

        if policy.limit == 0 {
            return Admission {
                allowed: false,
                info: window_info(policy, WindowSnapshot::empty(), now),
            };
        }

        let snapshot = self
            .store
            .count_and_record(key, now, policy.window_secs, u64::from(policy.limit))
            .await;
        let allowed = is_admitted(policy, snapshot.count);

        Admission {
            allowed,
            info: window_info(policy, snapshot, now),
        }
    }

    pub async fn check_rate_limit(&self, key: &RateLimitKey, policy: RateLimitPolicy) -> bool {
        self.check(key, policy).await.allowed
    }

    /// Current state without recording anything.
    pub async fn get_rate_limit_info(
        &self,
        key: &RateLimitKey,
        policy: RateLimitPolicy,
    ) -> RateLimitInfo {
        let now = self.now();
        let snapshot = self.store.peek(key, now, policy.window_secs).await;
        window_info(policy, snapshot, now)
    }
}
