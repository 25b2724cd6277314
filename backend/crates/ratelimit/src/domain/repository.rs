//! Repository Traits
//!
//! Counter storage contract. Implementations live in the infra layer.

use crate::domain::entities::WindowSnapshot;
use crate::error::RateLimitResult;

/// Per-key ordered timestamp log with expiry.
///
/// Implementations report raw state and return errors as-is; degraded-mode
/// handling belongs to [`CounterStore`](crate::application::counter_store::CounterStore).
#[trait_variant::make(CounterBackend: Send)]
pub trait LocalCounterBackend {
    /// Atomically, per key: drop entries older than `now - window_secs`,
    /// count the rest, and record `now` only if that count is below
    /// `ceiling`. Returns the count including this attempt and the oldest
    /// remaining entry. The key expires `window_secs` after its last write.
    async fn count_and_record(
        &self,
        key: &str,
        now: f64,
        window_secs: u64,
        ceiling: u64,
    ) -> RateLimitResult<WindowSnapshot>;

    /// In-window count and oldest entry. Never mutates.
    async fn peek(&self, key: &str, now: f64, window_secs: u64)
    -> RateLimitResult<WindowSnapshot>;

    /// Delete every key matching a `*` glob; returns the number removed.
    async fn invalidate(&self, pattern: &str) -> RateLimitResult<u64>;

    /// Short backend name for logs.
    fn name(&self) -> &'static str;
}
