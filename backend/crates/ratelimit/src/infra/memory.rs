//! In-process counter backend
//!
//! Each key holds a sorted timestamp log behind the map's shard lock, so a
//! check-and-record is atomic within this process. Other processes do not
//! see these counts.

use crate::domain::entities::WindowSnapshot;
use crate::domain::repository::CounterBackend;
use crate::domain::services::glob_match;
use crate::error::RateLimitResult;
use dashmap::DashMap;
use monitor::{MonitorResult, Sweep};
use platform::clock::SharedClock;
use std::collections::VecDeque;

#[derive(Debug, Default)]
struct KeyLog {
    stamps: VecDeque<f64>,
    expires_at: f64,
}

impl KeyLog {
    fn prune(&mut self, floor: f64) {
        while self.stamps.front().is_some_and(|t| *t < floor) {
            self.stamps.pop_front();
        }
    }

    fn insert(&mut self, now: f64) {
        let pos = self.stamps.partition_point(|t| *t <= now);
        self.stamps.insert(pos, now);
    }
}

pub struct MemoryCounterBackend {
    windows: DashMap<String, KeyLog>,
    clock: SharedClock,
}

impl MemoryCounterBackend {
    pub fn new(clock: SharedClock) -> Self {
        Self {
            windows: DashMap::new(),
            clock,
        }
    }

    pub fn key_count(&self) -> usize {
        self.windows.len()
    }

    /// Drop keys whose expiry has passed; returns how many were dropped.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.epoch_secs();
        let before = self.windows.len();
        self.windows.retain(|_, log| log.expires_at > now);
        let removed = before.saturating_sub(self.windows.len());
        if removed > 0 {
            tracing::debug!(removed, "Purged expired in-process rate limit keys");
        }
        removed
    }
}

impl CounterBackend for MemoryCounterBackend {
    async fn count_and_record(
        &self,
        key: &str,
        now: f64,
        window_secs: u64,
        ceiling: u64,
    ) -> RateLimitResult<WindowSnapshot> {
        let window = window_secs as f64;
        let mut entry = self.windows.entry(key.to_string()).or_default();
        let log = entry.value_mut();

        log.prune(now - window);
        let existing = log.stamps.len() as u64;
        if existing < ceiling {
            log.insert(now);
            log.expires_at = log.expires_at.max(now + window);
        }

        Ok(WindowSnapshot {
            count: existing + 1,
            oldest: log.stamps.front().copied(),
        })
    }

    async fn peek(&self, key: &str, now: f64, window_secs: u64) -> RateLimitResult<WindowSnapshot> {
        let floor = now - window_secs as f64;
        let Some(log) = self.windows.get(key) else {
            return Ok(WindowSnapshot::empty());
        };

        let mut in_window = log.stamps.iter().filter(|t| **t >= floor);
        let oldest = in_window.next().copied();
        let count = oldest.map_or(0, |_| 1 + in_window.count() as u64);
        Ok(WindowSnapshot { count, oldest })
    }

    async fn invalidate(&self, pattern: &str) -> RateLimitResult<u64> {
        let mut removed = 0u64;
        self.windows.retain(|key, _| {
            let hit = glob_match(pattern, key);
            if hit {
                removed += 1;
            }
            !hit
        });
        Ok(removed)
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

impl Sweep for MemoryCounterBackend {
    fn name(&self) -> &'static str {
        "rate_limit_memory"
    }

    fn sweep(&self) -> MonitorResult<usize> {
        Ok(self.purge_expired())
    }
}
