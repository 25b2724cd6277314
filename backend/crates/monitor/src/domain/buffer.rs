//! Bounded rolling buffer

use super::entities::Timestamped;
use chrono::{DateTime, Utc};
use std::collections::VecDeque;

/// FIFO buffer holding at most `capacity` records.
///
/// Pushing past capacity evicts the oldest insertions. Records can also be
/// dropped by age with [`BoundedLog::purge_older_than`].
#[derive(Debug)]
pub struct BoundedLog<T> {
    entries: VecDeque<T>,
    capacity: usize,
}

impl<T: Timestamped> BoundedLog<T> {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
        }
    }

    /// Append a record; returns how many old records were evicted.
    pub fn push(&mut self, item: T) -> usize {
        self.entries.push_back(item);
        let mut evicted = 0;
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
            evicted += 1;
        }
        evicted
    }

    /// Drop records with `timestamp <= cutoff`; returns how many were dropped.
    pub fn purge_older_than(&mut self, cutoff: DateTime<Utc>) -> usize {
        let before = self.entries.len();
        self.entries.retain(|e| e.timestamp() > cutoff);
        before - self.entries.len()
    }

    /// Records newer than `cutoff`, oldest first.
    pub fn since(&self, cutoff: DateTime<Utc>) -> impl Iterator<Item = &T> {
        self.entries.iter().filter(move |e| e.timestamp() > cutoff)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
