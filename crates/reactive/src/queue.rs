//! Queue of warm, unsubscribed queries.
//!
//! Queries whose last callback was removed stay cached here so that a later
//! subscription or one-shot read can reuse them. When a capacity is set the
//! least recently used query is evicted.

use crate::query::QueryId;
use std::collections::BTreeMap;

/// LRU-ordered set of queued query ids.
#[derive(Debug, Default)]
pub struct Queue {
    /// Query id → last access tick.
    entries: BTreeMap<QueryId, u64>,
    /// Maximum number of queued queries, unbounded when `None`.
    capacity: Option<usize>,
    /// Global access counter for LRU tracking.
    access_counter: u64,
}

impl Queue {
    /// Creates a queue with the given capacity.
    pub fn new(capacity: Option<usize>) -> Self {
        Self {
            entries: BTreeMap::new(),
            capacity,
            access_counter: 0,
        }
    }

    /// Queues a query. Returns the ids evicted to make room, least recently
    /// used first.
    pub fn push(&mut self, id: QueryId) -> Vec<QueryId> {
        self.access_counter += 1;
        self.entries.insert(id, self.access_counter);

        let mut evicted = Vec::new();
        if let Some(capacity) = self.capacity {
            while self.entries.len() > capacity {
                match self.evict_lru() {
                    Some(lru) => evicted.push(lru),
                    None => break,
                }
            }
        }
        evicted
    }

    /// Marks a queued query as recently used.
    pub fn touch(&mut self, id: QueryId) -> bool {
        self.access_counter += 1;
        match self.entries.get_mut(&id) {
            Some(last_access) => {
                *last_access = self.access_counter;
                true
            }
            None => false,
        }
    }

    /// Removes a query from the queue.
    pub fn remove(&mut self, id: QueryId) -> bool {
        self.entries.remove(&id).is_some()
    }

    /// Returns true if the query is queued.
    #[inline]
    pub fn contains(&self, id: QueryId) -> bool {
        self.entries.contains_key(&id)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over queued ids.
    pub fn ids(&self) -> impl Iterator<Item = QueryId> + '_ {
        self.entries.keys().copied()
    }

    /// Removes all queued ids.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    fn evict_lru(&mut self) -> Option<QueryId> {
        let lru = self
            .entries
            .iter()
            .min_by_key(|(_, last_access)| **last_access)
            .map(|(id, _)| *id)?;
        self.entries.remove(&lru);
        Some(lru)
    }
}
