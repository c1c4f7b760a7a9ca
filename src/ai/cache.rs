//! Verdict cache - bounded memo of classification results
//!
//! Keyed by the normalized `service:message` signature. Bounded at a fixed
//! capacity; overflow evicts the single oldest-inserted entry (insertion
//! order FIFO, deliberately not LRU - a lookup never refreshes an entry's
//! position, and re-storing an existing key keeps its original slot).
//! No time-based expiry.

use std::collections::{HashMap, VecDeque};

use parking_lot::Mutex;

use crate::models::Verdict;

/// Bounded FIFO verdict cache, safe for concurrent lookup/store.
pub struct VerdictCache {
    inner: Mutex<CacheInner>,
    capacity: usize,
}

struct CacheInner {
    entries: HashMap<String, Verdict>,
    // Insertion order; front is the oldest key.
    order: VecDeque<String>,
}

impl VerdictCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(CacheInner {
                entries: HashMap::new(),
                order: VecDeque::new(),
            }),
            capacity: capacity.max(1),
        }
    }

    pub fn lookup(&self, key: &str) -> Option<Verdict> {
        self.inner.lock().entries.get(key).cloned()
    }

    /// Insert a verdict, evicting the oldest entry when over capacity.
    /// Insertion and eviction happen under one lock, so concurrent stores
    /// never push the cache past its bound.
    pub fn store(&self, key: &str, verdict: Verdict) {
        let mut inner = self.inner.lock();

        if inner.entries.insert(key.to_string(), verdict).is_none() {
            inner.order.push_back(key.to_string());
        }

        while inner.entries.len() > self.capacity {
            if let Some(oldest) = inner.order.pop_front() {
                inner.entries.remove(&oldest);
            } else {
                break;
            }
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
