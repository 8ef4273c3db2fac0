//! Fast Tier
//!
//! Bounded in-process map guarded by a single mutex. Lookup, insertion,
//! expiry removal and eviction all happen inside one critical section so
//! concurrent workers never observe a half-applied eviction.

use std::collections::HashMap;
use std::sync::Mutex;

use serde_json::Value;

use super::CacheEntry;

struct Slot {
    entry: CacheEntry,
    /// Wall-clock time the entry entered this tier
    inserted_at_ms: i64,
    /// Tie-breaker for entries inserted within the same millisecond
    seq: u64,
}

#[derive(Default)]
struct Inner {
    slots: HashMap<String, Slot>,
    next_seq: u64,
}

/// Result of a fast-tier lookup
#[derive(Debug, Clone, PartialEq)]
pub enum FastLookup {
    Hit(Value),
    /// Entry existed but had expired; it has been removed
    Expired,
    Miss,
}

/// Bounded fast tier with oldest-insertion eviction
pub struct FastTier {
    inner: Mutex<Inner>,
    capacity: usize,
}

impl FastTier {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            capacity: capacity.max(1),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| {
            tracing::error!("Fast cache tier mutex poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Look up a key, removing it if expired
    pub fn get(&self, key: &str, now_ms: i64) -> FastLookup {
        let mut inner = self.lock();
        match inner.slots.get(key) {
            Some(slot) if slot.entry.is_expired(now_ms) => {
                inner.slots.remove(key);
                FastLookup::Expired
            }
            Some(slot) => FastLookup::Hit(slot.entry.value.clone()),
            None => FastLookup::Miss,
        }
    }

    /// Insert or replace an entry. Returns the key evicted to make room, if any.
    pub fn insert(&self, key: &str, entry: CacheEntry, now_ms: i64) -> Option<String> {
        let mut inner = self.lock();

        let evicted = if !inner.slots.contains_key(key) && inner.slots.len() >= self.capacity {
            let oldest = inner
                .slots
                .iter()
                .min_by_key(|(_, slot)| (slot.inserted_at_ms, slot.seq))
                .map(|(k, _)| k.clone());
            if let Some(ref oldest_key) = oldest {
                inner.slots.remove(oldest_key);
            }
            oldest
        } else {
            None
        };

        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.slots.insert(
            key.to_string(),
            Slot {
                entry,
                inserted_at_ms: now_ms,
                seq,
            },
        );

        evicted
    }

    pub fn remove(&self, key: &str) -> bool {
        self.lock().slots.remove(key).is_some()
    }

    pub fn clear(&self) -> usize {
        let mut inner = self.lock();
        let count = inner.slots.len();
        inner.slots.clear();
        count
    }

    /// Remove every expired entry, returning how many were removed
    pub fn sweep(&self, now_ms: i64) -> usize {
        let mut inner = self.lock();
        let before = inner.slots.len();
        inner.slots.retain(|_, slot| !slot.entry.is_expired(now_ms));
        before - inner.slots.len()
    }

    pub fn len(&self) -> usize {
        self.lock().slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
