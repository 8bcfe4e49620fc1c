//! In-memory TTL cache
//!
//! Shared by the token resolver and the link verifier. Entries live for the
//! process only; concurrent writers race with last-writer-wins.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::RwLock;
use std::time::{Duration, Instant};

/// Default lifetime for cached resolution and verification results
pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

/// Entry count at which an insert first sweeps out expired entries
pub const PURGE_THRESHOLD: usize = 1024;

struct Entry<V> {
    value: V,
    inserted: Instant,
}

/// Thread-safe map whose entries expire after a fixed TTL
pub struct TtlCache<K, V> {
    ttl: Duration,
    purge_threshold: usize,
    entries: RwLock<HashMap<K, Entry<V>>>,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            purge_threshold: PURGE_THRESHOLD,
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn with_purge_threshold(mut self, threshold: usize) -> Self {
        self.purge_threshold = threshold.max(1);
        self
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Fresh value for `key`, if any. Expired entries are dropped lazily.
    pub fn get(&self, key: &K) -> Option<V> {
        {
            let entries = self.entries.read().ok()?;
            match entries.get(key) {
                Some(entry) if entry.inserted.elapsed() < self.ttl => {
                    return Some(entry.value.clone());
                }
                Some(_) => {}
                None => return None,
            }
        }

        if let Ok(mut entries) = self.entries.write() {
            if entries
                .get(key)
                .is_some_and(|e| e.inserted.elapsed() >= self.ttl)
            {
                entries.remove(key);
            }
        }
        None
    }

    /// Store `value`. Once the map holds `purge_threshold` entries, expired
    /// ones are swept out first so keys that are never read again don't pile up.
    pub fn insert(&self, key: K, value: V) {
        if let Ok(mut entries) = self.entries.write() {
            if entries.len() >= self.purge_threshold {
                let ttl = self.ttl;
                entries.retain(|_, e| e.inserted.elapsed() < ttl);
            }
            entries.insert(
                key,
                Entry {
                    value,
                    inserted: Instant::now(),
                },
            );
        }
    }

    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.write() {
            entries.clear();
        }
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<K, V> Default for TtlCache<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}
