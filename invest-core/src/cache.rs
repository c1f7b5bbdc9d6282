//! Bounded key/value cache with per-entry expiry.
//!
//! Used for similarity-search results and for memoized judge output. Entries
//! older than the ttl are treated as absent and evicted when touched; the
//! least-recently-used entry is dropped when a new key arrives at capacity.

use lru::LruCache;
use serde::Serialize;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

/// Number of keys included in [`CacheStats::sample_keys`].
const STATS_SAMPLE: usize = 10;

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    inserted_at: Instant,
}

/// Snapshot of a cache for diagnostics.
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub size: usize,
    pub capacity: usize,
    pub ttl_secs: u64,
    pub hits: u64,
    pub misses: u64,
    pub sample_keys: Vec<String>,
}

impl CacheStats {
    /// Fraction of lookups that were hits, 0.0 when nothing was looked up.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// TTL + LRU cache safe to share between concurrent request flows.
pub struct TtlCache<V> {
    name: &'static str,
    entries: Mutex<LruCache<String, CacheEntry<V>>>,
    capacity: usize,
    ttl: Duration,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<V: Clone> TtlCache<V> {
    /// Create a cache holding at most `max_size` entries for `ttl` each.
    ///
    /// A `max_size` of zero is treated as one.
    pub fn new(name: &'static str, max_size: usize, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(max_size).unwrap_or(NonZeroUsize::MIN);
        Self {
            name,
            entries: Mutex::new(LruCache::new(capacity)),
            capacity: capacity.get(),
            ttl,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Look up a live entry and mark it most recently used.
    pub async fn get(&self, key: &str) -> Option<V> {
        let mut entries = self.entries.lock().await;

        let expired = match entries.peek(key) {
            Some(entry) => entry.inserted_at.elapsed() > self.ttl,
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                return None;
            }
        };

        if expired {
            entries.pop(key);
            self.misses.fetch_add(1, Ordering::Relaxed);
            debug!(cache = self.name, key, "expired entry evicted on access");
            return None;
        }

        self.hits.fetch_add(1, Ordering::Relaxed);
        entries.get(key).map(|entry| entry.value.clone())
    }

    /// Insert or refresh an entry, evicting the LRU entry if the cache is full.
    pub async fn set(&self, key: impl Into<String>, value: V) {
        let key = key.into();
        let mut entries = self.entries.lock().await;
        let entry = CacheEntry {
            value,
            inserted_at: Instant::now(),
        };
        // push hands back either the replaced entry or the evicted LRU one
        if let Some((evicted, _)) = entries.push(key.clone(), entry) {
            if evicted != key {
                debug!(cache = self.name, key = %evicted, "evicted");
            }
        }
    }

    /// Remove every expired entry. Returns how many were removed.
    pub async fn sweep_expired(&self) -> usize {
        let mut entries = self.entries.lock().await;

        let expired: Vec<String> = entries
            .iter()
            .filter(|(_, entry)| entry.inserted_at.elapsed() > self.ttl)
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired {
            entries.pop(key);
        }
        expired.len()
    }

    pub async fn clear(&self) {
        self.entries.lock().await.clear();
    }

    pub async fn size(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn stats(&self) -> CacheStats {
        let entries = self.entries.lock().await;
        CacheStats {
            size: entries.len(),
            capacity: self.capacity,
            ttl_secs: self.ttl.as_secs(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            sample_keys: entries
                .iter()
                .take(STATS_SAMPLE)
                .map(|(key, _)| key.clone())
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache(max: usize, ttl_secs: u64) -> TtlCache<u32> {
        TtlCache::new("test", max, Duration::from_secs(ttl_secs))
    }

    #[tokio::test]
    async fn test_set_then_get() {
        let c = cache(4, 60);
        c.set("a", 1).await;
        c.set("b", 2).await;
        assert_eq!(c.get("a").await, Some(1));
        assert_eq!(c.get("b").await, Some(2));
        assert_eq!(c.get("missing").await, None);
    }

    #[tokio::test]
    async fn test_set_refreshes_value() {
        let c = cache(4, 60);
        c.set("a", 1).await;
        c.set("a", 7).await;
        assert_eq!(c.get("a").await, Some(7));
        assert_eq!(c.size().await, 1);
    }

    #[tokio::test]
    async fn test_lru_eviction_follows_access_order() {
        let c = cache(3, 60);
        c.set("a", 1).await;
        c.set("b", 2).await;
        c.set("c", 3).await;

        // Touch "a" so "b" becomes the least recently used.
        assert_eq!(c.get("a").await, Some(1));
        c.set("d", 4).await;

        assert_eq!(c.get("b").await, None);
        assert_eq!(c.get("a").await, Some(1));
        assert_eq!(c.get("c").await, Some(3));
        assert_eq!(c.get("d").await, Some(4));
        assert_eq!(c.size().await, 3);
    }

    #[tokio::test]
    async fn test_zero_capacity_holds_one() {
        let c = cache(0, 60);
        c.set("a", 1).await;
        c.set("b", 2).await;
        assert_eq!(c.size().await, 1);
        assert_eq!(c.get("b").await, Some(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_entry_is_absent() {
        let c = cache(4, 10);
        c.set("a", 1).await;

        tokio::time::advance(Duration::from_secs(5)).await;
        assert_eq!(c.get("a").await, Some(1));

        tokio::time::advance(Duration::from_secs(6)).await;
        assert_eq!(c.get("a").await, None);
        assert_eq!(c.size().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_expired() {
        let c = cache(8, 10);
        c.set("old1", 1).await;
        c.set("old2", 2).await;
        tokio::time::advance(Duration::from_secs(8)).await;
        c.set("fresh", 3).await;
        tokio::time::advance(Duration::from_secs(3)).await;

        assert_eq!(c.sweep_expired().await, 2);
        assert_eq!(c.size().await, 1);
        assert_eq!(c.get("fresh").await, Some(3));
    }

    #[tokio::test]
    async fn test_stats_and_clear() {
        let c = cache(20, 60);
        for i in 0..15 {
            c.set(format!("k{i}"), i).await;
        }
        c.get("k1").await;
        c.get("nope").await;

        let stats = c.stats().await;
        assert_eq!(stats.size, 15);
        assert_eq!(stats.capacity, 20);
        assert_eq!(stats.ttl_secs, 60);
        assert_eq!(stats.sample_keys.len(), STATS_SAMPLE);
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert!((stats.hit_rate() - 0.5).abs() < f64::EPSILON);

        c.clear().await;
        assert_eq!(c.size().await, 0);
    }

    #[tokio::test]
    async fn test_concurrent_access() {
        let c = std::sync::Arc::new(cache(1000, 60));
        let tasks: Vec<_> = (0..16u32)
            .map(|i| {
                let c = c.clone();
                tokio::spawn(async move {
                    c.set(format!("k{i}"), i).await;
                    c.get(&format!("k{i}")).await
                })
            })
            .collect();

        for (i, task) in futures::future::join_all(tasks).await.into_iter().enumerate() {
            assert_eq!(task.unwrap(), Some(i as u32));
        }
        assert_eq!(c.size().await, 16);
    }
}
