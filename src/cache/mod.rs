//! Two-Tier TTL Cache
//!
//! Caches generation and search responses across concurrent pipeline workers.
//!
//! ## Tiers
//!
//! 1. **Fast tier**: bounded in-process map, evicts the oldest insertion when full
//! 2. **Durable tier**: unbounded JSON files keyed by a digest of the raw key
//!
//! `set` writes both tiers. `get` checks the fast tier, then the durable tier,
//! promoting durable hits back into the fast tier. Expired entries are never
//! returned and are deleted by whichever access discovers them.
//!
//! ## Usage
//!
//! ```ignore
//! let cache = TieredCache::new(1000, Some(cache_dir), Duration::from_secs(3600));
//! cache.set("prompt text", json!("response"), None).await?;
//! let hit = cache.get("prompt text").await?;
//! ```

mod durable;
mod memory;

pub use durable::{DurableRead, DurableTier, digest_key};
pub use memory::{FastLookup, FastTier};

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::CacheConfig;
use crate::types::Result;

// =============================================================================
// Clock
// =============================================================================

/// Time source for entry timestamps and expiry checks
pub trait Clock: Send + Sync {
    /// Milliseconds since the Unix epoch
    fn now_millis(&self) -> i64;
}

pub type SharedClock = Arc<dyn Clock>;

/// Wall-clock time
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

/// Manually advanced clock for deterministic expiry
#[derive(Debug, Default)]
pub struct ManualClock {
    now_ms: AtomicI64,
}

impl ManualClock {
    pub fn new(start_ms: i64) -> Self {
        Self {
            now_ms: AtomicI64::new(start_ms),
        }
    }

    pub fn advance(&self, by: Duration) {
        self.now_ms
            .fetch_add(by.as_millis() as i64, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> i64 {
        self.now_ms.load(Ordering::SeqCst)
    }
}

// =============================================================================
// Cache Entry
// =============================================================================

/// Cached value with its creation time and time-to-live
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub value: Value,
    pub created_at_ms: i64,
    pub ttl_ms: u64,
}

impl CacheEntry {
    /// An entry is expired once `now - created >= ttl`
    pub fn is_expired(&self, now_ms: i64) -> bool {
        let age_ms = now_ms.saturating_sub(self.created_at_ms);
        age_ms >= i64::try_from(self.ttl_ms).unwrap_or(i64::MAX)
    }
}

/// Whole milliseconds in `duration`, saturating at `u64::MAX`
fn duration_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

// =============================================================================
// Statistics
// =============================================================================

#[derive(Debug, Default)]
struct CacheCounters {
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

/// Cache statistics snapshot
#[derive(Debug, Clone, Default, Serialize)]
pub struct CacheStats {
    pub fast_entries: usize,
    pub fast_capacity: usize,
    pub durable_entries: usize,
    pub durable_bytes: u64,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

impl CacheStats {
    /// Hit rate in [0, 1]
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

// =============================================================================
// Tiered Cache
// =============================================================================

pub type SharedCache = Arc<TieredCache>;

/// Fast tier backed by an optional durable tier
pub struct TieredCache {
    fast: FastTier,
    durable: Option<DurableTier>,
    clock: SharedClock,
    default_ttl: Duration,
    counters: CacheCounters,
}

impl TieredCache {
    pub fn new(max_entries: usize, durable_dir: Option<PathBuf>, default_ttl: Duration) -> Self {
        Self {
            fast: FastTier::new(max_entries),
            durable: durable_dir.map(DurableTier::new),
            clock: Arc::new(SystemClock),
            default_ttl,
            counters: CacheCounters::default(),
        }
    }

    /// Build from configuration; `dir` is used only when persistence is on
    pub fn from_config(config: &CacheConfig, dir: PathBuf) -> Self {
        let durable_dir = config.persist.then_some(dir);
        Self::new(config.max_entries, durable_dir, config.ttl())
    }

    /// Replace the time source
    pub fn with_clock(mut self, clock: SharedClock) -> Self {
        self.clock = clock;
        self
    }

    fn now(&self) -> i64 {
        self.clock.now_millis()
    }

    /// Store a value in both tiers
    pub async fn set(&self, key: &str, value: Value, ttl: Option<Duration>) -> Result<()> {
        let now = self.now();
        let entry = CacheEntry {
            value,
            created_at_ms: now,
            ttl_ms: duration_millis(ttl.unwrap_or(self.default_ttl)),
        };

        if let Some(evicted) = self.fast.insert(key, entry.clone(), now) {
            self.counters.evictions.fetch_add(1, Ordering::Relaxed);
            debug!(evicted_len = evicted.len(), "Evicted oldest fast-tier entry");
        }

        if let Some(durable) = &self.durable {
            durable.write(key, &entry).await?;
        }

        Ok(())
    }

    /// Fetch an unexpired value, checking the fast tier first
    pub async fn get(&self, key: &str) -> Result<Option<Value>> {
        let now = self.now();

        match self.fast.get(key, now) {
            FastLookup::Hit(value) => {
                self.counters.hits.fetch_add(1, Ordering::Relaxed);
                return Ok(Some(value));
            }
            FastLookup::Expired => debug!("Fast-tier entry expired"),
            FastLookup::Miss => {}
        }

        let Some(durable) = &self.durable else {
            self.counters.misses.fetch_add(1, Ordering::Relaxed);
            return Ok(None);
        };

        match durable.read(key).await? {
            DurableRead::Found(entry) if !entry.is_expired(now) => {
                let value = entry.value.clone();
                if self.fast.insert(key, entry, now).is_some() {
                    self.counters.evictions.fetch_add(1, Ordering::Relaxed);
                }
                self.counters.hits.fetch_add(1, Ordering::Relaxed);
                Ok(Some(value))
            }
            DurableRead::Found(_) => {
                debug!("Durable entry expired, removing");
                durable.remove(key).await?;
                self.counters.misses.fetch_add(1, Ordering::Relaxed);
                Ok(None)
            }
            DurableRead::Corrupt(reason) => {
                warn!("Discarding corrupt durable cache entry: {}", reason);
                durable.remove(key).await?;
                self.counters.misses.fetch_add(1, Ordering::Relaxed);
                Ok(None)
            }
            DurableRead::Missing => {
                self.counters.misses.fetch_add(1, Ordering::Relaxed);
                Ok(None)
            }
        }
    }

    /// Store any serializable value
    pub async fn set_as<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        ttl: Option<Duration>,
    ) -> Result<()> {
        self.set(key, serde_json::to_value(value)?, ttl).await
    }

    /// Fetch and deserialize; a value of the wrong shape counts as a miss
    pub async fn get_as<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.get(key).await? {
            Some(value) => match serde_json::from_value(value) {
                Ok(typed) => Ok(Some(typed)),
                Err(e) => {
                    warn!("Cached value has unexpected shape, ignoring: {}", e);
                    Ok(None)
                }
            },
            None => Ok(None),
        }
    }

    /// Remove a key from both tiers
    pub async fn delete(&self, key: &str) -> Result<bool> {
        let in_fast = self.fast.remove(key);
        let in_durable = match &self.durable {
            Some(durable) => durable.remove(key).await?,
            None => false,
        };
        Ok(in_fast || in_durable)
    }

    /// Remove everything from both tiers
    pub async fn clear(&self) -> Result<usize> {
        let mut removed = self.fast.clear();
        if let Some(durable) = &self.durable {
            removed += durable.clear().await?;
        }
        info!("Cleared {} cache entries", removed);
        Ok(removed)
    }

    /// Purge expired entries from both tiers.
    ///
    /// Unreadable durable files count as expired. The returned count sums both
    /// tiers, so a key present in both counts twice.
    pub async fn sweep_expired(&self) -> Result<usize> {
        let now = self.now();
        let mut removed = self.fast.sweep(now);
        if let Some(durable) = &self.durable {
            removed += durable.sweep(now).await?;
        }
        if removed > 0 {
            info!("Swept {} expired cache entries", removed);
        }
        Ok(removed)
    }

    pub async fn stats(&self) -> Result<CacheStats> {
        let (durable_entries, durable_bytes) = match &self.durable {
            Some(durable) => durable.usage().await?,
            None => (0, 0),
        };

        Ok(CacheStats {
            fast_entries: self.fast.len(),
            fast_capacity: self.fast.capacity(),
            durable_entries,
            durable_bytes,
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            evictions: self.counters.evictions.load(Ordering::Relaxed),
        })
    }

    pub fn durable_dir(&self) -> Option<&std::path::Path> {
        self.durable.as_ref().map(|d| d.dir())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn cache_with_clock(
        max_entries: usize,
        dir: Option<PathBuf>,
    ) -> (TieredCache, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(1_000_000));
        let cache = TieredCache::new(max_entries, dir, Duration::from_secs(3600))
            .with_clock(clock.clone());
        (cache, clock)
    }

    #[tokio::test]
    async fn test_set_then_get() {
        let temp_dir = TempDir::new().unwrap();
        let (cache, _) = cache_with_clock(10, Some(temp_dir.path().to_path_buf()));

        cache.set("k", json!("v"), None).await.unwrap();
        assert_eq!(cache.get("k").await.unwrap(), Some(json!("v")));
    }

    #[tokio::test]
    async fn test_expired_entry_never_returned() {
        let temp_dir = TempDir::new().unwrap();
        let (cache, clock) = cache_with_clock(10, Some(temp_dir.path().to_path_buf()));

        cache
            .set("k", json!("v"), Some(Duration::from_secs(5)))
            .await
            .unwrap();
        clock.advance(Duration::from_secs(4));
        assert!(cache.get("k").await.unwrap().is_some());

        clock.advance(Duration::from_secs(1));
        assert_eq!(cache.get("k").await.unwrap(), None);

        // Both tiers were purged by the access that found the expiry
        let stats = cache.stats().await.unwrap();
        assert_eq!(stats.fast_entries, 0);
        assert_eq!(stats.durable_entries, 0);
    }

    #[tokio::test]
    async fn test_sub_second_ttl_is_kept() {
        let (cache, clock) = cache_with_clock(10, None);

        cache
            .set("brief", json!("v"), Some(Duration::from_millis(500)))
            .await
            .unwrap();
        clock.advance(Duration::from_millis(499));
        assert_eq!(cache.get("brief").await.unwrap(), Some(json!("v")));

        clock.advance(Duration::from_millis(1));
        assert_eq!(cache.get("brief").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_durable_hit_promotes_into_fast_tier() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().to_path_buf();
        let (writer, _) = cache_with_clock(10, Some(dir.clone()));
        writer.set("shared", json!([1, 2, 3]), None).await.unwrap();

        // A fresh instance over the same directory starts with an empty fast tier
        let (reader, _) = cache_with_clock(10, Some(dir));
        assert_eq!(reader.stats().await.unwrap().fast_entries, 0);

        assert_eq!(reader.get("shared").await.unwrap(), Some(json!([1, 2, 3])));
        assert_eq!(reader.stats().await.unwrap().fast_entries, 1);
    }

    #[tokio::test]
    async fn test_full_fast_tier_evicts_oldest_insertion() {
        let (cache, clock) = cache_with_clock(2, None);

        cache.set("first", json!(1), None).await.unwrap();
        clock.advance(Duration::from_millis(10));
        cache.set("second", json!(2), None).await.unwrap();
        clock.advance(Duration::from_millis(10));

        // Touching "first" does not change its insertion timestamp
        assert!(cache.get("first").await.unwrap().is_some());
        cache.set("third", json!(3), None).await.unwrap();

        assert_eq!(cache.get("first").await.unwrap(), None);
        assert_eq!(cache.get("second").await.unwrap(), Some(json!(2)));
        assert_eq!(cache.get("third").await.unwrap(), Some(json!(3)));
        assert_eq!(cache.stats().await.unwrap().evictions, 1);
    }

    #[tokio::test]
    async fn test_corrupt_durable_entry_is_miss() {
        let temp_dir = TempDir::new().unwrap();
        let (cache, _) = cache_with_clock(10, Some(temp_dir.path().to_path_buf()));

        let path = temp_dir.path().join(format!("{}.json", digest_key("broken")));
        std::fs::write(&path, "not json at all").unwrap();

        assert_eq!(cache.get("broken").await.unwrap(), None);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_sweep_expired_reports_count() {
        let temp_dir = TempDir::new().unwrap();
        let (cache, clock) = cache_with_clock(10, Some(temp_dir.path().to_path_buf()));

        cache
            .set("short", json!(1), Some(Duration::from_secs(1)))
            .await
            .unwrap();
        cache.set("long", json!(2), None).await.unwrap();
        std::fs::write(temp_dir.path().join("junk.json"), "{").unwrap();

        clock.advance(Duration::from_secs(2));
        // short: fast + durable, junk: durable
        assert_eq!(cache.sweep_expired().await.unwrap(), 3);
        assert_eq!(cache.get("long").await.unwrap(), Some(json!(2)));
    }

    #[tokio::test]
    async fn test_typed_roundtrip_and_delete() {
        let (cache, _) = cache_with_clock(10, None);

        cache
            .set_as("texts", &vec!["a".to_string(), "b".to_string()], None)
            .await
            .unwrap();
        let texts: Option<Vec<String>> = cache.get_as("texts").await.unwrap();
        assert_eq!(texts, Some(vec!["a".to_string(), "b".to_string()]));

        let wrong: Option<u32> = cache.get_as("texts").await.unwrap();
        assert_eq!(wrong, None);

        assert!(cache.delete("texts").await.unwrap());
        assert!(!cache.delete("texts").await.unwrap());
    }

    #[tokio::test]
    async fn test_concurrent_access_from_many_tasks() {
        let temp_dir = TempDir::new().unwrap();
        let (cache, _) = cache_with_clock(8, Some(temp_dir.path().to_path_buf()));
        let cache = Arc::new(cache);

        let handles: Vec<_> = (0..16)
            .map(|i| {
                let cache = Arc::clone(&cache);
                tokio::spawn(async move {
                    let key = format!("key-{}", i);
                    cache.set(&key, json!(i), None).await.unwrap();
                    cache.get(&key).await.unwrap()
                })
            })
            .collect();

        for handle in handles {
            assert!(handle.await.unwrap().is_some());
        }

        let stats = cache.stats().await.unwrap();
        assert!(stats.fast_entries <= 8);
        assert_eq!(stats.durable_entries, 16);
    }

    #[test]
    fn test_entry_expiry_boundary() {
        let entry = CacheEntry {
            value: json!(null),
            created_at_ms: 0,
            ttl_ms: 1000,
        };
        assert!(!entry.is_expired(999));
        assert!(entry.is_expired(1000));
    }
}
