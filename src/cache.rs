//! Two-tier cache: a bounded in-memory TTL tier fronting an embedded
//! persistent tier.
//!
//! Write policy: persistent first, then memory. Reads hit memory first and
//! promote persistent hits. Negative entries ("known unavailable") carry
//! their own short TTL in both tiers; the persistent tier has no native
//! expiry, so records are stamped and lazily reaped on read.

use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::CachePolicy;

/// A cached value or the distinguished "known unavailable" marker.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum CacheEntry<T> {
    Value(T),
    NotAvailable,
}

#[derive(Clone)]
struct MemEntry<T> {
    entry: CacheEntry<T>,
    ttl: Duration,
}

struct PerEntryExpiry;

impl<T> moka::Expiry<String, MemEntry<T>> for PerEntryExpiry
where
    T: Clone + Send + Sync + 'static,
{
    fn expire_after_create(
        &self,
        _key: &String,
        value: &MemEntry<T>,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

/// Persistent record wrapper; `ttl_secs = None` means "until overwritten".
#[derive(Serialize, Deserialize)]
struct StoredRecord<T> {
    entry: CacheEntry<T>,
    written_at: u64,
    ttl_secs: Option<u64>,
}

fn now_unix() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Memory tier + persistent tier behind one small interface.
pub struct TieredCache<T>
where
    T: Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
{
    memory: moka::future::Cache<String, MemEntry<T>>,
    persistent: sled::Tree,
    ttl: Duration,
    negative_ttl: Duration,
}

impl<T> TieredCache<T>
where
    T: Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
{
    pub fn new(persistent: sled::Tree, policy: &CachePolicy) -> Self {
        let memory = moka::future::Cache::builder()
            .max_capacity(policy.max_entries)
            .expire_after(PerEntryExpiry)
            .build();
        Self {
            memory,
            persistent,
            ttl: policy.ttl,
            negative_ttl: policy.negative_ttl,
        }
    }

    /// Memory first; on miss, persistent with promotion into memory.
    pub async fn get(&self, key: &str) -> Option<CacheEntry<T>> {
        if let Some(hit) = self.memory.get(key).await {
            return Some(hit.entry);
        }

        let entry = self.read_persistent(key)?;
        self.promote(key, entry.clone()).await;
        Some(entry)
    }

    /// Persistent tier only, no promotion. Used for the legacy transcript
    /// key, which belongs to the engine rather than to the cache.
    pub fn get_persistent(&self, key: &str) -> Option<CacheEntry<T>> {
        self.read_persistent(key)
    }

    /// Insert into the memory tier only, with the TTL the entry kind calls for.
    pub async fn promote(&self, key: &str, entry: CacheEntry<T>) {
        let ttl = match &entry {
            CacheEntry::Value(_) => self.ttl,
            CacheEntry::NotAvailable => self.negative_ttl,
        };
        self.memory
            .insert(key.to_string(), MemEntry { entry, ttl })
            .await;
    }

    /// Store a successful result: persistent first, then memory.
    pub async fn put(&self, key: &str, value: T) {
        self.write_persistent(key, &CacheEntry::Value(value.clone()), None);
        self.promote(key, CacheEntry::Value(value)).await;
    }

    /// Store the "known unavailable" marker with the short TTL, both tiers.
    pub async fn put_negative(&self, key: &str) {
        self.write_persistent(
            key,
            &CacheEntry::NotAvailable,
            Some(self.negative_ttl.as_secs()),
        );
        self.promote(key, CacheEntry::NotAvailable).await;
    }

    /// Store a value that should expire on the negative schedule rather
    /// than the success one (e.g. the empty comment list written after a
    /// permanent block).
    pub async fn put_short(&self, key: &str, value: T) {
        self.write_persistent(
            key,
            &CacheEntry::Value(value.clone()),
            Some(self.negative_ttl.as_secs()),
        );
        self.memory
            .insert(
                key.to_string(),
                MemEntry {
                    entry: CacheEntry::Value(value),
                    ttl: self.negative_ttl,
                },
            )
            .await;
    }

    fn read_persistent(&self, key: &str) -> Option<CacheEntry<T>> {
        let bytes = match self.persistent.get(key.as_bytes()) {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return None,
            Err(e) => {
                warn!(key, error = %e, "persistent cache read failed");
                return None;
            }
        };

        let record: StoredRecord<T> = match serde_json::from_slice(&bytes) {
            Ok(record) => record,
            Err(_) => {
                // Unreadable record (format drift); drop it.
                let _ = self.persistent.remove(key.as_bytes());
                return None;
            }
        };

        if let Some(ttl_secs) = record.ttl_secs {
            if now_unix() >= record.written_at.saturating_add(ttl_secs) {
                let _ = self.persistent.remove(key.as_bytes());
                return None;
            }
        }

        Some(record.entry)
    }

    fn write_persistent(&self, key: &str, entry: &CacheEntry<T>, ttl_secs: Option<u64>) {
        let record = StoredRecord {
            entry: entry.clone(),
            written_at: now_unix(),
            ttl_secs,
        };
        match serde_json::to_vec(&record) {
            Ok(bytes) => {
                if let Err(e) = self.persistent.insert(key.as_bytes(), bytes) {
                    warn!(key, error = %e, "persistent cache write failed");
                }
            }
            Err(e) => warn!(key, error = %e, "persistent cache serialization failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_cache(ttl: Duration, negative_ttl: Duration) -> (TieredCache<String>, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let db = sled::open(dir.path().join("cache")).unwrap();
        let tree = db.open_tree("test").unwrap();
        let cache = TieredCache::new(
            tree,
            &CachePolicy {
                max_entries: 16,
                ttl,
                negative_ttl,
            },
        );
        (cache, dir)
    }

    #[tokio::test]
    async fn test_put_then_get_round_trips() {
        let (cache, _dir) = test_cache(Duration::from_secs(60), Duration::from_secs(1));
        cache.put("k", "hello".to_string()).await;
        assert_eq!(
            cache.get("k").await,
            Some(CacheEntry::Value("hello".to_string()))
        );
    }

    #[tokio::test]
    async fn test_persistent_hit_promotes_into_memory() {
        let (cache, _dir) = test_cache(Duration::from_secs(60), Duration::from_secs(1));
        cache.put("k", "hello".to_string()).await;

        // Drop the memory copy; the persistent tier should refill it.
        cache.memory.invalidate("k").await;
        assert_eq!(
            cache.get("k").await,
            Some(CacheEntry::Value("hello".to_string()))
        );
        assert!(cache.memory.get("k").await.is_some());
    }

    #[tokio::test]
    async fn test_negative_entry_expires() {
        let (cache, _dir) = test_cache(Duration::from_secs(60), Duration::from_secs(1));
        cache.put_negative("k").await;
        assert_eq!(cache.get("k").await, Some(CacheEntry::NotAvailable));

        tokio::time::sleep(Duration::from_millis(1100)).await;
        // Memory TTL elapsed; the stamped persistent record is expired too.
        assert_eq!(cache.get("k").await, None);
    }

    #[tokio::test]
    async fn test_last_writer_wins() {
        let (cache, _dir) = test_cache(Duration::from_secs(60), Duration::from_secs(1));
        cache.put("k", "one".to_string()).await;
        cache.put("k", "two".to_string()).await;
        assert_eq!(
            cache.get("k").await,
            Some(CacheEntry::Value("two".to_string()))
        );
    }

    #[tokio::test]
    async fn test_value_overwrites_negative() {
        let (cache, _dir) = test_cache(Duration::from_secs(60), Duration::from_secs(30));
        cache.put_negative("k").await;
        cache.put("k", "found".to_string()).await;
        assert_eq!(
            cache.get("k").await,
            Some(CacheEntry::Value("found".to_string()))
        );
    }

    #[tokio::test]
    async fn test_short_ttl_value_expires_in_persistent_tier() {
        let (cache, _dir) = test_cache(Duration::from_secs(60), Duration::from_secs(1));
        cache.put_short("k", "blocked".to_string()).await;
        assert_eq!(
            cache.get("k").await,
            Some(CacheEntry::Value("blocked".to_string()))
        );

        tokio::time::sleep(Duration::from_millis(1100)).await;
        assert_eq!(cache.get("k").await, None);
    }

    #[tokio::test]
    async fn test_legacy_read_does_not_promote() {
        let (cache, _dir) = test_cache(Duration::from_secs(60), Duration::from_secs(1));
        cache.put("legacy", "old".to_string()).await;
        cache.memory.invalidate("legacy").await;

        assert_eq!(
            cache.get_persistent("legacy"),
            Some(CacheEntry::Value("old".to_string()))
        );
        assert!(cache.memory.get("legacy").await.is_none());
    }
}
