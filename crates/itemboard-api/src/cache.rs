use std::time::{Duration, Instant};

use moka::future::Cache;
use moka::policy::EvictionPolicy;

use itemboard_types::api::{CacheEntryStatus, CacheStatus};

const DEFAULT_CAPACITY: u64 = 256;
const DEFAULT_TTL: Duration = Duration::from_secs(60);

/// Bounded record of recently mutated items, keyed by item id. Only used for
/// `/api/cache-status` diagnostics; nothing reads through it.
#[derive(Clone)]
pub struct RecentCache {
    entries: Cache<String, Instant>,
}

impl RecentCache {
    pub fn new(capacity: u64, ttl: Duration) -> Self {
        let entries = Cache::builder()
            .max_capacity(capacity.max(1))
            .time_to_live(ttl)
            // Plain LRU: the newest mutation is always admitted.
            .eviction_policy(EvictionPolicy::lru())
            .build();

        Self { entries }
    }

    /// Note activity on `key`. Re-recording refreshes its age.
    pub async fn record(&self, key: impl Into<String>) {
        self.entries.insert(key.into(), Instant::now()).await;
    }

    /// Live entries, most recent first.
    pub async fn status(&self) -> CacheStatus {
        // Apply pending evictions so the listing respects the capacity.
        self.entries.run_pending_tasks().await;

        let now = Instant::now();
        let mut listed: Vec<CacheEntryStatus> = self
            .entries
            .iter()
            .map(|(key, at)| CacheEntryStatus {
                key: key.to_string(),
                age: now.duration_since(at).as_millis() as u64,
            })
            .collect();
        listed.sort_by_key(|e| e.age);

        CacheStatus {
            cache_size: listed.len(),
            entries: listed,
        }
    }
}

impl Default for RecentCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY, DEFAULT_TTL)
    }
}
