//! Cache contract and the in-process tier.

use std::fmt;
use std::sync::RwLock;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use lru::LruCache;
use metrics::counter;
use tracing::debug;

use crate::domain::fields::SearchResult;

use super::config::CacheConfig;
use super::lock::{rw_read, rw_write};

const SOURCE: &str = "cache::store";

const METRIC_CACHE_HIT: &str = "field_search_cache_hit_total";
const METRIC_CACHE_MISS: &str = "field_search_cache_miss_total";
const METRIC_CACHE_EVICT: &str = "field_search_cache_evict_total";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheTier {
    Local,
    Shared,
}

impl CacheTier {
    pub fn as_str(self) -> &'static str {
        match self {
            CacheTier::Local => "local",
            CacheTier::Shared => "shared",
        }
    }
}

impl fmt::Display for CacheTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Contract implemented by every cache tier.
///
/// Operations never fail from the caller's point of view: a tier that cannot
/// serve a request reports a miss and logs the cause.
#[async_trait]
pub trait SearchCache: Send + Sync {
    fn tier(&self) -> CacheTier;

    async fn get(&self, key: &str) -> Option<SearchResult>;

    /// Store `value` under `key` with the tier's fixed TTL, replacing any
    /// previous entry.
    async fn set(&self, key: &str, value: &SearchResult);

    async fn delete(&self, key: &str);

    /// Drop every search entry held by the tier.
    async fn clear(&self);
}

pub(crate) fn record_lookup(tier: CacheTier, hit: bool) {
    let name = if hit { METRIC_CACHE_HIT } else { METRIC_CACHE_MISS };
    counter!(name, "tier" => tier.as_str()).increment(1);
}

struct LocalEntry {
    value: SearchResult,
    /// `None` when the TTL reaches past what `Instant` can represent.
    expires_at: Option<Instant>,
}

impl LocalEntry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|expires_at| expires_at > now)
    }
}

/// In-process TTL cache.
///
/// Entries live in an LRU map bounded by `local_capacity`; expiry is checked
/// lazily on read. The lock is never held across an `.await`.
pub struct LocalCache {
    ttl: Duration,
    entries: RwLock<LruCache<String, LocalEntry>>,
}

impl LocalCache {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            ttl: config.ttl,
            entries: RwLock::new(LruCache::new(config.local_capacity_non_zero())),
        }
    }

    fn lookup(&self, key: &str) -> Option<SearchResult> {
        let mut entries = rw_write(&self.entries, SOURCE, "local_get");
        let expired = match entries.get(key) {
            Some(entry) if entry.is_live(Instant::now()) => return Some(entry.value.clone()),
            Some(_) => true,
            None => false,
        };
        if expired {
            entries.pop(key);
        }
        None
    }

    fn store(&self, key: &str, value: &SearchResult) {
        let entry = LocalEntry {
            value: value.clone(),
            expires_at: Instant::now().checked_add(self.ttl),
        };
        let evicted = rw_write(&self.entries, SOURCE, "local_set").push(key.to_string(), entry);
        // `push` also hands back the replaced entry when the key already existed.
        if evicted.is_some_and(|(evicted_key, _)| evicted_key != key) {
            counter!(METRIC_CACHE_EVICT, "tier" => CacheTier::Local.as_str()).increment(1);
        }
    }

    /// Number of entries currently held, expired ones included.
    pub fn len(&self) -> usize {
        rw_read(&self.entries, SOURCE, "local_len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl SearchCache for LocalCache {
    fn tier(&self) -> CacheTier {
        CacheTier::Local
    }

    async fn get(&self, key: &str) -> Option<SearchResult> {
        let found = self.lookup(key);
        record_lookup(self.tier(), found.is_some());
        if found.is_some() {
            debug!(cache_key = key, tier = %self.tier(), "Cache hit");
        }
        found
    }

    async fn set(&self, key: &str, value: &SearchResult) {
        self.store(key, value);
        debug!(cache_key = key, tier = %self.tier(), "Cache set");
    }

    async fn delete(&self, key: &str) {
        rw_write(&self.entries, SOURCE, "local_delete").pop(key);
        debug!(cache_key = key, tier = %self.tier(), "Cache delete");
    }

    async fn clear(&self) {
        rw_write(&self.entries, SOURCE, "local_clear").clear();
        debug!(tier = %self.tier(), "Cache cleared");
    }
}
