//! Shared cache tier backed by Redis.
//!
//! Values cross the process boundary as JSON bytes. Every round trip is
//! bounded by `shared_timeout`; any failure is logged and reported to the
//! caller as a miss (or silently dropped for writes).

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::domain::fields::SearchResult;

use super::config::CacheConfig;
use super::keys::shared_key_pattern;
use super::store::{CacheTier, SearchCache, record_lookup};

const SCAN_BATCH: usize = 200;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),
    #[error("redis operation timed out after {0:?}")]
    Timeout(Duration),
    #[error("failed to encode cache value: {0}")]
    Encode(serde_json::Error),
    #[error("failed to decode cache value: {0}")]
    Decode(serde_json::Error),
}

/// Redis-backed cache tier.
///
/// Constructed in a disabled state when no host is configured or the host is
/// unreachable at startup; a disabled tier answers every lookup with a miss.
#[derive(Clone)]
pub struct SharedCache {
    connection: Option<ConnectionManager>,
    ttl_secs: u64,
    timeout: Duration,
}

impl SharedCache {
    /// Connect to the configured host, degrading to a disabled tier on failure.
    pub async fn connect(config: &CacheConfig) -> Self {
        let Some(host) = config.shared_host.as_deref() else {
            info!("Shared cache host not configured; running with local cache only");
            return Self::disabled(config);
        };

        match open_connection(host, config.shared_timeout).await {
            Ok(connection) => {
                info!(host, "Connected to shared cache");
                Self {
                    connection: Some(connection),
                    ttl_secs: config.ttl_secs(),
                    timeout: config.shared_timeout,
                }
            }
            Err(err) => {
                warn!(host, error = %err, "Shared cache unreachable; continuing without it");
                Self::disabled(config)
            }
        }
    }

    pub fn disabled(config: &CacheConfig) -> Self {
        Self {
            connection: None,
            ttl_secs: config.ttl_secs(),
            timeout: config.shared_timeout,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.connection.is_some()
    }

    async fn bounded<T, F>(&self, op: F) -> Result<T, CacheError>
    where
        F: Future<Output = Result<T, redis::RedisError>>,
    {
        match tokio::time::timeout(self.timeout, op).await {
            Ok(result) => result.map_err(CacheError::from),
            Err(_) => Err(CacheError::Timeout(self.timeout)),
        }
    }

    async fn try_get(
        &self,
        mut conn: ConnectionManager,
        key: &str,
    ) -> Result<Option<SearchResult>, CacheError> {
        let raw: Option<Vec<u8>> = self.bounded(conn.get(key)).await?;
        raw.map(|bytes| serde_json::from_slice(&bytes).map_err(CacheError::Decode))
            .transpose()
    }

    async fn try_set(
        &self,
        mut conn: ConnectionManager,
        key: &str,
        value: &SearchResult,
    ) -> Result<(), CacheError> {
        let bytes = serde_json::to_vec(value).map_err(CacheError::Encode)?;
        self.bounded(conn.set_ex::<_, _, ()>(key, bytes, self.ttl_secs))
            .await
    }

    async fn try_clear(&self, mut conn: ConnectionManager) -> Result<usize, CacheError> {
        let pattern = shared_key_pattern();
        let mut cursor: u64 = 0;
        let mut removed = 0usize;
        loop {
            let (next, keys): (u64, Vec<String>) = self
                .bounded(
                    redis::cmd("SCAN")
                        .arg(cursor)
                        .arg("MATCH")
                        .arg(&pattern)
                        .arg("COUNT")
                        .arg(SCAN_BATCH)
                        .query_async(&mut conn),
                )
                .await?;
            if !keys.is_empty() {
                let deleted: usize = self.bounded(conn.del(&keys)).await?;
                removed += deleted;
            }
            if next == 0 {
                break;
            }
            cursor = next;
        }
        Ok(removed)
    }
}

async fn open_connection(host: &str, timeout: Duration) -> Result<ConnectionManager, CacheError> {
    let client = redis::Client::open(redis_url(host))?;
    match tokio::time::timeout(timeout, ConnectionManager::new(client)).await {
        Ok(connection) => Ok(connection?),
        Err(_) => Err(CacheError::Timeout(timeout)),
    }
}

/// Accept both `redis://host:port` and the bare `host:port` form.
pub(crate) fn redis_url(host: &str) -> String {
    if host.contains("://") {
        host.to_string()
    } else {
        format!("redis://{host}")
    }
}

#[async_trait]
impl SearchCache for SharedCache {
    fn tier(&self) -> CacheTier {
        CacheTier::Shared
    }

    async fn get(&self, key: &str) -> Option<SearchResult> {
        let conn = self.connection.clone()?;
        let found = match self.try_get(conn, key).await {
            Ok(found) => found,
            Err(err) => {
                warn!(
                    cache_key = key,
                    tier = %self.tier(),
                    error = %err,
                    "Shared cache lookup failed"
                );
                None
            }
        };
        record_lookup(self.tier(), found.is_some());
        if found.is_some() {
            debug!(cache_key = key, tier = %self.tier(), "Cache hit");
        }
        found
    }

    async fn set(&self, key: &str, value: &SearchResult) {
        let Some(conn) = self.connection.clone() else {
            return;
        };
        match self.try_set(conn, key, value).await {
            Ok(()) => debug!(cache_key = key, tier = %self.tier(), "Cache set"),
            Err(err) => {
                warn!(
                    cache_key = key,
                    tier = %self.tier(),
                    error = %err,
                    "Shared cache write failed"
                )
            }
        }
    }

    async fn delete(&self, key: &str) {
        let Some(mut conn) = self.connection.clone() else {
            return;
        };
        match self.bounded(conn.del::<_, ()>(key)).await {
            Ok(()) => debug!(cache_key = key, tier = %self.tier(), "Cache delete"),
            Err(err) => {
                warn!(
                    cache_key = key,
                    tier = %self.tier(),
                    error = %err,
                    "Shared cache delete failed"
                )
            }
        }
    }

    async fn clear(&self) {
        let Some(conn) = self.connection.clone() else {
            return;
        };
        match self.try_clear(conn).await {
            Ok(removed) => debug!(tier = %self.tier(), removed, "Cache cleared"),
            Err(err) => warn!(tier = %self.tier(), error = %err, "Shared cache clear failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_host_gets_redis_scheme() {
        assert_eq!(redis_url("localhost:6379"), "redis://localhost:6379");
        assert_eq!(redis_url("redis://cache:6379/2"), "redis://cache:6379/2");
        assert_eq!(redis_url("rediss://secure:6380"), "rediss://secure:6380");
    }

    #[tokio::test]
    async fn missing_host_yields_disabled_tier() {
        let cache = SharedCache::connect(&CacheConfig::default()).await;
        assert!(!cache.is_enabled());
        assert_eq!(cache.tier(), CacheTier::Shared);
    }

    #[tokio::test]
    async fn disabled_tier_is_a_silent_miss() {
        let cache = SharedCache::disabled(&CacheConfig::default());
        let result = SearchResult::new(Vec::new(), 0, 1, 10);

        cache.set("search:a", &result).await;
        assert!(cache.get("search:a").await.is_none());
        cache.delete("search:a").await;
        cache.clear().await;
    }

    #[tokio::test]
    async fn unreachable_host_degrades_instead_of_failing() {
        let config = CacheConfig {
            shared_host: Some("127.0.0.1:1".to_string()),
            shared_timeout: Duration::from_millis(300),
            ..Default::default()
        };
        let cache = SharedCache::connect(&config).await;
        assert!(!cache.is_enabled());
    }

    #[test]
    fn values_roundtrip_through_json_bytes() {
        use crate::domain::fields::FieldDocument;

        let result = SearchResult::new(
            vec![FieldDocument {
                id: "f1".to_string(),
                name: "Cancha".to_string(),
                sport: "tennis".to_string(),
                location: "Mendoza".to_string(),
                price_per_hour: 12.75,
                image: "https://img.example/f1.png".to_string(),
                description: "Clay".to_string(),
                available: true,
            }],
            41,
            3,
            20,
        );
        let bytes = serde_json::to_vec(&result).expect("encodes");
        let decoded: SearchResult = serde_json::from_slice(&bytes).expect("decodes");
        assert_eq!(decoded, result);
        assert_eq!(decoded.total_pages, 3);
    }
}
