//! Cache configuration.
//!
//! Controls the TTL shared by both tiers, the local tier's capacity and the
//! shared tier's connection parameters.

use std::num::NonZeroUsize;
use std::time::Duration;

use crate::config::{DEFAULT_CACHE_TTL_SECS, DEFAULT_LOCAL_CAPACITY, DEFAULT_SHARED_TIMEOUT_MS};

/// Runtime cache configuration derived from [`crate::config::CacheSettings`].
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Lifetime of every entry in both tiers.
    pub ttl: Duration,
    /// Maximum number of entries held by the local tier.
    pub local_capacity: usize,
    /// Redis host for the shared tier; `None` disables it.
    pub shared_host: Option<String>,
    /// Upper bound for each shared-tier round trip.
    pub shared_timeout: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(DEFAULT_CACHE_TTL_SECS),
            local_capacity: DEFAULT_LOCAL_CAPACITY,
            shared_host: None,
            shared_timeout: Duration::from_millis(DEFAULT_SHARED_TIMEOUT_MS),
        }
    }
}

impl From<&crate::config::CacheSettings> for CacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            ttl: settings.ttl,
            local_capacity: settings.local_capacity.get(),
            shared_host: settings.shared_host.clone(),
            shared_timeout: settings.shared_timeout,
        }
    }
}

impl CacheConfig {
    /// Returns the local capacity as NonZeroUsize, clamping to 1 if zero.
    pub fn local_capacity_non_zero(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.local_capacity).unwrap_or(NonZeroUsize::MIN)
    }

    /// TTL in whole seconds as Redis expects it, never below one second.
    pub fn ttl_secs(&self) -> u64 {
        self.ttl.as_secs().max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_values() {
        let config = CacheConfig::default();
        assert_eq!(config.ttl, Duration::from_secs(300));
        assert_eq!(config.local_capacity, 1000);
        assert!(config.shared_host.is_none());
        assert_eq!(config.shared_timeout, Duration::from_millis(2000));
    }

    #[test]
    fn non_zero_clamps_to_min() {
        let config = CacheConfig {
            local_capacity: 0,
            ..Default::default()
        };
        assert_eq!(config.local_capacity_non_zero().get(), 1);
    }

    #[test]
    fn sub_second_ttl_rounds_up_for_redis() {
        let config = CacheConfig {
            ttl: Duration::from_millis(250),
            ..Default::default()
        };
        assert_eq!(config.ttl_secs(), 1);
    }
}
