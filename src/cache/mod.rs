//! Search result caching.
//!
//! Two tiers share the [`SearchCache`] contract:
//!
//! - **Local**: in-process LRU with a fixed TTL, lowest latency.
//! - **Shared**: Redis, visible to every search node; optional.
//!
//! ## Configuration
//!
//! ```toml
//! [cache]
//! ttl_seconds = 300
//! local_capacity = 1000
//! shared_host = "redis://cache:6379"
//! shared_timeout_ms = 2000
//! ```

mod config;
mod keys;
mod lock;
mod shared;
mod store;
mod tiers;

pub use config::CacheConfig;
pub use keys::{SEARCH_KEY_PREFIX, search_cache_key, shared_key_pattern};
pub(crate) use shared::redis_url;
pub use shared::{CacheError, SharedCache};
pub use store::{CacheTier, LocalCache, SearchCache};
pub use tiers::CacheTiers;
