//! Cache strategy configuration.

use midx_models::EvictionPolicy;

#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub max_size_bytes: u64,
    pub default_ttl_secs: u64,
    pub eviction_policy: EvictionPolicy,
    pub hot_threshold: u64,
    pub cold_ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_size_bytes: 5 * 1024 * 1024 * 1024, // 5 GiB
            default_ttl_secs: 30 * 24 * 3600,       // 30 days
            eviction_policy: EvictionPolicy::Lfu,
            hot_threshold: 10,
            cold_ttl_secs: 7 * 24 * 3600, // 7 days
        }
    }
}

impl CacheConfig {
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            max_size_bytes: std::env::var("MIDX_CACHE_MAX_SIZE_BYTES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(default.max_size_bytes),
            default_ttl_secs: std::env::var("MIDX_CACHE_DEFAULT_TTL_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(default.default_ttl_secs),
            eviction_policy: std::env::var("MIDX_CACHE_EVICTION_POLICY")
                .ok()
                .and_then(|s| match s.to_lowercase().as_str() {
                    "lru" => Some(EvictionPolicy::Lru),
                    "lfu" => Some(EvictionPolicy::Lfu),
                    "fifo" => Some(EvictionPolicy::Fifo),
                    "ttl" => Some(EvictionPolicy::Ttl),
                    _ => None,
                })
                .unwrap_or(default.eviction_policy),
            hot_threshold: std::env::var("MIDX_CACHE_HOT_THRESHOLD")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(default.hot_threshold),
            cold_ttl_secs: std::env::var("MIDX_CACHE_COLD_TTL_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(default.cold_ttl_secs),
        }
    }
}
