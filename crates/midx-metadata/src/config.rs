//! Deduplication policy configuration.

/// Content-hash digest algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashAlgorithm {
    /// 128-bit digest; the spec's default.
    Md5,
    /// 256-bit digest, used where a lower collision risk is wanted.
    Blake3,
}

impl HashAlgorithm {
    fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "md5" => Some(Self::Md5),
            "blake3" => Some(Self::Blake3),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DedupConfig {
    pub enabled: bool,
    pub algorithm: HashAlgorithm,
    /// Sample size per side (prefix and suffix) for large videos.
    pub video_sample_bytes: u64,
    /// Hash-cache capacity (path -> hash); LRU-ish, batch-evicted at 80/20.
    pub hash_cache_capacity: usize,
    /// TTL for a cached path -> hash entry.
    pub hash_cache_ttl_secs: i64,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            algorithm: HashAlgorithm::Md5,
            video_sample_bytes: 1024 * 1024, // 1 MiB
            hash_cache_capacity: 10_000,
            hash_cache_ttl_secs: 300,
        }
    }
}

impl DedupConfig {
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            enabled: std::env::var("MIDX_DEDUP_ENABLED")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(default.enabled),
            algorithm: std::env::var("MIDX_DEDUP_ALGORITHM")
                .ok()
                .and_then(|s| HashAlgorithm::parse(&s))
                .unwrap_or(default.algorithm),
            video_sample_bytes: std::env::var("MIDX_DEDUP_VIDEO_SAMPLE_BYTES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(default.video_sample_bytes),
            hash_cache_capacity: std::env::var("MIDX_DEDUP_HASH_CACHE_CAPACITY")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(default.hash_cache_capacity),
            hash_cache_ttl_secs: std::env::var("MIDX_DEDUP_HASH_CACHE_TTL_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(default.hash_cache_ttl_secs),
        }
    }

    /// Full-content hashing applies at or below this size; above it, video
    /// files switch to sampled hashing.
    pub fn full_hash_threshold_bytes(&self) -> u64 {
        2 * self.video_sample_bytes
    }
}
