//! CacheEntry and eviction policy used by `CacheStrategyManager`.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Cache eviction policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum EvictionPolicy {
    #[default]
    Lfu,
    Lru,
    Fifo,
    Ttl,
}

/// Bookkeeping for one cached value. The value bytes themselves are held by
/// the cache's backing store; this is metadata only.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheEntry {
    pub key: String,
    pub size_bytes: u64,
    pub created_at: DateTime<Utc>,
    pub last_accessed: DateTime<Utc>,
    pub access_count: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ttl_secs: Option<u64>,
    pub is_hot: bool,
}

impl CacheEntry {
    pub fn new(key: impl Into<String>, size_bytes: u64, ttl_secs: Option<u64>) -> Self {
        let now = Utc::now();
        Self {
            key: key.into(),
            size_bytes,
            created_at: now,
            last_accessed: now,
            access_count: 0,
            ttl_secs,
            is_hot: false,
        }
    }

    pub fn touch(&mut self, hot_threshold: u64) {
        self.access_count += 1;
        self.last_accessed = Utc::now();
        if self.access_count >= hot_threshold {
            self.is_hot = true;
        }
    }

    pub fn is_ttl_expired(&self, now: DateTime<Utc>) -> bool {
        match self.ttl_secs {
            Some(ttl) => now.signed_duration_since(self.created_at).num_seconds() > ttl as i64,
            None => false,
        }
    }

    pub fn is_cold_expired(&self, cold_ttl_secs: u64, now: DateTime<Utc>) -> bool {
        !self.is_hot && now.signed_duration_since(self.created_at).num_seconds() > cold_ttl_secs as i64
    }

    pub fn is_expired(&self, cold_ttl_secs: u64, now: DateTime<Utc>) -> bool {
        self.is_ttl_expired(now) || self.is_cold_expired(cold_ttl_secs, now)
    }
}
