// src/backends/cache.rs
use crate::backends::redis::{RedisCacheStore, RedisProbe};
use crate::health::{CacheStore, ProbeError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;

/// Builds the store named by `cache.default`. An unknown name still yields a
/// store, one whose every call fails, so the problem shows up in the health
/// report rather than at boot.
pub fn create_cache_store(name: &str, redis: &RedisProbe) -> Arc<dyn CacheStore> {
    match name {
        "redis" => Arc::new(RedisCacheStore::new(redis.clone())),
        "memory" | "array" => Arc::new(MemoryStore::new()),
        "null" => Arc::new(NullStore),
        other => {
            tracing::warn!("Cache store [{}] is not defined", other);
            Arc::new(UndefinedStore {
                name: other.to_string(),
            })
        }
    }
}

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: DateTime<Utc>,
}

/// Process-local store with per-key expiry.
#[derive(Default)]
pub struct MemoryStore {
    entries: DashMap<String, Entry>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn put(&self, key: &str, value: &str, ttl: Duration) -> Result<(), ProbeError> {
        let ttl = chrono::Duration::from_std(ttl).map_err(|e| ProbeError::Backend(e.to_string()))?;
        self.entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: Utc::now() + ttl,
            },
        );
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, ProbeError> {
        let now = Utc::now();
        if let Some(entry) = self.entries.get(key) {
            if entry.expires_at > now {
                return Ok(Some(entry.value.clone()));
            }
        }

        self.entries.remove_if(key, |_, entry| entry.expires_at <= now);
        Ok(None)
    }
}

/// Accepts writes and forgets them.
pub struct NullStore;

#[async_trait]
impl CacheStore for NullStore {
    async fn put(&self, _key: &str, _value: &str, _ttl: Duration) -> Result<(), ProbeError> {
        Ok(())
    }

    async fn get(&self, _key: &str) -> Result<Option<String>, ProbeError> {
        Ok(None)
    }
}

struct UndefinedStore {
    name: String,
}

impl UndefinedStore {
    fn error(&self) -> ProbeError {
        ProbeError::Backend(format!("Cache store [{}] is not defined.", self.name))
    }
}

#[async_trait]
impl CacheStore for UndefinedStore {
    async fn put(&self, _key: &str, _value: &str, _ttl: Duration) -> Result<(), ProbeError> {
        Err(self.error())
    }

    async fn get(&self, _key: &str) -> Result<Option<String>, ProbeError> {
        Err(self.error())
    }
}
