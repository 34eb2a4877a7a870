// src/backends/redis.rs
use crate::config::RedisConfig;
use crate::health::{CacheStore, KeyValueProbe, ProbeError};
use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::Client;
use std::time::Duration;

/// Opens a fresh connection per call; the client itself only holds the
/// parsed connection info.
#[derive(Clone)]
pub struct RedisProbe {
    client: Client,
}

impl RedisProbe {
    pub fn open(config: &RedisConfig) -> Result<Self, redis::RedisError> {
        let client = Client::open(config.url.as_str())?;
        Ok(Self { client })
    }

    async fn connection(&self) -> Result<MultiplexedConnection, redis::RedisError> {
        self.client.get_multiplexed_async_connection().await
    }
}

#[async_trait]
impl KeyValueProbe for RedisProbe {
    async fn ping(&self) -> Result<(), ProbeError> {
        let mut con = self.connection().await?;
        let _pong: String = redis::cmd("PING").query_async(&mut con).await?;
        Ok(())
    }
}

/// Cache store backed by Redis `SET .. EX` / `GET`.
pub struct RedisCacheStore {
    redis: RedisProbe,
}

impl RedisCacheStore {
    pub fn new(redis: RedisProbe) -> Self {
        Self { redis }
    }
}

#[async_trait]
impl CacheStore for RedisCacheStore {
    async fn put(&self, key: &str, value: &str, ttl: Duration) -> Result<(), ProbeError> {
        let mut con = self.redis.connection().await?;
        let _: () = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("EX")
            .arg(ttl.as_secs().max(1))
            .query_async(&mut con)
            .await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, ProbeError> {
        let mut con = self.redis.connection().await?;
        let value: Option<String> = redis::cmd("GET").arg(key).query_async(&mut con).await?;
        Ok(value)
    }
}
