// src/health/probe.rs
//! Seams between the aggregator and the external stores it probes.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Failure of a single probe. `Display` is the bare underlying message, it
/// is what ends up after the failure marker in the report.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error(transparent)]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Redis(#[from] redis::RedisError),

    #[error("{0}")]
    Backend(String),

    #[error("missing configuration value {0}")]
    MissingConfig(&'static str),
}

/// Relational datastore.
#[async_trait]
pub trait DatabaseProbe: Send + Sync {
    /// Acquires a live connection and returns the connected database's name.
    async fn database_name(&self) -> Result<String, ProbeError>;
}

/// Key-value store liveness.
#[async_trait]
pub trait KeyValueProbe: Send + Sync {
    async fn ping(&self) -> Result<(), ProbeError>;
}

/// Cache abstraction: put with TTL, get.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn put(&self, key: &str, value: &str, ttl: Duration) -> Result<(), ProbeError>;

    async fn get(&self, key: &str) -> Result<Option<String>, ProbeError>;
}
