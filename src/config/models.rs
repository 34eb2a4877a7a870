// src/config/models.rs
use serde::Deserialize;
use std::net::SocketAddr;
use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field} url: {source}")]
    InvalidUrl {
        field: &'static str,
        #[source]
        source: url::ParseError,
    },

    #[error("scheduler.command must name a program to run")]
    EmptySchedulerCommand,

    #[error("metrics.path must start with '/', got {0:?}")]
    InvalidMetricsPath(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub environment: Environment,
    #[serde(default)]
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub queue: QueueConfig,
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        Url::parse(&self.database.url)
            .map_err(|source| ConfigError::InvalidUrl { field: "database", source })?;
        Url::parse(&self.redis.url)
            .map_err(|source| ConfigError::InvalidUrl { field: "redis", source })?;

        if self.scheduler.command.is_empty() {
            return Err(ConfigError::EmptySchedulerCommand);
        }

        if !self.metrics.path.starts_with('/') {
            return Err(ConfigError::InvalidMetricsPath(self.metrics.path.clone()));
        }

        Ok(())
    }
}

/// Deployment environment. `Local` is the only trusted mode: the scheduler
/// token check is skipped there.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Local,
    Testing,
    Staging,
    #[default]
    Production,
}

impl Environment {
    pub fn is_trusted(self) -> bool {
        self == Environment::Local
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_listen")]
    pub listen: SocketAddr,
    /// Seconds in-flight requests get to finish after SIGINT/SIGTERM.
    #[serde(default = "default_shutdown_grace_secs")]
    pub shutdown_grace_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            shutdown_grace_secs: default_shutdown_grace_secs(),
        }
    }
}

fn default_shutdown_grace_secs() -> u64 {
    30
}

fn default_listen() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8080))
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// Name of the cache store in use: `redis`, `memory` or `null`.
    #[serde(default = "default_cache_store")]
    pub default: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { default: default_cache_store() }
    }
}

fn default_cache_store() -> String {
    "redis".to_string()
}

pub const CLOUD_TASKS_DRIVER: &str = "cloudtasks";

#[derive(Debug, Clone, Deserialize)]
pub struct QueueConfig {
    #[serde(default = "default_queue_driver")]
    pub default: String,
    #[serde(default)]
    pub connections: QueueConnections,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            default: default_queue_driver(),
            connections: QueueConnections::default(),
        }
    }
}

fn default_queue_driver() -> String {
    "sync".to_string()
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct QueueConnections {
    pub cloudtasks: Option<CloudTasksConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CloudTasksConfig {
    pub project: Option<String>,
}

impl QueueConfig {
    pub fn cloud_tasks_project(&self) -> Option<&str> {
        self.connections
            .cloudtasks
            .as_ref()
            .and_then(|c| c.project.as_deref())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerConfig {
    /// Shared secret expected in `X-CloudScheduler-Token`. When absent every
    /// request outside the trusted environment is rejected.
    pub token: Option<String>,
    pub command: Vec<String>,
    pub working_dir: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_metrics_port")]
    pub port: u16,
    #[serde(default = "default_metrics_path")]
    pub path: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: default_metrics_port(),
            path: default_metrics_path(),
        }
    }
}

fn default_metrics_port() -> u16 {
    9090
}

fn default_metrics_path() -> String {
    "/metrics".to_string()
}
