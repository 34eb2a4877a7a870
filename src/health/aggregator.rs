// src/health/aggregator.rs
use crate::config::{Config, QueueConfig, CLOUD_TASKS_DRIVER};
use crate::health::probe::{CacheStore, DatabaseProbe, KeyValueProbe, ProbeError};
use crate::health::report::{Dependency, DependencyCheck, HealthReport};
use crate::metrics::MetricsCollector;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

const CACHE_PROBE_KEY: &str = "health_check";
const CACHE_PROBE_VALUE: &str = "ok";
const CACHE_PROBE_TTL: Duration = Duration::from_secs(10);

/// The slice of configuration the health check reads.
#[derive(Debug, Clone)]
pub struct HealthSettings {
    pub cache_store: String,
    pub queue: QueueConfig,
}

impl HealthSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            cache_store: config.cache.default.clone(),
            queue: config.queue.clone(),
        }
    }
}

pub struct HealthAggregator {
    database: Arc<dyn DatabaseProbe>,
    key_value: Arc<dyn KeyValueProbe>,
    cache: Arc<dyn CacheStore>,
    settings: HealthSettings,
    metrics: Option<Arc<MetricsCollector>>,
}

impl HealthAggregator {
    pub fn new(
        database: Arc<dyn DatabaseProbe>,
        key_value: Arc<dyn KeyValueProbe>,
        cache: Arc<dyn CacheStore>,
        settings: HealthSettings,
        metrics: Option<Arc<MetricsCollector>>,
    ) -> Self {
        Self {
            database,
            key_value,
            cache,
            settings,
            metrics,
        }
    }

    /// Probes every dependency in order and returns one entry per
    /// dependency. A failing probe is reported, never propagated, and never
    /// stops the probes after it.
    pub async fn run_health_check(&self) -> HealthReport {
        let mut report = HealthReport::new();
        let mut healthy_count = 0;

        for dependency in Dependency::ALL {
            let start = Instant::now();
            let check = match dependency {
                Dependency::Database => self.check_database().await,
                Dependency::Redis => self.check_redis().await,
                Dependency::Cache => self.check_cache().await,
                Dependency::Queue => self.check_queue(),
            };
            let elapsed = start.elapsed();

            if check.healthy {
                healthy_count += 1;
                debug!(%dependency, ?elapsed, "probe passed");
            } else {
                warn!(%dependency, ?elapsed, status = %check.status, "probe failed");
            }

            if let Some(metrics) = &self.metrics {
                metrics.record_probe(dependency.as_str(), check.healthy, elapsed);
            }

            report.record(check);
        }

        info!(
            "Health check complete: {} healthy, {} unhealthy",
            healthy_count,
            report.len() - healthy_count
        );

        report
    }

    async fn check_database(&self) -> DependencyCheck {
        match self.database.database_name().await {
            Ok(name) => DependencyCheck::up(Dependency::Database, format!("Connected ({name})")),
            Err(e) => DependencyCheck::down(Dependency::Database, e),
        }
    }

    async fn check_redis(&self) -> DependencyCheck {
        match self.key_value.ping().await {
            Ok(()) => DependencyCheck::up(Dependency::Redis, "Connected"),
            Err(e) => DependencyCheck::down(Dependency::Redis, e),
        }
    }

    async fn check_cache(&self) -> DependencyCheck {
        let read_back: Result<Option<String>, ProbeError> = async {
            self.cache
                .put(CACHE_PROBE_KEY, CACHE_PROBE_VALUE, CACHE_PROBE_TTL)
                .await?;
            self.cache.get(CACHE_PROBE_KEY).await
        }
        .await;

        match read_back {
            Ok(Some(value)) if value == CACHE_PROBE_VALUE => DependencyCheck::up(
                Dependency::Cache,
                format!("Working ({})", self.settings.cache_store),
            ),
            Ok(other) => {
                debug!(read_back = ?other, "cache round-trip mismatch");
                DependencyCheck::down(Dependency::Cache, "Failed")
            }
            Err(e) => DependencyCheck::down(Dependency::Cache, e),
        }
    }

    fn check_queue(&self) -> DependencyCheck {
        match describe_queue(&self.settings.queue) {
            Ok(detail) => DependencyCheck::up(Dependency::Queue, detail),
            Err(e) => DependencyCheck::down(Dependency::Queue, e),
        }
    }
}

/// Queue status detail from configuration alone; there is no live probe.
pub fn describe_queue(queue: &QueueConfig) -> Result<String, ProbeError> {
    let mut detail = format!("Driver: {}", queue.default);

    if queue.default == CLOUD_TASKS_DRIVER {
        let project = queue
            .cloud_tasks_project()
            .ok_or(ProbeError::MissingConfig("queue.connections.cloudtasks.project"))?;
        detail.push_str(&format!(" (project: {project})"));
    }

    Ok(detail)
}
