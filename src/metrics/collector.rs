// src/metrics/collector.rs
use anyhow::Result;
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};
use std::sync::Arc;
use std::time::Duration;

pub struct MetricsRegistry {
    registry: Registry,
    collector: Arc<MetricsCollector>,
}

impl MetricsRegistry {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();
        let collector = Arc::new(MetricsCollector::new(&registry)?);

        Ok(Self {
            registry,
            collector,
        })
    }

    pub fn collector(&self) -> Arc<MetricsCollector> {
        self.collector.clone()
    }

    /// Prometheus text exposition of everything registered.
    pub fn gather(&self) -> Result<Vec<u8>> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(buffer)
    }
}

pub struct MetricsCollector {
    // HTTP surface
    pub http_requests_total: IntCounterVec,
    pub active_connections: IntGauge,

    // Health probes
    pub health_probe_total: IntCounterVec,
    pub health_probe_duration_seconds: HistogramVec,

    // Scheduler trigger
    pub scheduler_runs_total: IntCounterVec,
}

impl MetricsCollector {
    pub fn new(registry: &Registry) -> Result<Self> {
        let http_requests_total = IntCounterVec::new(
            Opts::new("gateway_http_requests_total", "Total number of HTTP requests"),
            &["method", "path", "status"],
        )?;
        registry.register(Box::new(http_requests_total.clone()))?;

        let active_connections =
            IntGauge::new("gateway_active_connections", "Open client connections")?;
        registry.register(Box::new(active_connections.clone()))?;

        let health_probe_total = IntCounterVec::new(
            Opts::new(
                "gateway_health_probe_total",
                "Dependency probes by outcome (up|down)",
            ),
            &["dependency", "outcome"],
        )?;
        registry.register(Box::new(health_probe_total.clone()))?;

        let health_probe_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "gateway_health_probe_duration_seconds",
                "Dependency probe duration in seconds",
            ),
            &["dependency"],
        )?;
        registry.register(Box::new(health_probe_duration_seconds.clone()))?;

        let scheduler_runs_total = IntCounterVec::new(
            Opts::new(
                "gateway_scheduler_runs_total",
                "Scheduler trigger requests by outcome (ok|unauthorized|error)",
            ),
            &["outcome"],
        )?;
        registry.register(Box::new(scheduler_runs_total.clone()))?;

        Ok(Self {
            http_requests_total,
            active_connections,
            health_probe_total,
            health_probe_duration_seconds,
            scheduler_runs_total,
        })
    }

    pub fn record_request(&self, method: &str, path: &str, status_code: u16) {
        let status = status_code.to_string();
        self.http_requests_total
            .with_label_values(&[method, path, &status])
            .inc();
    }

    pub fn record_probe(&self, dependency: &str, healthy: bool, duration: Duration) {
        let outcome = if healthy { "up" } else { "down" };
        self.health_probe_total
            .with_label_values(&[dependency, outcome])
            .inc();

        self.health_probe_duration_seconds
            .with_label_values(&[dependency])
            .observe(duration.as_secs_f64());
    }

    pub fn record_scheduler_run(&self, outcome: &str) {
        self.scheduler_runs_total.with_label_values(&[outcome]).inc();
    }

    pub fn increment_active_connections(&self) {
        self.active_connections.inc();
    }

    pub fn decrement_active_connections(&self) {
        self.active_connections.dec();
    }
}
