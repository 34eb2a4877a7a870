// src/scheduler/trigger.rs
use crate::config::{Config, Environment};
use crate::metrics::MetricsCollector;
use crate::scheduler::runner::{TaskError, TaskRunner};
use hyper::HeaderMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::warn;

pub const TOKEN_HEADER: &str = "x-cloudscheduler-token";

#[derive(Debug, Error)]
pub enum TriggerError {
    #[error("Unauthorized")]
    Unauthorized,

    #[error(transparent)]
    Task(#[from] TaskError),
}

/// Shared-secret check on `X-CloudScheduler-Token`, bypassed in the trusted
/// environment.
#[derive(Debug, Clone)]
pub struct TokenGuard {
    expected: Option<String>,
    environment: Environment,
}

impl TokenGuard {
    pub fn new(expected: Option<String>, environment: Environment) -> Self {
        Self {
            expected,
            environment,
        }
    }

    pub fn authorize(&self, headers: &HeaderMap) -> Result<(), TriggerError> {
        if self.environment.is_trusted() {
            return Ok(());
        }

        // Byte comparison: a secret with non-ASCII UTF-8 arrives as opaque
        // header bytes.
        let provided = headers
            .get(TOKEN_HEADER)
            .map(|v| v.as_bytes())
            .filter(|token| !token.is_empty());

        match (provided, self.expected.as_deref()) {
            (Some(token), Some(expected)) if token == expected.as_bytes() => Ok(()),
            _ => Err(TriggerError::Unauthorized),
        }
    }
}

pub struct SchedulerTrigger {
    guard: TokenGuard,
    runner: Arc<dyn TaskRunner>,
    metrics: Option<Arc<MetricsCollector>>,
}

impl SchedulerTrigger {
    pub fn new(
        guard: TokenGuard,
        runner: Arc<dyn TaskRunner>,
        metrics: Option<Arc<MetricsCollector>>,
    ) -> Self {
        Self {
            guard,
            runner,
            metrics,
        }
    }

    pub fn from_config(
        config: &Config,
        runner: Arc<dyn TaskRunner>,
        metrics: Option<Arc<MetricsCollector>>,
    ) -> Self {
        let guard = TokenGuard::new(config.scheduler.token.clone(), config.environment);
        Self::new(guard, runner, metrics)
    }

    /// Authorizes the request, then runs due tasks and returns their output.
    pub async fn trigger(&self, headers: &HeaderMap) -> Result<String, TriggerError> {
        let result = match self.guard.authorize(headers) {
            Ok(()) => self.runner.run_due().await.map_err(TriggerError::from),
            Err(e) => {
                warn!("Rejected scheduler trigger: missing or invalid token");
                Err(e)
            }
        };

        if let Some(metrics) = &self.metrics {
            let outcome = match &result {
                Ok(_) => "ok",
                Err(TriggerError::Unauthorized) => "unauthorized",
                Err(TriggerError::Task(_)) => "error",
            };
            metrics.record_scheduler_run(outcome);
        }

        result
    }
}
